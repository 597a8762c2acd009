pub mod list;
pub mod parse;

use std::fmt;

use serde::Serialize;

pub use list::{FlagList, MergeOp};
pub use parse::{parse_all, parse_flags, split_arguments};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagKind {
    Define,
    IncludePath,
    LibraryPath,
    Library,
    LinkFlag,
    Raw,
}

/// A single typed compiler or linker argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Flag {
    pub kind: FlagKind,
    pub value: String,
}

impl Flag {
    pub fn new(kind: FlagKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn define(value: impl Into<String>) -> Self {
        Self::new(FlagKind::Define, value)
    }

    pub fn include_path(value: impl Into<String>) -> Self {
        Self::new(FlagKind::IncludePath, value)
    }

    pub fn library_path(value: impl Into<String>) -> Self {
        Self::new(FlagKind::LibraryPath, value)
    }

    pub fn library(value: impl Into<String>) -> Self {
        Self::new(FlagKind::Library, value)
    }

    pub fn link(value: impl Into<String>) -> Self {
        Self::new(FlagKind::LinkFlag, value)
    }

    pub fn raw(value: impl Into<String>) -> Self {
        Self::new(FlagKind::Raw, value)
    }

    /// The command-line form of this flag.
    pub fn to_arg(&self) -> String {
        match self.kind {
            FlagKind::Define => format!("-D{}", self.value),
            FlagKind::IncludePath => format!("-I{}", self.value),
            FlagKind::LibraryPath => format!("-L{}", self.value),
            FlagKind::Library => format!("-l{}", self.value),
            FlagKind::LinkFlag | FlagKind::Raw => self.value.clone(),
        }
    }

    pub fn define_name(&self) -> Option<&str> {
        if self.kind != FlagKind::Define {
            return None;
        }
        Some(self.value.split('=').next().unwrap_or(&self.value))
    }

    /// Whether an unflag `pattern` removes this flag.
    ///
    /// Kinds must agree. Values match exactly, a value-less define matches
    /// the same define with any value, and a trailing `*` matches by prefix.
    pub fn matches(&self, pattern: &Flag) -> bool {
        if self.kind != pattern.kind {
            return false;
        }
        if let Some(prefix) = pattern.value.strip_suffix('*') {
            return self.value.starts_with(prefix);
        }
        if self.value == pattern.value {
            return true;
        }
        pattern.kind == FlagKind::Define
            && !pattern.value.contains('=')
            && self.define_name() == Some(pattern.value.as_str())
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_arg())
    }
}
