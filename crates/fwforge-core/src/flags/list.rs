use serde::Serialize;

use super::{Flag, FlagKind};

/// An explicit merge operation over a [`FlagList`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOp {
    Append(Vec<Flag>),
    AppendUnique(Vec<Flag>),
    Prepend(Vec<Flag>),
    PrependUnique(Vec<Flag>),
    /// Drop every flag of the kind, then append the replacements.
    Replace(FlagKind, Vec<Flag>),
    RemoveMatching(Vec<Flag>),
}

/// Ordered flag state. Order is significant and duplicates survive unless a
/// unique merge is requested.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagList {
    entries: Vec<Flag>,
}

impl FlagList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, op: MergeOp) {
        match op {
            MergeOp::Append(flags) => self.entries.extend(flags),
            MergeOp::AppendUnique(flags) => {
                for flag in flags {
                    if !self.entries.contains(&flag) {
                        self.entries.push(flag);
                    }
                }
            }
            MergeOp::Prepend(flags) => {
                self.entries.splice(0..0, flags);
            }
            MergeOp::PrependUnique(flags) => {
                let mut fresh: Vec<Flag> = Vec::with_capacity(flags.len());
                for flag in flags {
                    if !self.entries.contains(&flag) && !fresh.contains(&flag) {
                        fresh.push(flag);
                    }
                }
                self.entries.splice(0..0, fresh);
            }
            MergeOp::Replace(kind, flags) => {
                self.entries.retain(|flag| flag.kind != kind);
                self.entries.extend(flags);
            }
            MergeOp::RemoveMatching(patterns) => {
                self.entries
                    .retain(|flag| !patterns.iter().any(|pattern| flag.matches(pattern)));
            }
        }
    }

    pub fn append(&mut self, flags: Vec<Flag>) {
        self.apply(MergeOp::Append(flags));
    }

    pub fn prepend_unique(&mut self, flags: Vec<Flag>) {
        self.apply(MergeOp::PrependUnique(flags));
    }

    pub fn remove_matching(&mut self, patterns: Vec<Flag>) {
        self.apply(MergeOp::RemoveMatching(patterns));
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Flag> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: FlagKind) -> impl Iterator<Item = &Flag> {
        self.entries.iter().filter(move |flag| flag.kind == kind)
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.entries.contains(flag)
    }

    pub fn has_kind(&self, kind: FlagKind) -> bool {
        self.of_kind(kind).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw flags, defines and include paths, in that order.
    pub fn compile_args(&self) -> Vec<String> {
        [FlagKind::Raw, FlagKind::Define, FlagKind::IncludePath]
            .into_iter()
            .flat_map(|kind| self.of_kind(kind).map(Flag::to_arg))
            .collect()
    }

    /// Linker flags followed by library search paths.
    pub fn link_args(&self) -> Vec<String> {
        [FlagKind::LinkFlag, FlagKind::LibraryPath]
            .into_iter()
            .flat_map(|kind| self.of_kind(kind).map(Flag::to_arg))
            .collect()
    }

    /// Library arguments, optionally wrapped in a linker group so that
    /// mutually dependent archives resolve each other's symbols.
    pub fn library_args(&self, grouped: bool) -> Vec<String> {
        let libraries: Vec<String> = self.of_kind(FlagKind::Library).map(Flag::to_arg).collect();
        if !grouped || libraries.is_empty() {
            return libraries;
        }
        let mut args = Vec::with_capacity(libraries.len() + 2);
        args.push("-Wl,--start-group".to_string());
        args.extend(libraries);
        args.push("-Wl,--end-group".to_string());
        args
    }
}

impl FromIterator<Flag> for FlagList {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FlagList {
    type Item = &'a Flag;
    type IntoIter = std::slice::Iter<'a, Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
