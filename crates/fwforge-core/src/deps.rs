use std::path::{Path, PathBuf};

use crate::environment::BuildEnvironment;
use crate::flags::{Flag, FlagKind, FlagList, MergeOp};

/// Link and include parameters discovered from project dependencies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyOutputs {
    pub link_libraries: Vec<String>,
    pub link_search_paths: Vec<String>,
    pub include_paths: Vec<String>,
    pub extra_link_flags: Vec<String>,
}

#[derive(Debug)]
pub enum DependencyError {
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for DependencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyError::Io { path, source } => write!(
                f,
                "failed to scan library directory '{}': {}",
                path.display(),
                source
            ),
        }
    }
}

impl std::error::Error for DependencyError {}

pub trait DependencyResolver {
    fn resolve(&self, env: &BuildEnvironment) -> Result<DependencyOutputs, DependencyError>;
}

/// Prepend dependency link parameters so that flags declared earlier by
/// the project keep precedence.
pub fn merge_dependency_outputs(env: &mut BuildEnvironment, outputs: &DependencyOutputs) {
    let libraries: Vec<Flag> = outputs
        .link_libraries
        .iter()
        .map(|name| Flag::library(name.as_str()))
        .collect();
    env.flags.apply(MergeOp::PrependUnique(libraries));
    env.flags.prepend_unique(
        outputs
            .link_search_paths
            .iter()
            .map(|path| Flag::library_path(path.as_str()))
            .collect(),
    );
    env.flags.prepend_unique(
        outputs
            .extra_link_flags
            .iter()
            .map(|flag| Flag::link(flag.as_str()))
            .collect(),
    );
}

/// Flags used for project sources: the environment plus dependency include
/// paths and `src_build_flags`.
pub fn project_flags(
    env: &BuildEnvironment,
    outputs: &DependencyOutputs,
    src_build_flags: &[Flag],
) -> FlagList {
    let mut flags = env.flags.clone();
    flags.prepend_unique(
        outputs
            .include_paths
            .iter()
            .map(|path| Flag::new(FlagKind::IncludePath, path.as_str()))
            .collect(),
    );
    flags.append(src_build_flags.to_vec());
    flags
}

/// Resolves every directory under the project library folder as a library.
#[derive(Clone, Debug, Default)]
pub struct LocalLibraryResolver;

impl LocalLibraryResolver {
    pub fn new() -> Self {
        Self
    }
}

impl DependencyResolver for LocalLibraryResolver {
    fn resolve(&self, env: &BuildEnvironment) -> Result<DependencyOutputs, DependencyError> {
        let mut outputs = DependencyOutputs::default();
        if !env.lib_dir.is_dir() {
            return Ok(outputs);
        }
        for library in sorted_entries(&env.lib_dir)? {
            if !library.is_dir() {
                continue;
            }
            let include = ["include", "src"]
                .iter()
                .map(|name| library.join(name))
                .find(|candidate| candidate.is_dir())
                .unwrap_or_else(|| library.clone());
            outputs
                .include_paths
                .push(include.to_string_lossy().into_owned());

            let mut found_archive = false;
            for entry in sorted_entries(&library)? {
                if let Some(name) = archive_library_name(&entry) {
                    outputs.link_libraries.push(name);
                    found_archive = true;
                }
            }
            if found_archive {
                outputs
                    .link_search_paths
                    .push(library.to_string_lossy().into_owned());
            }
        }
        Ok(outputs)
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, DependencyError> {
    let read = std::fs::read_dir(dir).map_err(|source| DependencyError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|source| DependencyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

fn archive_library_name(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_prefix("lib")?.strip_suffix(".a")?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}
