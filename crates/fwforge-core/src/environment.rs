use std::path::PathBuf;

use crate::artifact::{artifact_path, ArtifactKind, ConversionRule};
use crate::config::ProjectConfig;
use crate::flags::FlagList;
use crate::mode::BuildMode;
use crate::toolchain::Toolchain;

pub const DEFAULT_PROGRAM_NAME: &str = "firmware";

/// Accumulated state of one build invocation.
///
/// Exactly one instance exists per invocation and it is threaded through
/// every pipeline stage by reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildEnvironment {
    pub toolchain: Toolchain,
    pub flags: FlagList,
    /// Wrap `-l` arguments in `--start-group`/`--end-group` at link time.
    pub group_libraries: bool,
    pub mode: BuildMode,
    pub program_name: String,
    pub artifact_kind: ArtifactKind,
    pub frameworks: Vec<String>,
    pub build_dir: PathBuf,
    pub src_dir: PathBuf,
    pub test_dir: PathBuf,
    pub lib_dir: PathBuf,
    pub conversions: Vec<ConversionRule>,
    pub warnings: Vec<String>,
}

impl BuildEnvironment {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            toolchain: Toolchain::for_prefix(&config.toolchain_prefix),
            flags: FlagList::new(),
            group_libraries: false,
            mode: BuildMode::Release,
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
            artifact_kind: ArtifactKind::Executable,
            frameworks: config.frameworks.clone(),
            build_dir: config.dirs.build.clone(),
            src_dir: config.dirs.src.clone(),
            test_dir: config.dirs.test.clone(),
            lib_dir: config.dirs.lib.clone(),
            conversions: vec![ConversionRule::elf_to_bin(), ConversionRule::elf_to_hex()],
            warnings: Vec::new(),
        }
    }

    /// Path of the main program artifact, ELF or static library.
    pub fn program_path(&self) -> PathBuf {
        artifact_path(&self.build_dir, &self.program_name, self.artifact_kind)
    }

    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        artifact_path(&self.build_dir, &self.program_name, kind)
    }

    pub fn conversion(&self, output: ArtifactKind) -> Option<&ConversionRule> {
        self.conversions.iter().find(|rule| rule.output == output)
    }

    pub fn has_framework(&self, name: &str) -> bool {
        self.frameworks.iter().any(|framework| framework == name)
    }
}
