use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ArtifactKind;
use crate::command::CommandLine;
use crate::toolchain::Toolchain;

/// A pure one-input, one-output transformation of a linked executable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversionRule {
    pub name: &'static str,
    pub output: ArtifactKind,
    /// `objcopy` arguments placed before the source and target paths.
    pub objcopy_args: Vec<String>,
}

impl ConversionRule {
    pub fn elf_to_bin() -> Self {
        Self {
            name: "ElfToBin",
            output: ArtifactKind::RawBinary,
            objcopy_args: vec!["-O".to_string(), "binary".to_string()],
        }
    }

    pub fn elf_to_hex() -> Self {
        Self {
            name: "ElfToHex",
            output: ArtifactKind::IntelHex,
            objcopy_args: vec![
                "-O".to_string(),
                "ihex".to_string(),
                "-R".to_string(),
                ".eeprom".to_string(),
            ],
        }
    }

    /// Output path derived from the source by swapping the suffix.
    pub fn target_for(&self, source: &Path) -> PathBuf {
        source.with_extension(self.output.extension())
    }

    pub fn command(&self, toolchain: &Toolchain, source: &Path, target: &Path) -> CommandLine {
        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.display().to_string());
        CommandLine::new(&toolchain.objcopy, format!("Building {}", file_name))
            .args(self.objcopy_args.iter().cloned())
            .arg(source.to_string_lossy())
            .arg(target.to_string_lossy())
    }
}
