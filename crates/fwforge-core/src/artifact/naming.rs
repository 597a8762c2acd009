use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    StaticLibrary,
    Executable,
    RawBinary,
    IntelHex,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::StaticLibrary => "a",
            ArtifactKind::Executable => "elf",
            ArtifactKind::RawBinary => "bin",
            ArtifactKind::IntelHex => "hex",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ArtifactKind::StaticLibrary => "static library",
            ArtifactKind::Executable => "ELF",
            ArtifactKind::RawBinary => "BIN",
            ArtifactKind::IntelHex => "HEX",
        };
        f.write_str(value)
    }
}

pub fn artifact_file_name(program_name: &str, kind: ArtifactKind) -> String {
    match kind {
        ArtifactKind::StaticLibrary => format!("lib{}.a", program_name),
        _ => format!("{}.{}", program_name, kind.extension()),
    }
}

pub fn artifact_path(build_dir: &Path, program_name: &str, kind: ArtifactKind) -> PathBuf {
    build_dir.join(artifact_file_name(program_name, kind))
}
