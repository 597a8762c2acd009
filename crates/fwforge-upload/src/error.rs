use std::path::PathBuf;

use fwforge_build::{BuildError, UploadFailure};
use fwforge_core::upload::TemplateError;

#[derive(Debug)]
pub enum UploadError {
    NoPort { searched: Vec<PathBuf> },
    NoDisk { searched: Vec<PathBuf> },
    Template(TemplateError),
    Io { path: PathBuf, source: std::io::Error },
    Tool(BuildError),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::NoPort { searched } => write!(
                f,
                "no upload port found (searched {}); set upload_port in the project configuration",
                join_paths(searched)
            ),
            UploadError::NoDisk { searched } => write!(
                f,
                "no mbed upload disk found (searched {}); set upload_port to the mount point",
                join_paths(searched)
            ),
            UploadError::Template(err) => write!(f, "{}", err),
            UploadError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            UploadError::Tool(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<TemplateError> for UploadError {
    fn from(err: TemplateError) -> Self {
        UploadError::Template(err)
    }
}

impl From<BuildError> for UploadError {
    fn from(err: BuildError) -> Self {
        UploadError::Tool(err)
    }
}

impl From<UploadError> for UploadFailure {
    fn from(err: UploadError) -> Self {
        UploadFailure::new(err.to_string())
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
