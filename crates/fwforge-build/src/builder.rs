use std::path::PathBuf;

use fwforge_core::command::CommandLine;
use fwforge_core::targets::TargetError;
use fwforge_core::upload::UploadPlan;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug)]
pub enum BuildError {
    Spawn {
        program: String,
        source: std::io::Error,
    },
    ToolFailed {
        description: String,
        status: Option<i32>,
    },
    SizeLimitExceeded {
        region: &'static str,
        used: u64,
        limit: u64,
    },
    MissingArtifact {
        path: PathBuf,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    State {
        path: PathBuf,
        message: String,
    },
    Target(TargetError),
    Upload {
        failures: Vec<String>,
    },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Spawn { program, source } => {
                write!(f, "failed to start '{}': {}", program, source)
            }
            BuildError::ToolFailed {
                description,
                status: Some(code),
            } => write!(f, "{} failed with exit code {}", description, code),
            BuildError::ToolFailed {
                description,
                status: None,
            } => write!(f, "{} was terminated by a signal", description),
            BuildError::SizeLimitExceeded {
                region,
                used,
                limit,
            } => write!(
                f,
                "{} size {} bytes exceeds the board limit of {} bytes",
                region, used, limit
            ),
            BuildError::MissingArtifact { path } => {
                write!(f, "artifact '{}' does not exist", path.display())
            }
            BuildError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            BuildError::State { path, message } => write!(
                f,
                "invalid build state file '{}': {}",
                path.display(),
                message
            ),
            BuildError::Target(err) => write!(f, "{}", err),
            BuildError::Upload { failures } => write!(f, "upload failed: {}", failures.join("; ")),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<TargetError> for BuildError {
    fn from(err: TargetError) -> Self {
        BuildError::Target(err)
    }
}

/// Runs external toolchain commands.
pub trait ToolRunner {
    /// Run with inherited stdio so the tool's own diagnostics reach the user.
    fn run(&self, command: &CommandLine) -> BuildResult<()>;

    /// Run and return captured standard output.
    fn capture(&self, command: &CommandLine) -> BuildResult<String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFailure {
    pub message: String,
}

impl UploadFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UploadFailure {}

/// Carries out a resolved upload plan against built artifacts.
pub trait Uploader {
    fn upload(&self, plan: &UploadPlan) -> Result<(), UploadFailure>;
}
