pub mod builder;
pub mod convert;
pub mod fingerprint;
pub mod gcc;
pub mod graph;
pub mod process;
pub mod size;

pub use builder::{BuildError, BuildResult, ToolRunner, UploadFailure, Uploader};
pub use graph::{ExecutionReport, GraphExecutor};
pub use process::ProcessRunner;
