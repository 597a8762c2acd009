pub mod artifact;
pub mod board;
pub mod command;
pub mod compose;
pub mod config;
pub mod deps;
pub mod environment;
pub mod flags;
pub mod hooks;
pub mod mode;
pub mod packages;
pub mod sources;
pub mod targets;
pub mod toolchain;
pub mod upload;

pub use board::{BoardDescriptor, BoardError};
pub use compose::{compose_build, ComposeError, ComposeInputs, ComposedBuild};
pub use config::{load_project_config, ConfigError, ProjectConfig};
pub use environment::BuildEnvironment;
pub use mode::BuildMode;
pub use targets::{assemble_targets, RequestedTargets, TargetGraph};
