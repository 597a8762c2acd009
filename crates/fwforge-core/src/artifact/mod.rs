pub mod convert;
pub mod naming;

pub use convert::ConversionRule;
pub use naming::{artifact_file_name, artifact_path, ArtifactKind};
