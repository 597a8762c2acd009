pub mod detect;
pub mod error;
pub mod execute;

pub use detect::{PortDetector, SystemPortDetector};
pub use error::UploadError;
pub use execute::{execute_plan, port_name, PlanUploader};
