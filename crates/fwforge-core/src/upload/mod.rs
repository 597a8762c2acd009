//! Upload protocol selection and plan resolution.
//!
//! Resolution is pure: a plan names the artifacts and placeholders it needs,
//! and the executor in `fwforge-upload` binds ports and runs it.

pub mod lazy;
pub mod plan;
pub mod protocol;
pub mod resolve;
pub mod template;

pub use lazy::LazyValue;
pub use plan::{MainAction, PreAction, RenderedAction, UploadPlan};
pub use protocol::{UploadProtocol, STATIC_PROTOCOL};
pub use resolve::{dispatch_upload, jlink_script, UploadContext, UploadDispatch};
pub use template::{TemplateError, TemplateValues};
