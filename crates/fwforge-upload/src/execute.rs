use std::fs;
use std::path::{Path, PathBuf};

use fwforge_build::{ToolRunner, UploadFailure, Uploader};
use fwforge_core::upload::template::{UPLOAD_PORT, UPLOAD_PORT_NAME};
use fwforge_core::upload::{LazyValue, PreAction, RenderedAction, UploadPlan};
use tracing::info;

use crate::detect::PortDetector;
use crate::error::UploadError;

/// Basename of a port path, `/dev/ttyACM0` becomes `ttyACM0`.
pub fn port_name(port: &str) -> String {
    Path::new(port)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| port.to_string())
}

/// Run the pre-actions of `plan` in order, then its main action.
///
/// A `configured_port` is used as is for both the port and the disk and
/// suppresses detection.
pub fn execute_plan(
    plan: &UploadPlan,
    runner: &dyn ToolRunner,
    detector: &dyn PortDetector,
    configured_port: Option<&str>,
) -> Result<(), UploadError> {
    let port: LazyValue<String> = match configured_port {
        Some(port) => LazyValue::ready(port.to_string()),
        None => LazyValue::new(),
    };
    let disk: LazyValue<PathBuf> = match configured_port {
        Some(port) => LazyValue::ready(PathBuf::from(port)),
        None => LazyValue::new(),
    };

    for action in &plan.pre_actions {
        match action {
            PreAction::AutodetectPort { description } => {
                info!("{}", description);
                let port = port.get_or_try_resolve(|| detector.detect_port())?;
                info!("Auto-detected: {}", port);
            }
            PreAction::AutodetectDisk { description } => {
                info!("{}", description);
                let disk = disk.get_or_try_resolve(|| detector.detect_disk())?;
                info!("Auto-detected: {}", disk.display());
            }
            PreAction::WriteCommandScript { path, contents } => write_script(path, contents)?,
        }
    }

    let mut values = plan.template_values();
    if let Some(port) = port.get() {
        values
            .set(UPLOAD_PORT, port.clone())
            .set(UPLOAD_PORT_NAME, port_name(port));
    }

    match plan.render(&values)? {
        RenderedAction::Command(command) => runner.run(&command)?,
        RenderedAction::CopyToDisk { source } => {
            let disk = disk.get_or_try_resolve(|| detector.detect_disk())?;
            copy_to_disk(&source, disk)?;
        }
    }
    Ok(())
}

fn write_script(path: &Path, contents: &str) -> Result<(), UploadError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| UploadError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn copy_to_disk(source: &Path, disk: &Path) -> Result<(), UploadError> {
    let file_name = source.file_name().ok_or_else(|| UploadError::Io {
        path: source.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file"),
    })?;
    let target = disk.join(file_name);
    info!("Uploading {} to {}", source.display(), disk.display());
    fs::copy(source, &target).map_err(|err| UploadError::Io {
        path: target.clone(),
        source: err,
    })?;
    Ok(())
}

/// Bridges the build graph's upload action to real hardware.
pub struct PlanUploader<'a> {
    runner: &'a dyn ToolRunner,
    detector: &'a dyn PortDetector,
    configured_port: Option<String>,
}

impl<'a> PlanUploader<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        detector: &'a dyn PortDetector,
        configured_port: Option<String>,
    ) -> Self {
        Self {
            runner,
            detector,
            configured_port,
        }
    }
}

impl Uploader for PlanUploader<'_> {
    fn upload(&self, plan: &UploadPlan) -> Result<(), UploadFailure> {
        execute_plan(
            plan,
            self.runner,
            self.detector,
            self.configured_port.as_deref(),
        )
        .map_err(UploadFailure::from)
    }
}
