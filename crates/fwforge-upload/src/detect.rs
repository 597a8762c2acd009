use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::UploadError;

/// Serial port name prefixes of USB CDC and USB-serial adapters.
pub const PORT_PREFIXES: &[&str] = &["ttyACM", "ttyUSB", "cu.usbmodem", "cu.usbserial"];

/// Files an mbed interface chip places at the root of its disk.
pub const MBED_MARKERS: &[&str] = &["MBED.HTM", "mbed.htm", "DETAILS.TXT", "details.txt"];

/// Hardware discovery used by upload pre-actions.
pub trait PortDetector {
    fn detect_port(&self) -> Result<String, UploadError>;

    fn detect_disk(&self) -> Result<PathBuf, UploadError>;
}

/// Probes device nodes and removable-media mount points of the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemPortDetector {
    device_dir: PathBuf,
    mount_roots: Vec<PathBuf>,
}

impl SystemPortDetector {
    pub fn new() -> Self {
        let mut mount_roots = Vec::new();
        if let Ok(user) = std::env::var("USER") {
            mount_roots.push(Path::new("/media").join(&user));
            mount_roots.push(Path::new("/run/media").join(&user));
        }
        mount_roots.push(PathBuf::from("/media"));
        mount_roots.push(PathBuf::from("/Volumes"));
        mount_roots.push(PathBuf::from("/mnt"));
        Self::with_roots("/dev", mount_roots)
    }

    pub fn with_roots(device_dir: impl Into<PathBuf>, mount_roots: Vec<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
            mount_roots,
        }
    }
}

impl Default for SystemPortDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PortDetector for SystemPortDetector {
    fn detect_port(&self) -> Result<String, UploadError> {
        let port = sorted_children(&self.device_dir)
            .into_iter()
            .find(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| PORT_PREFIXES.iter().any(|prefix| name.starts_with(prefix)))
                    .unwrap_or(false)
            })
            .ok_or_else(|| UploadError::NoPort {
                searched: vec![self.device_dir.clone()],
            })?;
        debug!("detected upload port {}", port.display());
        Ok(port.to_string_lossy().into_owned())
    }

    fn detect_disk(&self) -> Result<PathBuf, UploadError> {
        for root in &self.mount_roots {
            for candidate in sorted_children(root) {
                if candidate.is_dir()
                    && MBED_MARKERS
                        .iter()
                        .any(|marker| candidate.join(marker).is_file())
                {
                    debug!("detected upload disk {}", candidate.display());
                    return Ok(candidate);
                }
            }
        }
        Err(UploadError::NoDisk {
            searched: self.mount_roots.clone(),
        })
    }
}

fn sorted_children(dir: &Path) -> Vec<PathBuf> {
    let mut children: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .collect(),
        Err(_) => Vec::new(),
    };
    children.sort();
    children
}
