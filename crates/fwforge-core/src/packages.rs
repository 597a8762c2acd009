use std::path::PathBuf;

pub const PACKAGES_DIR_ENV: &str = "FWFORGE_PACKAGES_DIR";

/// Locates installed vendor tool packages such as `tool-openocd`.
pub trait PackageLocator {
    fn package_dir(&self, name: &str) -> Option<PathBuf>;
}

/// Packages installed as sub-directories of one root directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryPackages {
    root: Option<PathBuf>,
}

impl DirectoryPackages {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var_os(PACKAGES_DIR_ENV).map(PathBuf::from))
    }
}

impl PackageLocator for DirectoryPackages {
    fn package_dir(&self, name: &str) -> Option<PathBuf> {
        let dir = self.root.as_ref()?.join(name);
        if dir.is_dir() {
            Some(dir)
        } else {
            None
        }
    }
}
