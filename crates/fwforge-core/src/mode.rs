use std::fmt;

use serde::Serialize;

use crate::targets::RequestedTargets;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Release,
    Debug,
}

impl BuildMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Release => "release",
            BuildMode::Debug => "debug",
        }
    }

    pub fn is_debug(self) -> bool {
        self == BuildMode::Debug
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debug is selected when `debug` or `sizedata` is requested, or when the
/// project declares `build_type: debug`.
pub fn decide_build_mode(targets: &RequestedTargets, build_type: Option<&str>) -> BuildMode {
    if targets.contains("debug") || targets.contains("sizedata") || build_type == Some("debug") {
        BuildMode::Debug
    } else {
        BuildMode::Release
    }
}

pub fn program_name(base: &str, mode: BuildMode) -> String {
    match mode {
        BuildMode::Debug => format!("{}d", base),
        BuildMode::Release => base.to_string(),
    }
}
