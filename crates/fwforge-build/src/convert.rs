use std::path::Path;

use fwforge_core::artifact::ConversionRule;
use fwforge_core::command::CommandLine;
use fwforge_core::toolchain::Toolchain;

use crate::builder::{BuildError, BuildResult};

/// Command that turns `source` into `target` under `rule`, after checking
/// the executable is present.
pub fn conversion_command(
    rule: &ConversionRule,
    toolchain: &Toolchain,
    source: &Path,
    target: &Path,
) -> BuildResult<CommandLine> {
    if !source.exists() {
        return Err(BuildError::MissingArtifact {
            path: source.to_path_buf(),
        });
    }
    Ok(rule.command(toolchain, source, target))
}
