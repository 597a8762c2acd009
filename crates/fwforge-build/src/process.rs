use std::process::{Command, Stdio};

use fwforge_core::command::CommandLine;
use tracing::{debug, info};

use crate::builder::{BuildError, BuildResult, ToolRunner};

/// Spawns toolchain commands as child processes.
#[derive(Clone, Debug, Default)]
pub struct ProcessRunner {
    verbose: bool,
}

impl ProcessRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn announce(&self, command: &CommandLine) {
        if self.verbose {
            info!("{}", command);
        } else {
            info!("{}", command.description);
            debug!("{}", command);
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, command: &CommandLine) -> BuildResult<()> {
        self.announce(command);
        let status = Command::new(&command.program)
            .args(&command.args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| BuildError::Spawn {
                program: command.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(BuildError::ToolFailed {
                description: command.description.clone(),
                status: status.code(),
            });
        }
        Ok(())
    }

    fn capture(&self, command: &CommandLine) -> BuildResult<String> {
        debug!("{}", command);
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| BuildError::Spawn {
                program: command.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(BuildError::ToolFailed {
                description: command.description.clone(),
                status: output.status.code(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
