use std::collections::BTreeMap;

use crate::board::BoardDescriptor;
use crate::environment::BuildEnvironment;
use crate::flags::{parse_all, Flag, FlagKind, MergeOp};

pub const BARE_FRAMEWORK: &str = "bare";
pub const DEBUG_BUILD_DEFINE: &str = "FWFORGE_BUILD_DEBUG";
pub const UNIT_TEST_DEFINE: &str = "UNIT_TEST";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for HookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "build hook failed: {}", self.message)
    }
}

impl std::error::Error for HookError {}

/// Framework, debug and test collaborators invoked by the flag composer.
pub trait FrameworkHooks {
    fn bootstrap_framework(
        &self,
        name: &str,
        env: &mut BuildEnvironment,
        board: &BoardDescriptor,
    ) -> Result<(), HookError>;

    fn configure_debug_flags(&self, env: &mut BuildEnvironment) -> Result<(), HookError>;

    fn configure_test_target(&self, env: &mut BuildEnvironment) -> Result<(), HookError>;
}

/// Hooks driven purely by project configuration.
#[derive(Clone, Debug, Default)]
pub struct ConfiguredHooks {
    framework_flags: BTreeMap<String, Vec<String>>,
}

impl ConfiguredHooks {
    pub fn new(framework_flags: BTreeMap<String, Vec<String>>) -> Self {
        Self { framework_flags }
    }
}

impl FrameworkHooks for ConfiguredHooks {
    fn bootstrap_framework(
        &self,
        name: &str,
        env: &mut BuildEnvironment,
        _board: &BoardDescriptor,
    ) -> Result<(), HookError> {
        if name == BARE_FRAMEWORK {
            return Ok(());
        }
        let flags = self.framework_flags.get(name).ok_or_else(|| {
            HookError::new(format!("no build settings declared for framework '{}'", name))
        })?;
        env.flags.apply(MergeOp::Append(parse_all(flags)));
        Ok(())
    }

    fn configure_debug_flags(&self, env: &mut BuildEnvironment) -> Result<(), HookError> {
        env.flags.remove_matching(vec![Flag::raw("-O*")]);
        env.flags.apply(MergeOp::Append(vec![
            Flag::raw("-Og"),
            Flag::raw("-g2"),
            Flag::raw("-ggdb2"),
        ]));
        env.flags.apply(MergeOp::AppendUnique(vec![Flag::define(DEBUG_BUILD_DEFINE)]));
        Ok(())
    }

    fn configure_test_target(&self, env: &mut BuildEnvironment) -> Result<(), HookError> {
        let test_dir = env.test_dir.to_string_lossy().into_owned();
        env.flags.apply(MergeOp::AppendUnique(vec![
            Flag::define(UNIT_TEST_DEFINE),
            Flag::new(FlagKind::IncludePath, test_dir),
        ]));
        Ok(())
    }
}
