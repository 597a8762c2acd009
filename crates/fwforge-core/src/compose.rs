use std::path::PathBuf;

use tracing::{info, warn};

use crate::artifact::ArtifactKind;
use crate::board::BoardDescriptor;
use crate::config::ProjectConfig;
use crate::deps::{
    merge_dependency_outputs, project_flags, DependencyError, DependencyOutputs, DependencyResolver,
};
use crate::environment::BuildEnvironment;
use crate::flags::{parse_all, FlagKind, FlagList, MergeOp};
use crate::hooks::{FrameworkHooks, HookError, BARE_FRAMEWORK};
use crate::mode::{decide_build_mode, program_name};
use crate::sources::collect_sources;
use crate::targets::RequestedTargets;
use crate::upload::UploadProtocol;

pub const DEPRECATED_LDSCRIPT_WARNING: &str = "Warning! '-Wl,-T' option for specifying linker \
scripts is deprecated. Please use the 'build.ldscript' board option instead.";

#[derive(Debug)]
pub enum ComposeError {
    Hook(HookError),
    Dependency(DependencyError),
    Sources { path: PathBuf, source: walkdir::Error },
    NoSources { source_dir: PathBuf },
}

impl std::fmt::Display for ComposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeError::Hook(err) => write!(f, "{}", err),
            ComposeError::Dependency(err) => write!(f, "{}", err),
            ComposeError::Sources { path, source } => write!(
                f,
                "failed to collect sources from '{}': {}",
                path.display(),
                source
            ),
            ComposeError::NoSources { source_dir } => write!(
                f,
                "Nothing to build. Please put your source code files to '{}' folder",
                source_dir.display()
            ),
        }
    }
}

impl std::error::Error for ComposeError {}

impl From<HookError> for ComposeError {
    fn from(err: HookError) -> Self {
        ComposeError::Hook(err)
    }
}

impl From<DependencyError> for ComposeError {
    fn from(err: DependencyError) -> Self {
        ComposeError::Dependency(err)
    }
}

/// Everything the flag composer reads.
pub struct ComposeInputs<'a> {
    pub config: &'a ProjectConfig,
    pub board: &'a BoardDescriptor,
    pub requested: &'a RequestedTargets,
    pub protocol: &'a UploadProtocol,
}

/// Outcome of flag composition for one invocation.
#[derive(Clone, Debug)]
pub struct ComposedBuild {
    pub env: BuildEnvironment,
    /// Flags used for project (non-library) sources.
    pub project_flags: FlagList,
    pub dependencies: DependencyOutputs,
    pub sources: Vec<PathBuf>,
}

/// Run every composition stage in order.
pub fn compose_build(
    inputs: &ComposeInputs<'_>,
    hooks: &dyn FrameworkHooks,
    resolver: &dyn DependencyResolver,
) -> Result<ComposedBuild, ComposeError> {
    let mut env = BuildEnvironment::new(inputs.config);

    apply_board_flags(&mut env, inputs.board);
    apply_build_flags(&mut env, inputs.config);
    bootstrap_frameworks(&mut env, inputs.board, hooks)?;
    select_mode(&mut env, inputs, hooks)?;
    apply_unflags(&mut env, inputs.config);
    select_artifact_kind(&mut env, inputs.protocol);
    enable_library_grouping(&mut env);
    if inputs.requested.is_test() {
        hooks.configure_test_target(&mut env)?;
    }

    let dependencies = resolver.resolve(&env)?;
    merge_dependency_outputs(&mut env, &dependencies);
    let src_flags = parse_all(&inputs.config.src_build_flags);
    let project_flags = project_flags(&env, &dependencies, &src_flags);

    let sources = collect_build_sources(&env, inputs)?;
    if sources.is_empty() && inputs.requested.is_empty() {
        return Err(ComposeError::NoSources {
            source_dir: env.src_dir.clone(),
        });
    }

    warn_deprecated_ldscript(&mut env);
    info!("Building in {} mode", env.mode);

    Ok(ComposedBuild {
        env,
        project_flags,
        dependencies,
        sources,
    })
}

pub fn apply_board_flags(env: &mut BuildEnvironment, board: &BoardDescriptor) {
    if let Some(extra) = board.extra_flags() {
        env.flags.apply(MergeOp::Append(parse_all(&extra)));
    }
}

pub fn apply_build_flags(env: &mut BuildEnvironment, config: &ProjectConfig) {
    env.flags.apply(MergeOp::Append(parse_all(&config.build_flags)));
}

/// Bootstrap each declared framework, or the bare one when none is declared.
pub fn bootstrap_frameworks(
    env: &mut BuildEnvironment,
    board: &BoardDescriptor,
    hooks: &dyn FrameworkHooks,
) -> Result<(), HookError> {
    let frameworks = if env.frameworks.is_empty() {
        vec![BARE_FRAMEWORK.to_string()]
    } else {
        env.frameworks.clone()
    };
    for framework in &frameworks {
        hooks.bootstrap_framework(framework, env, board)?;
    }
    Ok(())
}

/// Decide release or debug, name the program, and inject debug flags.
pub fn select_mode(
    env: &mut BuildEnvironment,
    inputs: &ComposeInputs<'_>,
    hooks: &dyn FrameworkHooks,
) -> Result<(), HookError> {
    env.mode = decide_build_mode(inputs.requested, inputs.config.build_type.as_deref());
    let base = inputs.board.mcu().unwrap_or_else(|| inputs.board.id());
    env.program_name = program_name(base, env.mode);
    if env.mode.is_debug() {
        hooks.configure_debug_flags(env)?;
    }
    Ok(())
}

/// Remove unflagged entries from the fully merged state, whatever stage
/// added them.
pub fn apply_unflags(env: &mut BuildEnvironment, config: &ProjectConfig) {
    let patterns = parse_all(&config.build_unflags);
    if !patterns.is_empty() {
        env.flags.remove_matching(patterns);
    }
}

pub fn select_artifact_kind(env: &mut BuildEnvironment, protocol: &UploadProtocol) {
    env.artifact_kind = if protocol.is_static() {
        ArtifactKind::StaticLibrary
    } else {
        ArtifactKind::Executable
    };
}

pub fn enable_library_grouping(env: &mut BuildEnvironment) {
    env.group_libraries = env.toolchain.is_gcc() && env.flags.has_kind(FlagKind::Library);
}

fn collect_build_sources(
    env: &BuildEnvironment,
    inputs: &ComposeInputs<'_>,
) -> Result<Vec<PathBuf>, ComposeError> {
    let is_test = inputs.requested.is_test();
    let mut roots = Vec::new();
    if is_test {
        roots.push(env.test_dir.clone());
    }
    if !is_test || inputs.config.test_build_project_src {
        roots.push(env.src_dir.clone());
    }
    let mut sources = Vec::new();
    for root in roots {
        let found = collect_sources(&root).map_err(|source| ComposeError::Sources {
            path: root.clone(),
            source,
        })?;
        sources.extend(found);
    }
    Ok(sources)
}

fn warn_deprecated_ldscript(env: &mut BuildEnvironment) {
    let deprecated = env
        .flags
        .of_kind(FlagKind::LinkFlag)
        .any(|flag| flag.value.contains("-Wl,-T"));
    if deprecated {
        warn!("{}", DEPRECATED_LDSCRIPT_WARNING);
        env.warnings.push(DEPRECATED_LDSCRIPT_WARNING.to_string());
    }
}
