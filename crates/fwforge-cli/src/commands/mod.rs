pub mod plan;
pub mod run;

use std::path::PathBuf;

use fwforge_core::board::BoardDescriptor;
use fwforge_core::compose::{compose_build, ComposeInputs, ComposedBuild};
use fwforge_core::config::{load_project_config, ProjectConfig};
use fwforge_core::deps::LocalLibraryResolver;
use fwforge_core::hooks::ConfiguredHooks;
use fwforge_core::packages::PackageLocator;
use fwforge_core::targets::{assemble_targets, RequestedTargets, TargetGraph};
use fwforge_core::upload::{dispatch_upload, UploadContext, UploadProtocol};

pub struct ProjectArgs {
    pub project_dir: PathBuf,
    pub targets: Vec<String>,
    pub verbose: bool,
}

/// A project composed and assembled into its target graph.
pub struct LoadedProject {
    pub config: ProjectConfig,
    pub board: BoardDescriptor,
    pub protocol: UploadProtocol,
    pub requested: RequestedTargets,
    pub build: ComposedBuild,
    pub graph: TargetGraph,
}

pub fn load_project(
    args: &ProjectArgs,
    packages: &dyn PackageLocator,
) -> Result<LoadedProject, String> {
    let config = load_project_config(&args.project_dir).map_err(|err| err.to_string())?;
    let board = BoardDescriptor::load(&config.dirs.boards, &config.board)
        .map_err(|err| err.to_string())?;
    let protocol = UploadProtocol::resolve(
        &config.upload_protocol,
        &board,
        config.upload_command.as_deref(),
    );
    let requested = RequestedTargets::new(args.targets.iter().cloned());

    let build = compose_build(
        &ComposeInputs {
            config: &config,
            board: &board,
            requested: &requested,
            protocol: &protocol,
        },
        &ConfiguredHooks::new(config.framework_flags.clone()),
        &LocalLibraryResolver::new(),
    )
    .map_err(|err| err.to_string())?;

    let upload = dispatch_upload(
        &protocol,
        &UploadContext {
            board: &board,
            config: &config,
            env: &build.env,
            packages,
            verbose: args.verbose,
        },
    );
    let graph = assemble_targets(&build.env, &requested, upload);

    Ok(LoadedProject {
        config,
        board,
        protocol,
        requested,
        build,
        graph,
    })
}
