use fwforge_build::size::MemoryLimits;
use fwforge_build::{ExecutionReport, GraphExecutor, ProcessRunner, ToolRunner};
use fwforge_core::packages::{DirectoryPackages, PackageLocator};
use fwforge_upload::{PlanUploader, PortDetector, SystemPortDetector};
use tracing::info;

use crate::commands::{load_project, ProjectArgs};

pub fn run(args: ProjectArgs) -> Result<ExecutionReport, String> {
    let runner = ProcessRunner::new(args.verbose);
    let detector = SystemPortDetector::new();
    let packages = DirectoryPackages::from_env();
    execute(&args, &runner, &detector, &packages)
}

/// Compose, assemble and run the requested targets with the given tool
/// runner and port detector.
pub fn execute(
    args: &ProjectArgs,
    runner: &dyn ToolRunner,
    detector: &dyn PortDetector,
    packages: &dyn PackageLocator,
) -> Result<ExecutionReport, String> {
    let project = load_project(args, packages)?;
    info!(
        "{} ({}), upload protocol {}",
        project.board.id(),
        project.build.env.program_name,
        project.protocol
    );
    let uploader = PlanUploader::new(runner, detector, project.config.upload_port.clone());
    let executor = GraphExecutor::new(runner, &uploader, MemoryLimits::from_board(&project.board));
    executor
        .execute(&project.build, &project.graph, &project.requested)
        .map_err(|err| err.to_string())
}
