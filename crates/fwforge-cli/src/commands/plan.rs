use fwforge_core::packages::{DirectoryPackages, PackageLocator};
use fwforge_core::upload::UploadDispatch;
use serde_json::{json, Value};

use crate::commands::{load_project, ProjectArgs};

pub fn run(args: ProjectArgs) -> Result<Value, String> {
    describe(&args, &DirectoryPackages::from_env())
}

/// Everything the build would do, without running any tool.
pub fn describe(args: &ProjectArgs, packages: &dyn PackageLocator) -> Result<Value, String> {
    let project = load_project(args, packages)?;
    let env = &project.build.env;
    let selected: Vec<&str> = project
        .graph
        .select(&project.requested)
        .map_err(|err| err.to_string())?
        .into_iter()
        .map(|alias| alias.name.as_str())
        .collect();

    let upload = match &project.graph.upload {
        UploadDispatch::Plan(plan) => json!({
            "protocol": plan.protocol,
            "uploader": plan.uploader,
            "uploader_flags": plan.uploader_flags,
            "source": plan.source_path,
            "command": plan.command_template(),
            "pre_actions": plan.pre_actions,
            "post_build_actions": plan.post_build_actions,
        }),
        UploadDispatch::StaticLibrary => Value::Null,
        UploadDispatch::Unsupported { protocol, warning } => json!({
            "protocol": protocol,
            "warning": warning,
        }),
    };

    Ok(json!({
        "board": project.board.id(),
        "mode": env.mode,
        "program": env.program_path(),
        "artifact_kind": env.artifact_kind,
        "compile_args": project.build.project_flags.compile_args(),
        "link_args": env.flags.link_args(),
        "library_args": env.flags.library_args(env.group_libraries),
        "sources": project.build.sources,
        "targets": selected,
        "defaults": project.graph.defaults,
        "aliases": project.graph.aliases,
        "artifacts": project.graph.artifacts,
        "upload": upload,
        "warnings": env.warnings.iter().chain(project.graph.warnings.iter()).collect::<Vec<_>>(),
    }))
}
