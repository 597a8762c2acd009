use std::path::PathBuf;

use fwforge_core::artifact::ArtifactKind;
use fwforge_core::compose::ComposedBuild;
use fwforge_core::targets::{
    ArtifactNode, Producer, RequestedTargets, TargetAction, TargetAlias, TargetGraph,
    UPLOAD_TARGET,
};
use tracing::{debug, error, info, warn};

use crate::builder::{BuildError, BuildResult, ToolRunner, Uploader};
use crate::convert::conversion_command;
use crate::fingerprint::{fingerprint, BuildState};
use crate::gcc::GccBuilder;
use crate::size::{
    check_size, parse_section_sizes, size_check_command, size_print_command, MemoryLimits,
};

/// What one invocation did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub targets: Vec<String>,
    pub built: Vec<PathBuf>,
    pub up_to_date: Vec<PathBuf>,
    pub uploaded: bool,
}

/// Runs the selected targets of a [`TargetGraph`].
pub struct GraphExecutor<'a> {
    runner: &'a dyn ToolRunner,
    uploader: &'a dyn Uploader,
    limits: MemoryLimits,
}

struct Progress {
    state: BuildState,
    ready: Vec<ArtifactKind>,
    objects: Option<Vec<PathBuf>>,
    report: ExecutionReport,
    upload_failures: Vec<String>,
}

impl<'a> GraphExecutor<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        uploader: &'a dyn Uploader,
        limits: MemoryLimits,
    ) -> Self {
        Self {
            runner,
            uploader,
            limits,
        }
    }

    /// Build and run every requested target. Upload failures do not stop
    /// the remaining targets but fail the invocation once they are done.
    pub fn execute(
        &self,
        build: &ComposedBuild,
        graph: &TargetGraph,
        requested: &RequestedTargets,
    ) -> BuildResult<ExecutionReport> {
        let selected = graph.select(requested)?;
        let mut progress = Progress {
            state: BuildState::load(&build.env.build_dir)?,
            ready: Vec::new(),
            objects: None,
            report: ExecutionReport::default(),
            upload_failures: Vec::new(),
        };

        let outcome = selected
            .iter()
            .try_for_each(|alias| self.run_alias(alias, build, graph, &mut progress));
        progress.state.save()?;
        outcome?;

        if !progress.upload_failures.is_empty() {
            return Err(BuildError::Upload {
                failures: progress.upload_failures,
            });
        }
        Ok(progress.report)
    }

    fn run_alias(
        &self,
        alias: &TargetAlias,
        build: &ComposedBuild,
        graph: &TargetGraph,
        progress: &mut Progress,
    ) -> BuildResult<()> {
        for node in graph.build_order(alias.artifact) {
            if progress.ready.contains(&node.kind) {
                continue;
            }
            self.produce(node, build, graph, progress)?;
            progress.ready.push(node.kind);
        }
        let path = build.env.artifact_path(alias.artifact);
        let artifact = graph
            .artifact(alias.artifact)
            .map(|node| node.path.clone())
            .unwrap_or(path);

        if alias.actions.is_empty() && alias.name == UPLOAD_TARGET {
            warn!("target '{}' has no upload action registered", alias.name);
        }
        if !alias.always_build
            && !alias.actions.is_empty()
            && !progress.report.built.contains(&artifact)
        {
            debug!("target '{}' skipped, {} unchanged", alias.name, artifact.display());
            progress.report.targets.push(alias.name.clone());
            return Ok(());
        }
        for action in &alias.actions {
            match action {
                TargetAction::PrintSize => {
                    self.runner
                        .run(&size_print_command(&build.env.toolchain, &artifact))?;
                }
                TargetAction::CheckSize => {
                    let output = self
                        .runner
                        .capture(&size_check_command(&build.env.toolchain, &artifact))?;
                    check_size(parse_section_sizes(&output, &build.env.toolchain), self.limits)?;
                }
                TargetAction::Upload => self.upload(graph, progress),
            }
        }
        progress.report.targets.push(alias.name.clone());
        Ok(())
    }

    fn upload(&self, graph: &TargetGraph, progress: &mut Progress) {
        let Some(plan) = graph.upload_plan() else {
            return;
        };
        match self.uploader.upload(plan) {
            Ok(()) => progress.report.uploaded = true,
            Err(failure) => {
                error!("upload via {} failed: {}", plan.protocol, failure);
                progress.upload_failures.push(failure.message);
            }
        }
    }

    fn produce(
        &self,
        node: &ArtifactNode,
        build: &ComposedBuild,
        graph: &TargetGraph,
        progress: &mut Progress,
    ) -> BuildResult<()> {
        let builder = GccBuilder::new(self.runner);
        // Fingerprint to record once the post actions have succeeded.
        let mut pending = None;
        let rebuilt = match &node.producer {
            Producer::Existing => {
                if !node.path.exists() {
                    return Err(BuildError::MissingArtifact {
                        path: node.path.clone(),
                    });
                }
                false
            }
            Producer::Program | Producer::Archive => {
                let objects = match progress.objects.take() {
                    Some(objects) => objects,
                    None => builder.compile(build, &mut progress.state)?,
                };
                let rebuilt = if node.producer == Producer::Archive {
                    builder.archive(&build.env, &objects, &mut progress.state)?
                } else {
                    builder.link(&build.env, &objects, &mut progress.state)?
                };
                progress.objects = Some(objects);
                rebuilt
            }
            Producer::Convert { rule } => {
                let source = graph
                    .artifact(ArtifactKind::Executable)
                    .map(|input| input.path.clone())
                    .unwrap_or_else(|| build.env.program_path());
                let command =
                    conversion_command(rule, &build.env.toolchain, &source, &node.path)?;
                let mut steps = vec![&command];
                steps.extend(node.post_actions.iter());
                let print = fingerprint(&steps, std::slice::from_ref(&source))?;
                if progress.state.is_current(&node.path, &print) {
                    false
                } else {
                    progress.state.forget(&node.path);
                    self.runner.run(&command)?;
                    pending = Some(print);
                    true
                }
            }
        };

        if rebuilt {
            for action in &node.post_actions {
                if let Err(err) = self.runner.run(action) {
                    progress.state.forget(&node.path);
                    return Err(err);
                }
            }
            if let Some(print) = pending {
                progress.state.record(&node.path, print);
            }
            progress.report.built.push(node.path.clone());
        } else {
            info!("{} is up to date", node.path.display());
            progress.report.up_to_date.push(node.path.clone());
        }
        Ok(())
    }
}
