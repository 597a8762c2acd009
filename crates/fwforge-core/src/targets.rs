use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::artifact::{ArtifactKind, ConversionRule};
use crate::command::CommandLine;
use crate::environment::BuildEnvironment;
use crate::upload::{UploadDispatch, UploadPlan};

pub const SIZE_TARGET: &str = "size";
pub const CHECK_SIZE_TARGET: &str = "checkprogsize";
pub const UPLOAD_TARGET: &str = "upload";
pub const BUILDPROG_TARGET: &str = "buildprog";
pub const NOBUILD_TARGET: &str = "nobuild";
pub const HEX_TARGET: &str = "hex";
pub const STATIC_LIB_TARGET: &str = "StaticLib";
pub const TEST_TARGET: &str = "__test";

/// Names that only steer mode decisions; they build nothing themselves.
pub const MARKER_TARGETS: &[&str] = &["debug", "sizedata", TEST_TARGET, "static"];

/// Target names given on the command line, in the order given.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestedTargets {
    names: Vec<String>,
}

impl RequestedTargets {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|candidate| candidate == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_test(&self) -> bool {
        self.contains(TEST_TARGET)
    }

    pub fn is_nobuild(&self) -> bool {
        self.contains(NOBUILD_TARGET)
    }

    /// Requested names that are not markers.
    pub fn explicit(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| !MARKER_TARGETS.contains(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    UnknownTarget { name: String, available: Vec<String> },
}

impl std::fmt::Display for TargetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetError::UnknownTarget { name, available } => write!(
                f,
                "unknown target '{}' (available: {})",
                name,
                available.join(", ")
            ),
        }
    }
}

impl std::error::Error for TargetError {}

/// How an artifact comes into existence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Producer {
    /// Compile the collected sources and link them.
    Program,
    /// Compile the collected sources and archive them.
    Archive,
    /// Convert the linked executable.
    Convert { rule: ConversionRule },
    /// Expected to exist already; never rebuilt.
    Existing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactNode {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub producer: Producer,
    /// Run right after the artifact is produced.
    pub post_actions: Vec<CommandLine>,
}

impl ArtifactNode {
    /// The artifact this node is derived from, if any.
    pub fn input(&self) -> Option<ArtifactKind> {
        match self.producer {
            Producer::Convert { .. } => Some(ArtifactKind::Executable),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetAction {
    PrintSize,
    CheckSize,
    Upload,
}

/// Named handle bound to one artifact and an ordered action list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TargetAlias {
    pub name: String,
    pub artifact: ArtifactKind,
    pub actions: Vec<TargetAction>,
    /// Run the actions on every invocation. Otherwise they run only when the
    /// artifact was rebuilt by the same invocation.
    pub always_build: bool,
}

impl TargetAlias {
    fn new(
        name: &str,
        artifact: ArtifactKind,
        actions: Vec<TargetAction>,
        always_build: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            artifact,
            actions,
            always_build,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGraph {
    pub artifacts: Vec<ArtifactNode>,
    pub aliases: Vec<TargetAlias>,
    pub defaults: Vec<String>,
    pub upload: UploadDispatch,
    pub warnings: Vec<String>,
}

impl TargetGraph {
    pub fn alias(&self, name: &str) -> Option<&TargetAlias> {
        self.aliases.iter().find(|alias| alias.name == name)
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactNode> {
        self.artifacts.iter().find(|node| node.kind == kind)
    }

    pub fn upload_plan(&self) -> Option<&UploadPlan> {
        self.upload.plan()
    }

    /// Aliases to run for `requested`. Only markers, or nothing at all,
    /// selects the default set.
    pub fn select(&self, requested: &RequestedTargets) -> Result<Vec<&TargetAlias>, TargetError> {
        let explicit: Vec<&str> = requested.explicit().collect();
        let names: Vec<&str> = if explicit.is_empty() {
            self.defaults.iter().map(String::as_str).collect()
        } else {
            explicit
        };
        names
            .into_iter()
            .map(|name| {
                self.alias(name).ok_or_else(|| TargetError::UnknownTarget {
                    name: name.to_string(),
                    available: self.aliases.iter().map(|alias| alias.name.clone()).collect(),
                })
            })
            .collect()
    }

    /// Artifact nodes needed for `kind`, inputs first.
    pub fn build_order(&self, kind: ArtifactKind) -> Vec<&ArtifactNode> {
        let mut order = Vec::new();
        if let Some(node) = self.artifact(kind) {
            if let Some(input) = node.input().and_then(|input| self.artifact(input)) {
                order.push(input);
            }
            order.push(node);
        }
        order
    }
}

/// Register artifacts and named targets for one invocation and pick the
/// defaults.
pub fn assemble_targets(
    env: &BuildEnvironment,
    requested: &RequestedTargets,
    upload: UploadDispatch,
) -> TargetGraph {
    let mut warnings = Vec::new();
    if let UploadDispatch::Unsupported { warning, .. } = &upload {
        warn!("{}", warning);
        warnings.push(warning.clone());
    }

    let is_static = env.artifact_kind == ArtifactKind::StaticLibrary;
    let mut artifacts = Vec::new();
    let mut aliases = Vec::new();

    if requested.is_nobuild() {
        for kind in [ArtifactKind::Executable, ArtifactKind::RawBinary] {
            artifacts.push(ArtifactNode {
                kind,
                path: env.artifact_path(kind),
                producer: Producer::Existing,
                post_actions: Vec::new(),
            });
        }
        aliases.push(TargetAlias::new(NOBUILD_TARGET, ArtifactKind::RawBinary, Vec::new(), true));
    } else if is_static {
        artifacts.push(ArtifactNode {
            kind: ArtifactKind::StaticLibrary,
            path: env.program_path(),
            producer: Producer::Archive,
            post_actions: Vec::new(),
        });
        aliases.push(TargetAlias::new(
            STATIC_LIB_TARGET,
            ArtifactKind::StaticLibrary,
            Vec::new(),
            true,
        ));
    } else {
        artifacts.push(ArtifactNode {
            kind: ArtifactKind::Executable,
            path: env.program_path(),
            producer: Producer::Program,
            post_actions: Vec::new(),
        });
        for rule in &env.conversions {
            let post_actions = match (&upload, rule.output) {
                (UploadDispatch::Plan(plan), ArtifactKind::RawBinary) => {
                    plan.post_build_actions.clone()
                }
                _ => Vec::new(),
            };
            artifacts.push(ArtifactNode {
                kind: rule.output,
                path: env.artifact_path(rule.output),
                producer: Producer::Convert { rule: rule.clone() },
                post_actions,
            });
        }
        aliases.push(TargetAlias::new(NOBUILD_TARGET, ArtifactKind::RawBinary, Vec::new(), true));
        aliases.push(TargetAlias::new(
            BUILDPROG_TARGET,
            ArtifactKind::RawBinary,
            Vec::new(),
            false,
        ));
        if env.conversion(ArtifactKind::IntelHex).is_some() {
            aliases.push(TargetAlias::new(HEX_TARGET, ArtifactKind::IntelHex, Vec::new(), false));
        }
    }

    let program = if is_static && !requested.is_nobuild() {
        ArtifactKind::StaticLibrary
    } else {
        ArtifactKind::Executable
    };
    aliases.push(TargetAlias::new(SIZE_TARGET, program, vec![TargetAction::PrintSize], true));
    if !requested.is_nobuild() {
        aliases.push(TargetAlias::new(
            CHECK_SIZE_TARGET,
            program,
            vec![TargetAction::CheckSize],
            true,
        ));
    }

    match &upload {
        UploadDispatch::Plan(plan) => aliases.push(TargetAlias::new(
            UPLOAD_TARGET,
            plan.source_artifact,
            vec![TargetAction::Upload],
            true,
        )),
        UploadDispatch::Unsupported { .. } => aliases.push(TargetAlias::new(
            UPLOAD_TARGET,
            ArtifactKind::RawBinary,
            Vec::new(),
            true,
        )),
        UploadDispatch::StaticLibrary => {}
    }

    let defaults = if is_static {
        vec![SIZE_TARGET.to_string()]
    } else {
        vec![BUILDPROG_TARGET.to_string(), SIZE_TARGET.to_string()]
    };

    TargetGraph {
        artifacts,
        aliases,
        defaults,
        upload,
        warnings,
    }
}
