use std::path::PathBuf;

use serde::Serialize;

use super::protocol::UploadProtocol;
use super::template::{self, TemplateError, TemplateValues};
use crate::artifact::ArtifactKind;
use crate::command::CommandLine;

/// Side-effecting step that runs before the main upload command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PreAction {
    /// Find the serial port of the target and bind `$UPLOAD_PORT`.
    AutodetectPort { description: String },
    /// Find the mass-storage mount point of the target.
    AutodetectDisk { description: String },
    /// Write a fresh command script, creating its directory first.
    WriteCommandScript { path: PathBuf, contents: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MainAction {
    /// Argument vector; a token equal to `$UPLOADERFLAGS` splices the flags.
    Run { template: Vec<String> },
    /// User-declared shell command, used verbatim after substitution.
    Shell { template: String },
    /// Copy the source artifact onto the detected disk.
    CopyToDisk,
}

/// A fully parameterized deployment procedure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadPlan {
    pub protocol: UploadProtocol,
    pub uploader: String,
    pub uploader_flags: Vec<String>,
    pub source_artifact: ArtifactKind,
    pub source_path: PathBuf,
    pub pre_actions: Vec<PreAction>,
    pub main_action: MainAction,
    /// Steps attached to the BIN artifact right after it is produced.
    pub post_build_actions: Vec<CommandLine>,
}

/// What the main action turns into once placeholders are bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedAction {
    Command(CommandLine),
    CopyToDisk { source: PathBuf },
}

impl UploadPlan {
    pub fn needs_port(&self) -> bool {
        self.pre_actions
            .iter()
            .any(|action| matches!(action, PreAction::AutodetectPort { .. }))
    }

    pub fn needs_disk(&self) -> bool {
        self.pre_actions
            .iter()
            .any(|action| matches!(action, PreAction::AutodetectDisk { .. }))
    }

    pub fn script_path(&self) -> Option<&PathBuf> {
        self.pre_actions.iter().find_map(|action| match action {
            PreAction::WriteCommandScript { path, .. } => Some(path),
            _ => None,
        })
    }

    /// Human-readable command template.
    pub fn command_template(&self) -> String {
        match &self.main_action {
            MainAction::Run { template } => template.join(" "),
            MainAction::Shell { template } => template.clone(),
            MainAction::CopyToDisk => "copy $SOURCE to the upload disk".to_string(),
        }
    }

    /// Base substitution values; the port is added by the executor once
    /// detected.
    pub fn template_values(&self) -> TemplateValues {
        let mut values = TemplateValues::new();
        values
            .set(template::UPLOADER, self.uploader.clone())
            .set(template::UPLOADER_FLAGS, self.uploader_flags.join(" "))
            .set(template::SOURCE, self.source_path.to_string_lossy());
        if let Some(script) = self.script_path() {
            values.set(template::SCRIPT, script.to_string_lossy());
        }
        values
    }

    pub fn render(&self, values: &TemplateValues) -> Result<RenderedAction, TemplateError> {
        let description = format!("Uploading {}", self.source_path.display());
        match &self.main_action {
            MainAction::CopyToDisk => Ok(RenderedAction::CopyToDisk {
                source: self.source_path.clone(),
            }),
            MainAction::Shell { template } => Ok(RenderedAction::Command(CommandLine::shell(
                &values.expand(template)?,
                description,
            ))),
            MainAction::Run { template } => {
                let mut argv = Vec::with_capacity(template.len() + self.uploader_flags.len());
                for token in template {
                    if token == "$UPLOADERFLAGS" {
                        for flag in &self.uploader_flags {
                            argv.push(values.expand(flag)?);
                        }
                    } else {
                        argv.push(values.expand(token)?);
                    }
                }
                let mut argv = argv.into_iter();
                let program = argv.next().unwrap_or_default();
                Ok(RenderedAction::Command(
                    CommandLine::new(program, description).args(argv),
                ))
            }
        }
    }
}
