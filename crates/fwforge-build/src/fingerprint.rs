use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fwforge_core::command::CommandLine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::builder::{BuildError, BuildResult};

pub const STATE_FILE: &str = "fwforge-state.json";

/// SHA-256 over the rendered command lines, in order, and the contents of
/// every input.
pub fn fingerprint(commands: &[&CommandLine], inputs: &[PathBuf]) -> BuildResult<String> {
    let mut hasher = Sha256::new();
    for command in commands {
        hasher.update([2u8]);
        hasher.update(command.program.as_bytes());
        for arg in &command.args {
            hasher.update([0u8]);
            hasher.update(arg.as_bytes());
        }
    }
    for input in inputs {
        let contents = fs::read(input).map_err(|source| BuildError::Io {
            path: input.clone(),
            source,
        })?;
        hasher.update([1u8]);
        hasher.update(input.to_string_lossy().as_bytes());
        hasher.update(&contents);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    outputs: BTreeMap<String, String>,
}

/// Fingerprints recorded for outputs of previous invocations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildState {
    path: PathBuf,
    state: StateFile,
}

impl BuildState {
    pub fn load(build_dir: &Path) -> BuildResult<Self> {
        let path = build_dir.join(STATE_FILE);
        let state = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| BuildError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&contents).map_err(|err| BuildError::State {
                path: path.clone(),
                message: err.to_string(),
            })?
        } else {
            StateFile::default()
        };
        Ok(Self { path, state })
    }

    /// Whether `output` exists and was produced with `fingerprint`.
    pub fn is_current(&self, output: &Path, fingerprint: &str) -> bool {
        output.exists()
            && self.state.outputs.get(&key(output)).map(String::as_str) == Some(fingerprint)
    }

    pub fn record(&mut self, output: &Path, fingerprint: String) {
        self.state.outputs.insert(key(output), fingerprint);
    }

    /// Drop the record for `output` so the next invocation rebuilds it.
    pub fn forget(&mut self, output: &Path) {
        self.state.outputs.remove(&key(output));
    }

    pub fn save(&self) -> BuildResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = serde_json::to_string_pretty(&self.state).map_err(|err| BuildError::State {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        fs::write(&self.path, contents).map_err(|source| BuildError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_tracks_command_and_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("main.c");
        fs::write(&input, "int x;").expect("write");
        let command = CommandLine::new("gcc", "Compiling").args(["-c", "main.c"]);

        let first = fingerprint(&[&command], &[input.clone()]).expect("first");
        assert_eq!(first.len(), 64);
        assert_eq!(first, fingerprint(&[&command], &[input.clone()]).expect("again"));

        let other = command.clone().arg("-Os");
        assert_ne!(first, fingerprint(&[&other], &[input.clone()]).expect("flags"));

        fs::write(&input, "int y;").expect("rewrite");
        assert_ne!(first, fingerprint(&[&command], &[input]).expect("contents"));
    }

    #[test]
    fn follow_up_commands_change_the_fingerprint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("firmware.elf");
        fs::write(&input, b"elf").expect("write");
        let objcopy = CommandLine::new("objcopy", "Building").args(["-O", "binary"]);
        let suffix = CommandLine::new("dfu-suffix", "Adding dfu suffix").args(["-a", "fw.bin"]);

        let plain = fingerprint(&[&objcopy], &[input.clone()]).expect("plain");
        let suffixed = fingerprint(&[&objcopy, &suffix], &[input]).expect("suffixed");
        assert_ne!(plain, suffixed);
    }

    #[test]
    fn forgotten_outputs_are_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("firmware.bin");
        fs::write(&output, b"bin").expect("output");
        let mut state = BuildState::load(dir.path()).expect("load");
        state.record(&output, "abc".to_string());
        state.forget(&output);
        assert!(!state.is_current(&output, "abc"));
    }

    #[test]
    fn state_round_trips_through_build_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("firmware.elf");
        fs::write(&output, b"elf").expect("output");

        let mut state = BuildState::load(dir.path()).expect("load");
        assert!(!state.is_current(&output, "abc"));
        state.record(&output, "abc".to_string());
        state.save().expect("save");

        let reloaded = BuildState::load(dir.path()).expect("reload");
        assert!(reloaded.is_current(&output, "abc"));
        assert!(!reloaded.is_current(&output, "def"));
        fs::remove_file(&output).expect("remove");
        assert!(!reloaded.is_current(&output, "abc"));
    }

    #[test]
    fn corrupt_state_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(STATE_FILE), "{not json").expect("write");
        assert!(matches!(
            BuildState::load(dir.path()),
            Err(BuildError::State { .. })
        ));
    }
}
