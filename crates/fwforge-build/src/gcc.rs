use std::path::{Path, PathBuf};

use fwforge_core::command::CommandLine;
use fwforge_core::compose::ComposedBuild;
use fwforge_core::environment::BuildEnvironment;
use fwforge_core::flags::{FlagKind, FlagList};
use fwforge_core::sources::collect_headers;

use crate::builder::{BuildError, BuildResult, ToolRunner};
use crate::fingerprint::{fingerprint, BuildState};

/// A compile step for one source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileStep {
    pub source: PathBuf,
    pub object: PathBuf,
    pub command: CommandLine,
}

/// Compiles project sources and links or archives them directly with the
/// GCC toolchain.
pub struct GccBuilder<'a> {
    runner: &'a dyn ToolRunner,
}

impl<'a> GccBuilder<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Self { runner }
    }

    pub fn compile_steps(&self, build: &ComposedBuild) -> Vec<CompileStep> {
        build
            .sources
            .iter()
            .map(|source| compile_step(&build.env, &build.project_flags, source))
            .collect()
    }

    /// Compile stale objects and return every object path in source order.
    ///
    /// Every project header is an input of every object, so editing one
    /// recompiles all sources.
    pub fn compile(
        &self,
        build: &ComposedBuild,
        state: &mut BuildState,
    ) -> BuildResult<Vec<PathBuf>> {
        let headers = header_inputs(build)?;
        let mut objects = Vec::with_capacity(build.sources.len());
        for step in self.compile_steps(build) {
            let mut inputs = Vec::with_capacity(headers.len() + 1);
            inputs.push(step.source.clone());
            inputs.extend(headers.iter().cloned());
            let print = fingerprint(&[&step.command], &inputs)?;
            if !state.is_current(&step.object, &print) {
                create_parent(&step.object)?;
                state.forget(&step.object);
                self.runner.run(&step.command)?;
                state.record(&step.object, print);
            }
            objects.push(step.object);
        }
        Ok(objects)
    }

    /// Link the ELF program. Returns whether it was rebuilt.
    pub fn link(
        &self,
        env: &BuildEnvironment,
        objects: &[PathBuf],
        state: &mut BuildState,
    ) -> BuildResult<bool> {
        let output = env.program_path();
        let command = link_command(env, objects, &output);
        self.run_if_stale(&command, objects, &output, false, state)
    }

    /// Archive objects into the static library. Returns whether it was
    /// rebuilt.
    pub fn archive(
        &self,
        env: &BuildEnvironment,
        objects: &[PathBuf],
        state: &mut BuildState,
    ) -> BuildResult<bool> {
        let output = env.program_path();
        let command = archive_command(env, objects, &output);
        self.run_if_stale(&command, objects, &output, true, state)
    }

    fn run_if_stale(
        &self,
        command: &CommandLine,
        inputs: &[PathBuf],
        output: &Path,
        replace_existing: bool,
        state: &mut BuildState,
    ) -> BuildResult<bool> {
        let print = fingerprint(&[command], inputs)?;
        if state.is_current(output, &print) {
            return Ok(false);
        }
        create_parent(output)?;
        state.forget(output);
        if replace_existing && output.exists() {
            // `ar rc` appends to an existing archive.
            std::fs::remove_file(output).map_err(|source| BuildError::Io {
                path: output.to_path_buf(),
                source,
            })?;
        }
        self.runner.run(command)?;
        state.record(output, print);
        Ok(true)
    }
}

pub fn compile_step(env: &BuildEnvironment, flags: &FlagList, source: &Path) -> CompileStep {
    let object = object_path(env, source);
    let compiler = if is_cxx(source) {
        &env.toolchain.cxx
    } else {
        &env.toolchain.cc
    };
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let command = CommandLine::new(compiler, format!("Compiling {}", file_name))
        .arg("-o")
        .arg(object.to_string_lossy())
        .arg("-c")
        .args(flags.compile_args())
        .arg(source.to_string_lossy());
    CompileStep {
        source: source.to_path_buf(),
        object,
        command,
    }
}

pub fn link_command(env: &BuildEnvironment, objects: &[PathBuf], output: &Path) -> CommandLine {
    CommandLine::new(&env.toolchain.cc, format!("Linking {}", display_name(output)))
        .arg("-o")
        .arg(output.to_string_lossy())
        .args(env.flags.link_args())
        .args(objects.iter().map(|object| object.to_string_lossy().into_owned()))
        .args(env.flags.library_args(env.group_libraries))
}

pub fn archive_command(env: &BuildEnvironment, objects: &[PathBuf], output: &Path) -> CommandLine {
    CommandLine::new(&env.toolchain.ar, format!("Archiving {}", display_name(output)))
        .args(env.toolchain.ar_flags.iter().cloned())
        .arg(output.to_string_lossy())
        .args(objects.iter().map(|object| object.to_string_lossy().into_owned()))
}

/// Headers under the source, test and include-path directories.
pub fn header_inputs(build: &ComposedBuild) -> BuildResult<Vec<PathBuf>> {
    let mut roots = vec![build.env.src_dir.clone(), build.env.test_dir.clone()];
    roots.extend(
        build
            .project_flags
            .of_kind(FlagKind::IncludePath)
            .map(|flag| PathBuf::from(&flag.value)),
    );
    collect_headers(&roots).map_err(|err| BuildError::Io {
        path: err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| build.env.src_dir.clone()),
        source: err.into(),
    })
}

/// Object path mirroring the source layout under the build directory.
pub fn object_path(env: &BuildEnvironment, source: &Path) -> PathBuf {
    let relative = if let Ok(rest) = source.strip_prefix(&env.src_dir) {
        Path::new("src").join(rest)
    } else if let Ok(rest) = source.strip_prefix(&env.test_dir) {
        Path::new("test").join(rest)
    } else {
        PathBuf::from(source.file_name().unwrap_or(source.as_os_str()))
    };
    let mut object = env.build_dir.join(relative).into_os_string();
    object.push(".o");
    PathBuf::from(object)
}

fn is_cxx(source: &Path) -> bool {
    matches!(
        source.extension().and_then(|ext| ext.to_str()),
        Some("cc" | "cpp" | "cxx")
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn create_parent(path: &Path) -> BuildResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BuildError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
