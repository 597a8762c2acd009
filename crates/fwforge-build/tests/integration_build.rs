use std::cell::RefCell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fwforge_build::{
    size::MemoryLimits, BuildError, BuildResult, GraphExecutor, ToolRunner, UploadFailure,
    Uploader,
};
use fwforge_core::{
    board::BoardDescriptor,
    command::CommandLine,
    compose::{compose_build, ComposedBuild, ComposeInputs},
    config::ProjectConfig,
    deps::LocalLibraryResolver,
    hooks::ConfiguredHooks,
    packages::DirectoryPackages,
    targets::{assemble_targets, RequestedTargets, TargetAction, TargetGraph},
    upload::{dispatch_upload, UploadContext, UploadPlan, UploadProtocol},
};

const SYSV_OUTPUT: &str = "section size addr\n.text 4096 0\n.data 128 0\n.bss 512 0\n";

fn temp_dir(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let stamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    path.push(format!("fwforge-build-integration-{}-{}", name, stamp));
    fs::create_dir_all(&path).expect("create temp dir");
    path
}

/// Records commands and fakes their outputs on disk.
#[derive(Default)]
struct FakeToolchain {
    commands: RefCell<Vec<CommandLine>>,
    fail_once: RefCell<Option<String>>,
}

impl FakeToolchain {
    fn programs(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .map(|command| command.program.clone())
            .collect()
    }

    fn clear(&self) {
        self.commands.borrow_mut().clear();
    }

    /// Make the next run of `program` exit with status 1.
    fn fail_next(&self, program: &str) {
        *self.fail_once.borrow_mut() = Some(program.to_string());
    }
}

impl ToolRunner for FakeToolchain {
    fn run(&self, command: &CommandLine) -> BuildResult<()> {
        self.commands.borrow_mut().push(command.clone());
        if self.fail_once.borrow().as_deref() == Some(command.program.as_str()) {
            self.fail_once.borrow_mut().take();
            return Err(BuildError::ToolFailed {
                description: command.description.clone(),
                status: Some(1),
            });
        }
        let output = if command.program.ends_with("objcopy") {
            command.args.last().cloned()
        } else if command.program.ends_with("-ar") {
            command.args.get(1).cloned()
        } else {
            command
                .args
                .iter()
                .position(|arg| arg == "-o")
                .and_then(|index| command.args.get(index + 1).cloned())
        };
        if let Some(output) = output {
            fs::write(output, command.to_string()).expect("fake output");
        }
        Ok(())
    }

    fn capture(&self, command: &CommandLine) -> BuildResult<String> {
        self.commands.borrow_mut().push(command.clone());
        Ok(SYSV_OUTPUT.to_string())
    }
}

struct FakeUploader {
    fail: bool,
    plans: RefCell<Vec<UploadPlan>>,
}

impl FakeUploader {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            plans: RefCell::new(Vec::new()),
        }
    }
}

impl Uploader for FakeUploader {
    fn upload(&self, plan: &UploadPlan) -> Result<(), UploadFailure> {
        self.plans.borrow_mut().push(plan.clone());
        if self.fail {
            Err(UploadFailure::new("no DFU capable USB device available"))
        } else {
            Ok(())
        }
    }
}

fn project(root: &Path, protocol: &str) -> (ComposedBuild, TargetGraph, RequestedTargets) {
    project_with_targets(root, protocol, &["upload"])
}

fn project_with_targets(
    root: &Path,
    protocol: &str,
    targets: &[&str],
) -> (ComposedBuild, TargetGraph, RequestedTargets) {
    fs::create_dir_all(root.join("src")).expect("src");
    fs::write(root.join("src/main.c"), "int main(void) { return 0; }\n").expect("main");
    let mut config = ProjectConfig::new(root, "blackpill");
    config.upload_protocol = protocol.to_string();
    let board = BoardDescriptor::from_value(
        "blackpill",
        serde_json::json!({"build": {"mcu": "stm32f411ce", "hwids": [["0x0483", "0xDF11"]]}}),
    )
    .expect("board");
    let protocol = UploadProtocol::resolve(&config.upload_protocol, &board, None);
    let requested = RequestedTargets::new(targets.iter().copied());
    let inputs = ComposeInputs {
        config: &config,
        board: &board,
        requested: &requested,
        protocol: &protocol,
    };
    let build = compose_build(&inputs, &ConfiguredHooks::default(), &LocalLibraryResolver::new())
        .expect("compose");
    let packages = DirectoryPackages::new(None);
    let ctx = UploadContext {
        board: &board,
        config: &config,
        env: &build.env,
        packages: &packages,
        verbose: false,
    };
    let graph = assemble_targets(&build.env, &requested, dispatch_upload(&protocol, &ctx));
    (build, graph, requested)
}

#[test]
fn upload_builds_binary_then_reuses_it() {
    let root = temp_dir("dfu");
    let (build, graph, requested) = project(&root, "dfu");
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);
    let executor = GraphExecutor::new(&runner, &uploader, MemoryLimits::default());

    let report = executor.execute(&build, &graph, &requested).expect("first run");
    assert_eq!(
        runner.programs(),
        vec![
            "arm-none-eabi-gcc",
            "arm-none-eabi-gcc",
            "arm-none-eabi-objcopy",
            "dfu-suffix"
        ]
    );
    assert!(report.uploaded);
    assert_eq!(report.built.len(), 2);
    assert_eq!(uploader.plans.borrow()[0].uploader, "dfu-util");
    assert!(root.join(".fwforge/build/fwforge-state.json").exists());

    runner.clear();
    let report = executor.execute(&build, &graph, &requested).expect("second run");
    assert!(runner.programs().is_empty());
    assert_eq!(report.up_to_date.len(), 2);
    assert_eq!(uploader.plans.borrow().len(), 2);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn failed_upload_still_runs_remaining_targets() {
    let root = temp_dir("upload-failure");
    let (build, graph, _) = project(&root, "dfu");
    let requested = RequestedTargets::new(["upload", "size"]);
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(true);
    let executor = GraphExecutor::new(&runner, &uploader, MemoryLimits::default());

    let error = executor
        .execute(&build, &graph, &requested)
        .expect_err("upload failure");
    match error {
        BuildError::Upload { failures } => assert_eq!(failures.len(), 1),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        runner.programs().last().map(String::as_str),
        Some("arm-none-eabi-size")
    );

    fs::remove_dir_all(&root).ok();
}

#[test]
fn checkprogsize_enforces_board_limits() {
    let root = temp_dir("checksize");
    let (build, graph, _) = project(&root, "dfu");
    let requested = RequestedTargets::new(["checkprogsize"]);
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);

    let tight = MemoryLimits {
        flash: Some(2048),
        ram: Some(65536),
    };
    let error = GraphExecutor::new(&runner, &uploader, tight)
        .execute(&build, &graph, &requested)
        .expect_err("too large");
    assert!(matches!(
        error,
        BuildError::SizeLimitExceeded {
            region: "Flash",
            used: 4224,
            limit: 2048
        }
    ));

    let roomy = MemoryLimits {
        flash: Some(65536),
        ram: Some(65536),
    };
    GraphExecutor::new(&runner, &uploader, roomy)
        .execute(&build, &graph, &requested)
        .expect("fits");
    assert!(uploader.plans.borrow().is_empty());

    fs::remove_dir_all(&root).ok();
}

#[test]
fn static_library_is_archived_and_sized_by_default() {
    let root = temp_dir("static");
    let (build, graph, _) = project_with_targets(&root, "static", &[]);
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);

    let report = GraphExecutor::new(&runner, &uploader, MemoryLimits::default())
        .execute(&build, &graph, &RequestedTargets::default())
        .expect("static build");
    assert_eq!(report.targets, vec!["size"]);
    assert_eq!(
        runner.programs(),
        vec!["arm-none-eabi-gcc", "arm-none-eabi-ar", "arm-none-eabi-size"]
    );
    assert!(root.join(".fwforge/build/libstm32f411ce.a").exists());

    fs::remove_dir_all(&root).ok();
}

#[test]
fn nobuild_requires_existing_artifacts() {
    let root = temp_dir("nobuild");
    let (build, graph, requested) = project_with_targets(&root, "dfu", &["upload", "nobuild"]);
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);
    let executor = GraphExecutor::new(&runner, &uploader, MemoryLimits::default());

    let error = executor
        .execute(&build, &graph, &requested)
        .expect_err("missing");
    assert!(matches!(error, BuildError::MissingArtifact { .. }));

    fs::create_dir_all(root.join(".fwforge/build")).expect("build dir");
    fs::write(root.join(".fwforge/build/stm32f411ce.bin"), b"bin").expect("bin");
    executor.execute(&build, &graph, &requested).expect("upload only");
    assert!(runner.programs().is_empty());
    assert_eq!(uploader.plans.borrow().len(), 1);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn failed_post_build_step_is_retried() {
    let root = temp_dir("dfu-suffix-retry");
    let (build, graph, requested) = project_with_targets(&root, "dfu", &["buildprog"]);
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);
    let executor = GraphExecutor::new(&runner, &uploader, MemoryLimits::default());

    runner.fail_next("dfu-suffix");
    let error = executor
        .execute(&build, &graph, &requested)
        .expect_err("dfu-suffix failure");
    assert!(matches!(error, BuildError::ToolFailed { status: Some(1), .. }));
    assert!(root.join(".fwforge/build/stm32f411ce.bin").exists());

    runner.clear();
    let report = executor.execute(&build, &graph, &requested).expect("retry");
    assert_eq!(runner.programs(), vec!["arm-none-eabi-objcopy", "dfu-suffix"]);
    assert_eq!(report.built.len(), 1);
    assert!(report.built[0].ends_with("stm32f411ce.bin"));

    runner.clear();
    executor.execute(&build, &graph, &requested).expect("up to date");
    assert!(runner.programs().is_empty());

    fs::remove_dir_all(&root).ok();
}

#[test]
fn switching_protocol_regenerates_binary() {
    let root = temp_dir("protocol-switch");
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);
    let executor = GraphExecutor::new(&runner, &uploader, MemoryLimits::default());

    let (build, graph, requested) = project_with_targets(&root, "serial", &["buildprog"]);
    executor.execute(&build, &graph, &requested).expect("serial build");
    assert!(!runner.programs().iter().any(|program| program == "dfu-suffix"));

    runner.clear();
    let (build, graph, requested) = project_with_targets(&root, "dfu", &["buildprog"]);
    executor.execute(&build, &graph, &requested).expect("dfu build");
    assert_eq!(runner.programs(), vec!["arm-none-eabi-objcopy", "dfu-suffix"]);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn header_edit_recompiles_objects() {
    let root = temp_dir("header-edit");
    let (build, graph, requested) = project_with_targets(&root, "dfu", &["buildprog"]);
    fs::write(root.join("src/config.h"), "#define RATE 9600\n").expect("header");
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);
    let executor = GraphExecutor::new(&runner, &uploader, MemoryLimits::default());

    executor.execute(&build, &graph, &requested).expect("first build");

    runner.clear();
    fs::write(root.join("src/config.h"), "#define RATE 115200\n").expect("header edit");
    executor.execute(&build, &graph, &requested).expect("rebuild");
    let commands = runner.commands.borrow().clone();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].program, "arm-none-eabi-gcc");
    assert!(commands[0].args.iter().any(|arg| arg == "-c"));

    runner.clear();
    executor.execute(&build, &graph, &requested).expect("up to date");
    assert!(runner.programs().is_empty());

    fs::remove_dir_all(&root).ok();
}

#[test]
fn unknown_protocol_builds_but_never_uploads() {
    let root = temp_dir("unknown-protocol");
    let (build, graph, requested) =
        project_with_targets(&root, "frobnicate", &["buildprog", "size", "upload"]);
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);

    let report = GraphExecutor::new(&runner, &uploader, MemoryLimits::default())
        .execute(&build, &graph, &requested)
        .expect("build without upload");

    assert!(!report.uploaded);
    assert!(uploader.plans.borrow().is_empty());
    assert_eq!(report.targets, vec!["buildprog", "size", "upload"]);
    assert_eq!(
        runner.programs(),
        vec![
            "arm-none-eabi-gcc",
            "arm-none-eabi-gcc",
            "arm-none-eabi-objcopy",
            "arm-none-eabi-size"
        ]
    );
    assert!(root.join(".fwforge/build/stm32f411ce.elf").exists());
    assert!(root.join(".fwforge/build/stm32f411ce.bin").exists());
    assert_eq!(graph.warnings, vec!["Warning! Unknown upload protocol frobnicate"]);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn actions_of_on_demand_targets_follow_rebuilds() {
    let root = temp_dir("always-build");
    let (build, mut graph, requested) = project_with_targets(&root, "dfu", &["buildprog"]);
    let buildprog = graph
        .aliases
        .iter_mut()
        .find(|alias| alias.name == "buildprog")
        .expect("buildprog");
    buildprog.actions = vec![TargetAction::PrintSize];
    assert!(!buildprog.always_build);
    let runner = FakeToolchain::default();
    let uploader = FakeUploader::new(false);
    let executor = GraphExecutor::new(&runner, &uploader, MemoryLimits::default());

    executor.execute(&build, &graph, &requested).expect("first build");
    assert_eq!(
        runner.programs().last().map(String::as_str),
        Some("arm-none-eabi-size")
    );

    runner.clear();
    let report = executor.execute(&build, &graph, &requested).expect("unchanged");
    assert!(runner.programs().is_empty());
    assert_eq!(report.targets, vec!["buildprog"]);

    for alias in graph.aliases.iter_mut().filter(|alias| alias.name == "buildprog") {
        alias.always_build = true;
    }
    executor.execute(&build, &graph, &requested).expect("forced");
    assert_eq!(runner.programs(), vec!["arm-none-eabi-size"]);

    fs::remove_dir_all(&root).ok();
}
