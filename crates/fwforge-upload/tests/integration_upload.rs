use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use fwforge_build::{BuildResult, ToolRunner, Uploader};
use fwforge_core::{
    board::BoardDescriptor,
    command::CommandLine,
    config::ProjectConfig,
    environment::BuildEnvironment,
    packages::DirectoryPackages,
    upload::{dispatch_upload, UploadContext, UploadPlan, UploadProtocol},
};
use fwforge_upload::{execute_plan, PlanUploader, SystemPortDetector, UploadError};

#[derive(Default)]
struct RecordingRunner {
    commands: RefCell<Vec<CommandLine>>,
}

impl ToolRunner for RecordingRunner {
    fn run(&self, command: &CommandLine) -> BuildResult<()> {
        self.commands.borrow_mut().push(command.clone());
        Ok(())
    }

    fn capture(&self, command: &CommandLine) -> BuildResult<String> {
        self.commands.borrow_mut().push(command.clone());
        Ok(String::new())
    }
}

fn plan(root: &Path, protocol: &str, board: serde_json::Value) -> UploadPlan {
    let mut config = ProjectConfig::new(root, "nucleo_f401re");
    config.upload_protocol = protocol.to_string();
    let board = BoardDescriptor::from_value("nucleo_f401re", board).expect("board");
    let mut env = BuildEnvironment::new(&config);
    env.program_name = "stm32f401ret6".to_string();
    let packages = DirectoryPackages::new(None);
    let ctx = UploadContext {
        board: &board,
        config: &config,
        env: &env,
        packages: &packages,
        verbose: false,
    };
    let protocol = UploadProtocol::resolve(protocol, &board, None);
    dispatch_upload(&protocol, &ctx)
        .plan()
        .cloned()
        .expect("upload plan")
}

fn fake_dev(names: &[&str]) -> tempfile::TempDir {
    let dev = tempfile::tempdir().expect("dev");
    for name in names {
        fs::write(dev.path().join(name), b"").expect("device node");
    }
    dev
}

#[test]
fn jlink_writes_script_into_build_dir_before_running() {
    let root = tempfile::tempdir().expect("project");
    let plan = plan(
        root.path(),
        "jlink",
        serde_json::json!({"debug": {"jlink_device": "STM32F401RE"}}),
    );
    let runner = RecordingRunner::default();
    let detector = SystemPortDetector::with_roots("/nonexistent-dev", Vec::new());

    execute_plan(&plan, &runner, &detector, None).expect("upload");

    let script = root.path().join(".fwforge/build/upload.jlink");
    let contents = fs::read_to_string(&script).expect("script");
    assert!(contents.contains("stm32f401ret6.bin, 0x08000000"));
    let commands = runner.commands.borrow();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].program, plan.uploader);
    assert_eq!(
        &commands[0].args[commands[0].args.len() - 2..],
        ["-CommanderScript".to_string(), script.to_string_lossy().into_owned()]
    );
}

#[test]
fn serial_passes_detected_port_basename() {
    let root = tempfile::tempdir().expect("project");
    let plan = plan(root.path(), "serial", serde_json::json!({}));
    let dev = fake_dev(&["tty0", "ttyUSB0"]);
    let runner = RecordingRunner::default();
    let detector = SystemPortDetector::with_roots(dev.path(), Vec::new());

    execute_plan(&plan, &runner, &detector, None).expect("upload");

    let commands = runner.commands.borrow();
    assert_eq!(commands[0].program, "stm32flash");
    assert_eq!(commands[0].args.last().map(String::as_str), Some("ttyUSB0"));
}

#[test]
fn configured_port_skips_detection() {
    let root = tempfile::tempdir().expect("project");
    let plan = plan(root.path(), "blackmagic", serde_json::json!({}));
    let runner = RecordingRunner::default();
    let detector = SystemPortDetector::with_roots("/nonexistent-dev", Vec::new());

    execute_plan(&plan, &runner, &detector, Some("/dev/ttyBMP0")).expect("upload");

    let commands = runner.commands.borrow();
    assert!(commands[0]
        .args
        .contains(&"target extended-remote /dev/ttyBMP0".to_string()));
}

#[test]
fn missing_port_fails_without_running_uploader() {
    let root = tempfile::tempdir().expect("project");
    let plan = plan(root.path(), "hid", serde_json::json!({}));
    let dev = fake_dev(&["null"]);
    let runner = RecordingRunner::default();
    let detector = SystemPortDetector::with_roots(dev.path(), Vec::new());

    let error = execute_plan(&plan, &runner, &detector, None).expect_err("no port");
    assert!(matches!(error, UploadError::NoPort { .. }));
    assert!(runner.commands.borrow().is_empty());

    let failure = PlanUploader::new(&runner, &detector, None)
        .upload(&plan)
        .expect_err("no port");
    assert!(failure.message.contains("upload_port"));
}

#[test]
fn mbed_copies_binary_onto_detected_disk() {
    let root = tempfile::tempdir().expect("project");
    let plan = plan(root.path(), "mbed", serde_json::json!({}));
    fs::create_dir_all(root.path().join(".fwforge/build")).expect("build dir");
    fs::write(&plan.source_path, b"firmware").expect("bin");

    let media = tempfile::tempdir().expect("media");
    let disk = media.path().join("NODE_F401RE");
    fs::create_dir_all(&disk).expect("disk");
    fs::write(disk.join("DETAILS.TXT"), b"Version: 0221").expect("marker");
    let runner = RecordingRunner::default();
    let detector =
        SystemPortDetector::with_roots("/nonexistent-dev", vec![PathBuf::from(media.path())]);

    execute_plan(&plan, &runner, &detector, None).expect("upload");

    assert_eq!(
        fs::read(disk.join("stm32f401ret6.bin")).expect("copied"),
        b"firmware"
    );
    assert!(runner.commands.borrow().is_empty());
}
