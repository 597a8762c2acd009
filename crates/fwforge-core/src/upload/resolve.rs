use std::path::{Path, PathBuf};

use tracing::warn;

use super::plan::{MainAction, PreAction, UploadPlan};
use super::protocol::UploadProtocol;
use crate::artifact::ArtifactKind;
use crate::board::BoardDescriptor;
use crate::command::CommandLine;
use crate::config::{ProjectConfig, UploadSource};
use crate::environment::BuildEnvironment;
use crate::packages::PackageLocator;

pub const DEFAULT_HWID: (&str, &str) = ("0x0483", "0xDF11");
pub const JLINK_SCRIPT_NAME: &str = "upload.jlink";
pub const SERIAL_BAUD_RATE: &str = "115200";
pub const JLINK_SPEED: &str = "4000";

/// Inputs of plan resolution. Nothing here depends on artifacts having
/// been built.
pub struct UploadContext<'a> {
    pub board: &'a BoardDescriptor,
    pub config: &'a ProjectConfig,
    pub env: &'a BuildEnvironment,
    pub packages: &'a dyn PackageLocator,
    pub verbose: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadDispatch {
    Plan(Box<UploadPlan>),
    /// The build produces a static library; no upload target exists.
    StaticLibrary,
    /// Unrecognised protocol; the upload target is registered without
    /// actions.
    Unsupported { protocol: String, warning: String },
}

impl UploadDispatch {
    pub fn plan(&self) -> Option<&UploadPlan> {
        match self {
            UploadDispatch::Plan(plan) => Some(plan),
            _ => None,
        }
    }
}

pub fn dispatch_upload(protocol: &UploadProtocol, ctx: &UploadContext<'_>) -> UploadDispatch {
    let plan = match protocol {
        UploadProtocol::Static => return UploadDispatch::StaticLibrary,
        UploadProtocol::Unknown { raw } => {
            return UploadDispatch::Unsupported {
                protocol: raw.clone(),
                warning: format!("Warning! Unknown upload protocol {}", raw),
            }
        }
        UploadProtocol::Mbed => mbed_plan(ctx),
        UploadProtocol::BlackMagic { jtag } => blackmagic_plan(ctx, *jtag),
        UploadProtocol::JLink { jtag } => jlink_plan(ctx, *jtag),
        UploadProtocol::Dfu => dfu_plan(ctx),
        UploadProtocol::Serial => serial_plan(ctx),
        UploadProtocol::Hid => hid_plan(ctx),
        UploadProtocol::GenericDebugger { tool_name } => debugger_plan(ctx, tool_name),
        UploadProtocol::Custom { command } => custom_plan(ctx, command.as_deref()),
    };
    UploadDispatch::Plan(Box::new(UploadPlan {
        protocol: protocol.clone(),
        ..plan
    }))
}

fn base_plan(ctx: &UploadContext<'_>, source: ArtifactKind) -> UploadPlan {
    UploadPlan {
        protocol: UploadProtocol::Custom { command: None },
        uploader: String::new(),
        uploader_flags: Vec::new(),
        source_artifact: source,
        source_path: ctx.env.artifact_path(source),
        pre_actions: Vec::new(),
        main_action: MainAction::CopyToDisk,
        post_build_actions: Vec::new(),
    }
}

fn autodetect_port(description: &str) -> PreAction {
    PreAction::AutodetectPort {
        description: description.to_string(),
    }
}

fn run(template: &[&str]) -> MainAction {
    MainAction::Run {
        template: template.iter().map(|token| token.to_string()).collect(),
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn mbed_plan(ctx: &UploadContext<'_>) -> UploadPlan {
    UploadPlan {
        pre_actions: vec![PreAction::AutodetectDisk {
            description: "Looking for upload disk...".to_string(),
        }],
        main_action: MainAction::CopyToDisk,
        ..base_plan(ctx, ArtifactKind::RawBinary)
    }
}

fn blackmagic_plan(ctx: &UploadContext<'_>, jtag: bool) -> UploadPlan {
    let scan = if jtag { "jtag" } else { "swdp" };
    UploadPlan {
        uploader: ctx.env.toolchain.gdb.clone(),
        uploader_flags: vec![
            "-nx".to_string(),
            "--batch".to_string(),
            "-ex".to_string(),
            "target extended-remote $UPLOAD_PORT".to_string(),
            "-ex".to_string(),
            format!("monitor {}_scan", scan),
            "-ex".to_string(),
            "attach 1".to_string(),
            "-ex".to_string(),
            "load".to_string(),
            "-ex".to_string(),
            "compare-sections".to_string(),
            "-ex".to_string(),
            "kill".to_string(),
        ],
        pre_actions: vec![autodetect_port("Looking for BlackMagic port...")],
        main_action: run(&["$UPLOADER", "$UPLOADERFLAGS", "$SOURCE"]),
        ..base_plan(ctx, ArtifactKind::Executable)
    }
}

/// Contents of the flash commander script: halt, load at offset, reset,
/// quit.
pub fn jlink_script(source: &Path, offset: &str) -> String {
    [
        "h".to_string(),
        format!("loadbin {}, {}", source.display(), offset),
        "r".to_string(),
        "q".to_string(),
    ]
    .join("\n")
}

fn jlink_plan(ctx: &UploadContext<'_>, jtag: bool) -> UploadPlan {
    let base = base_plan(ctx, ArtifactKind::RawBinary);
    let mut flags = Vec::new();
    match ctx.board.jlink_device() {
        Some(device) => flags.extend(["-device".to_string(), device.to_string()]),
        None => warn!(
            "board '{}' declares no debug.jlink_device; JLink will prompt for one",
            ctx.board.id()
        ),
    }
    flags.extend(strings(&[
        "-speed",
        JLINK_SPEED,
        "-if",
        if jtag { "jtag" } else { "swd" },
        "-autoconnect",
        "1",
    ]));
    let script_path: PathBuf = ctx.env.build_dir.join(JLINK_SCRIPT_NAME);
    let contents = jlink_script(&base.source_path, ctx.board.offset_address_or_default());
    UploadPlan {
        uploader: if cfg!(windows) { "JLink.exe" } else { "JLinkExe" }.to_string(),
        uploader_flags: flags,
        pre_actions: vec![PreAction::WriteCommandScript {
            path: script_path,
            contents,
        }],
        main_action: run(&["$UPLOADER", "$UPLOADERFLAGS", "-CommanderScript", "$SCRIPT"]),
        ..base
    }
}

/// Boards whose bootloader is the serial maple bootloader rather than the
/// on-chip USB DFU one.
fn uses_legacy_dfu(ctx: &UploadContext<'_>) -> bool {
    ctx.board
        .mcu()
        .map(|mcu| mcu.starts_with("stm32f103"))
        .unwrap_or(false)
        && ctx.env.has_framework("arduino")
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

fn dfu_plan(ctx: &UploadContext<'_>) -> UploadPlan {
    let base = base_plan(ctx, ArtifactKind::RawBinary);
    let (vid, pid) = ctx
        .board
        .hwids()
        .into_iter()
        .next()
        .unwrap_or_else(|| (DEFAULT_HWID.0.to_string(), DEFAULT_HWID.1.to_string()));

    if uses_legacy_dfu(ctx) {
        let boot_version = ctx.board.boot_version().unwrap_or_else(|| "2".to_string());
        return UploadPlan {
            uploader: "maple_upload".to_string(),
            uploader_flags: vec![
                "$UPLOAD_PORT_NAME".to_string(),
                boot_version,
                format!("{}:{}", strip_hex_prefix(&vid), strip_hex_prefix(&pid)),
            ],
            pre_actions: vec![autodetect_port("Looking for upload port...")],
            main_action: run(&["$UPLOADER", "$UPLOADERFLAGS", "$SOURCE"]),
            ..base
        };
    }

    let dfu_suffix = ctx
        .packages
        .package_dir("tool-dfuutil")
        .map(|dir| dir.join("bin").join("dfu-suffix").to_string_lossy().into_owned())
        .unwrap_or_else(|| "dfu-suffix".to_string());
    let file_name = base
        .source_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix_action = CommandLine::new(dfu_suffix, format!("Adding dfu suffix to {}", file_name))
        .args(["-v", vid.as_str(), "-p", pid.as_str(), "-d", "0xffff", "-a"])
        .arg(base.source_path.to_string_lossy());
    UploadPlan {
        uploader: "dfu-util".to_string(),
        uploader_flags: vec![
            "-d".to_string(),
            format!("vid:pid,{}:{}", vid, pid),
            "-a".to_string(),
            "0".to_string(),
            "-s".to_string(),
            format!("{}:leave", ctx.board.offset_address_or_default()),
            "-D".to_string(),
        ],
        main_action: run(&["$UPLOADER", "$UPLOADERFLAGS", "$SOURCE"]),
        post_build_actions: vec![suffix_action],
        ..base
    }
}

fn serial_plan(ctx: &UploadContext<'_>) -> UploadPlan {
    UploadPlan {
        uploader: "stm32flash".to_string(),
        uploader_flags: strings(&[
            "-g",
            ctx.board.offset_address_or_default(),
            "-b",
            SERIAL_BAUD_RATE,
            "-w",
        ]),
        pre_actions: vec![autodetect_port("Looking for upload port...")],
        main_action: run(&["$UPLOADER", "$UPLOADERFLAGS", "$SOURCE", "$UPLOAD_PORT_NAME"]),
        ..base_plan(ctx, ArtifactKind::RawBinary)
    }
}

fn hid_plan(ctx: &UploadContext<'_>) -> UploadPlan {
    UploadPlan {
        uploader: "hid-flash".to_string(),
        pre_actions: vec![autodetect_port("Looking for upload port...")],
        main_action: run(&["$UPLOADER", "$SOURCE", "$UPLOAD_PORT_NAME"]),
        ..base_plan(ctx, ArtifactKind::RawBinary)
    }
}

fn debugger_plan(ctx: &UploadContext<'_>, tool_name: &str) -> UploadPlan {
    // A configured flash offset means the image is position-less, so the
    // raw binary is programmed at that offset instead of the ELF.
    let offset = ctx.board.offset_address();
    let source = if offset.is_some() {
        ArtifactKind::RawBinary
    } else {
        ArtifactKind::Executable
    };
    let package_dir = ctx
        .packages
        .package_dir("tool-openocd")
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut flags = vec![if ctx.verbose { "-d2" } else { "-d1" }.to_string()];
    if let Some(tool) = ctx.board.debug_tool(tool_name) {
        flags.extend(tool.server_arguments);
    }
    flags.push("-c".to_string());
    flags.push(match offset {
        Some(offset) => format!("program {{$SOURCE}} {} verify reset; shutdown;", offset),
        None => "program {$SOURCE} verify reset; shutdown;".to_string(),
    });
    let flags = flags
        .into_iter()
        .map(|flag| flag.replace("$PACKAGE_DIR", &package_dir))
        .collect();

    UploadPlan {
        uploader: "openocd".to_string(),
        uploader_flags: flags,
        main_action: run(&["$UPLOADER", "$UPLOADERFLAGS"]),
        ..base_plan(ctx, source)
    }
}

fn custom_plan(ctx: &UploadContext<'_>, command: Option<&str>) -> UploadPlan {
    let source = match ctx.config.upload_source {
        UploadSource::Elf => ArtifactKind::Executable,
        UploadSource::Bin => ArtifactKind::RawBinary,
    };
    UploadPlan {
        uploader: ctx.config.uploader.clone().unwrap_or_default(),
        uploader_flags: ctx.config.upload_flags.clone(),
        main_action: MainAction::Shell {
            template: command.unwrap_or_default().to_string(),
        },
        ..base_plan(ctx, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::template::{TemplateValues, UPLOAD_PORT, UPLOAD_PORT_NAME};
    use crate::upload::RenderedAction;
    use serde_json::{json, Value};

    struct FixedPackages(Option<PathBuf>);

    impl PackageLocator for FixedPackages {
        fn package_dir(&self, name: &str) -> Option<PathBuf> {
            self.0.as_ref().map(|root| root.join(name))
        }
    }

    fn board(value: Value) -> BoardDescriptor {
        BoardDescriptor::from_value("bluepill", value).expect("board")
    }

    fn config() -> ProjectConfig {
        ProjectConfig::new(Path::new("/p"), "bluepill")
    }

    fn env(config: &ProjectConfig) -> BuildEnvironment {
        let mut env = BuildEnvironment::new(config);
        env.program_name = "stm32f103c8".to_string();
        env
    }

    fn plan_for(raw: &str, board: &BoardDescriptor, config: &ProjectConfig) -> UploadPlan {
        plan_with(raw, board, config, &env(config), false)
    }

    fn plan_with(
        raw: &str,
        board: &BoardDescriptor,
        config: &ProjectConfig,
        env: &BuildEnvironment,
        verbose: bool,
    ) -> UploadPlan {
        let packages = FixedPackages(Some(PathBuf::from("/pkgs")));
        let ctx = UploadContext {
            board,
            config,
            env,
            packages: &packages,
            verbose,
        };
        let protocol = UploadProtocol::resolve(raw, board, config.upload_command.as_deref());
        match dispatch_upload(&protocol, &ctx) {
            UploadDispatch::Plan(plan) => *plan,
            other => panic!("expected a plan, got {:?}", other),
        }
    }

    #[test]
    fn jlink_script_loads_at_default_offset() {
        let config = config();
        let plan = plan_for("jlink", &board(json!({})), &config);
        let contents = match &plan.pre_actions[0] {
            PreAction::WriteCommandScript { path, contents } => {
                assert_eq!(path, Path::new("/p/.fwforge/build/upload.jlink"));
                contents.clone()
            }
            other => panic!("unexpected pre-action {:?}", other),
        };
        assert!(contents.contains("loadbin /p/.fwforge/build/stm32f103c8.bin, 0x08000000"));
        assert!(contents.starts_with("h\n"));
        assert!(contents.ends_with("r\nq"));
        assert_eq!(plan.source_artifact, ArtifactKind::RawBinary);
    }

    #[test]
    fn jlink_interface_follows_protocol_suffix() {
        let config = config();
        let board = board(json!({"debug": {"jlink_device": "STM32F103C8"}}));
        let swd = plan_for("jlink", &board, &config);
        let jtag = plan_for("jlink-jtag", &board, &config);
        let interface = |plan: &UploadPlan| {
            let index = plan.uploader_flags.iter().position(|flag| flag == "-if").expect("-if");
            plan.uploader_flags[index + 1].clone()
        };
        assert_eq!(interface(&swd), "swd");
        assert_eq!(interface(&jtag), "jtag");
        assert_eq!(&swd.uploader_flags[..2], ["-device", "STM32F103C8"]);
    }

    #[test]
    fn dfu_uses_first_hwid_pair() {
        let config = config();
        let board = board(json!({
            "build": {"hwids": [["0x0483", "0xDF11"], ["0x1EAF", "0x0003"]]}
        }));
        let plan = plan_for("dfu", &board, &config);
        assert_eq!(plan.uploader, "dfu-util");
        assert!(plan
            .uploader_flags
            .windows(2)
            .any(|pair| pair == ["-d", "vid:pid,0x0483:0xDF11"]));
        assert!(plan.uploader_flags.contains(&"0x08000000:leave".to_string()));
        assert_eq!(plan.post_build_actions.len(), 1);
        assert_eq!(plan.post_build_actions[0].program, "/pkgs/tool-dfuutil/bin/dfu-suffix");
        assert!(!plan.needs_port());
    }

    #[test]
    fn maple_boards_take_the_legacy_dfu_path() {
        let mut config = config();
        config.frameworks = vec!["arduino".to_string()];
        let board = board(json!({
            "build": {"mcu": "stm32f103cbt6", "hwids": [["0x1EAF", "0x0003"]]},
            "upload": {"boot_version": 1}
        }));
        let plan = plan_for("dfu", &board, &config);
        assert_eq!(plan.uploader, "maple_upload");
        assert_eq!(plan.uploader_flags, vec!["$UPLOAD_PORT_NAME", "1", "1EAF:0003"]);
        assert!(plan.post_build_actions.is_empty());
        assert!(plan.needs_port());
    }

    #[test]
    fn debugger_source_depends_on_offset() {
        let config = config();
        let tools = json!({"tools": {"stlink": {"server": {"arguments": [
            "-s", "$PACKAGE_DIR/scripts", "-f", "interface/stlink.cfg"
        ]}}}});
        let elf = plan_for("stlink", &board(json!({"debug": tools.clone()})), &config);
        assert_eq!(elf.source_artifact, ArtifactKind::Executable);
        assert_eq!(elf.uploader_flags[0], "-d1");
        assert_eq!(elf.uploader_flags[2], "/pkgs/tool-openocd/scripts");
        assert_eq!(
            elf.uploader_flags.last().map(String::as_str),
            Some("program {$SOURCE} verify reset; shutdown;")
        );

        let bin_board = board(json!({"debug": tools, "upload": {"offset_address": "0x08004000"}}));
        let bin = plan_with("stlink", &bin_board, &config, &env(&config), true);
        assert_eq!(bin.source_artifact, ArtifactKind::RawBinary);
        assert_eq!(bin.uploader_flags[0], "-d2");
        assert_eq!(
            bin.uploader_flags.last().map(String::as_str),
            Some("program {$SOURCE} 0x08004000 verify reset; shutdown;")
        );
    }

    #[test]
    fn blackmagic_renders_port_into_gdb_session() {
        let config = config();
        let plan = plan_for("blackmagic-jtag", &board(json!({})), &config);
        let mut values = plan.template_values();
        values
            .set(UPLOAD_PORT, "/dev/ttyACM0")
            .set(UPLOAD_PORT_NAME, "ttyACM0");
        let command = match plan.render(&values).expect("render") {
            RenderedAction::Command(command) => command,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(command.program, "arm-none-eabi-gdb");
        assert!(command.args.contains(&"target extended-remote /dev/ttyACM0".to_string()));
        assert!(command.args.contains(&"monitor jtag_scan".to_string()));
        assert_eq!(
            command.args.last().map(String::as_str),
            Some("/p/.fwforge/build/stm32f103c8.elf")
        );
    }

    #[test]
    fn serial_needs_port_before_rendering() {
        let config = config();
        let plan = plan_for("serial", &board(json!({})), &config);
        assert!(plan.render(&plan.template_values()).is_err());
        let mut values: TemplateValues = plan.template_values();
        values.set(UPLOAD_PORT_NAME, "ttyUSB0");
        match plan.render(&values).expect("render") {
            RenderedAction::Command(command) => {
                assert_eq!(command.program, "stm32flash");
                assert_eq!(command.args.last().map(String::as_str), Some("ttyUSB0"));
                assert!(command.args.contains(&"115200".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn custom_command_is_used_verbatim() {
        let mut config = config();
        config.upload_command = Some("$UPLOADER $UPLOADERFLAGS $SOURCE".to_string());
        config.uploader = Some("st-flash".to_string());
        config.upload_flags = vec!["write".to_string()];
        config.upload_source = UploadSource::Elf;
        let plan = plan_for("custom", &board(json!({})), &config);
        assert_eq!(plan.source_artifact, ArtifactKind::Executable);
        match plan.render(&plan.template_values()).expect("render") {
            RenderedAction::Command(command) => assert_eq!(
                command.args.last().map(String::as_str),
                Some("st-flash write /p/.fwforge/build/stm32f103c8.elf")
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn mbed_copies_binary_to_disk() {
        let config = config();
        let plan = plan_for("mbed", &board(json!({})), &config);
        assert!(plan.needs_disk());
        assert_eq!(
            plan.render(&plan.template_values()).expect("render"),
            RenderedAction::CopyToDisk {
                source: PathBuf::from("/p/.fwforge/build/stm32f103c8.bin")
            }
        );
    }

    #[test]
    fn unknown_and_static_protocols_have_no_plan() {
        let config = config();
        let board = board(json!({}));
        let env = env(&config);
        let packages = FixedPackages(None);
        let ctx = UploadContext {
            board: &board,
            config: &config,
            env: &env,
            packages: &packages,
            verbose: false,
        };
        let unknown = dispatch_upload(&UploadProtocol::resolve("frobnicate", &board, None), &ctx);
        match &unknown {
            UploadDispatch::Unsupported { protocol, warning } => {
                assert_eq!(protocol, "frobnicate");
                assert!(warning.contains("frobnicate"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(unknown.plan().is_none());
        assert_eq!(
            dispatch_upload(&UploadProtocol::Static, &ctx),
            UploadDispatch::StaticLibrary
        );
    }
}
