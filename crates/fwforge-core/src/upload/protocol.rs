use std::fmt;

use serde::Serialize;

use crate::board::BoardDescriptor;

pub const STATIC_PROTOCOL: &str = "static";

/// Closed set of deployment strategies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UploadProtocol {
    /// Produce a static library; nothing is uploaded.
    Static,
    Mbed,
    BlackMagic { jtag: bool },
    JLink { jtag: bool },
    Dfu,
    Serial,
    Hid,
    GenericDebugger { tool_name: String },
    Custom { command: Option<String> },
    Unknown { raw: String },
}

impl UploadProtocol {
    /// Map a configured protocol name onto a variant. Names found in the
    /// board's `debug.tools` table select the on-chip debugger.
    pub fn resolve(raw: &str, board: &BoardDescriptor, custom_command: Option<&str>) -> Self {
        match raw {
            STATIC_PROTOCOL => UploadProtocol::Static,
            "mbed" => UploadProtocol::Mbed,
            _ if raw.starts_with("blackmagic") => UploadProtocol::BlackMagic {
                jtag: raw == "blackmagic-jtag",
            },
            _ if raw.starts_with("jlink") => UploadProtocol::JLink {
                jtag: raw == "jlink-jtag",
            },
            "dfu" => UploadProtocol::Dfu,
            "serial" => UploadProtocol::Serial,
            "hid" => UploadProtocol::Hid,
            _ if board.has_debug_tool(raw) => UploadProtocol::GenericDebugger {
                tool_name: raw.to_string(),
            },
            "custom" => UploadProtocol::Custom {
                command: custom_command.map(str::to_string),
            },
            _ => UploadProtocol::Unknown {
                raw: raw.to_string(),
            },
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, UploadProtocol::Static)
    }
}

impl fmt::Display for UploadProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadProtocol::Static => f.write_str(STATIC_PROTOCOL),
            UploadProtocol::Mbed => f.write_str("mbed"),
            UploadProtocol::BlackMagic { jtag: false } => f.write_str("blackmagic"),
            UploadProtocol::BlackMagic { jtag: true } => f.write_str("blackmagic-jtag"),
            UploadProtocol::JLink { jtag: false } => f.write_str("jlink"),
            UploadProtocol::JLink { jtag: true } => f.write_str("jlink-jtag"),
            UploadProtocol::Dfu => f.write_str("dfu"),
            UploadProtocol::Serial => f.write_str("serial"),
            UploadProtocol::Hid => f.write_str("hid"),
            UploadProtocol::GenericDebugger { tool_name } => f.write_str(tool_name),
            UploadProtocol::Custom { .. } => f.write_str("custom"),
            UploadProtocol::Unknown { raw } => f.write_str(raw),
        }
    }
}
