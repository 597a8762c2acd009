use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

pub const DEFAULT_OFFSET_ADDRESS: &str = "0x08000000";

#[derive(Debug)]
pub enum BoardError {
    Io { path: PathBuf, source: std::io::Error },
    Json { path: String, source: serde_json::Error },
    NotAnObject { board: String },
}

impl std::fmt::Display for BoardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardError::Io { path, source } => write!(
                f,
                "failed to read board descriptor '{}': {}",
                path.display(),
                source
            ),
            BoardError::Json { path, source } => {
                write!(f, "failed to parse board descriptor '{}': {}", path, source)
            }
            BoardError::NotAnObject { board } => {
                write!(f, "board descriptor '{}' must be a JSON object", board)
            }
        }
    }
}

impl std::error::Error for BoardError {}

/// Read-only metadata describing one hardware target.
///
/// Values are addressed by dotted paths such as `build.mcu` or
/// `upload.offset_address`.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardDescriptor {
    id: String,
    root: Map<String, Value>,
}

/// One entry of the board's `debug.tools` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugTool {
    pub name: String,
    pub server_arguments: Vec<String>,
}

impl BoardDescriptor {
    pub fn load(boards_dir: &Path, id: &str) -> Result<Self, BoardError> {
        let path = boards_dir.join(format!("{}.json", id));
        let contents = std::fs::read_to_string(&path).map_err(|source| BoardError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|source| BoardError::Json {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;
        Self::from_value(id, value)
    }

    pub fn from_value(id: &str, value: Value) -> Result<Self, BoardError> {
        match value {
            Value::Object(root) => Ok(Self {
                id: id.to_string(),
                root,
            }),
            _ => Err(BoardError::NotAnObject {
                board: id.to_string(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn mcu(&self) -> Option<&str> {
        self.get_str("build.mcu")
    }

    /// `build.extra_flags` as declared, either a single string or a list.
    pub fn extra_flags(&self) -> Option<Vec<String>> {
        match self.get("build.extra_flags")? {
            Value::String(value) => Some(vec![value.clone()]),
            Value::Array(values) => Some(
                values
                    .iter()
                    .filter_map(|value| value.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Ordered `[vendor_id, product_id]` pairs from `build.hwids`.
    pub fn hwids(&self) -> Vec<(String, String)> {
        let entries = match self.get("build.hwids").and_then(Value::as_array) {
            Some(entries) => entries,
            None => return Vec::new(),
        };
        entries
            .iter()
            .filter_map(|entry| {
                let pair = entry.as_array()?;
                let vid = pair.first()?.as_str()?;
                let pid = pair.get(1)?.as_str()?;
                Some((vid.to_string(), pid.to_string()))
            })
            .collect()
    }

    /// Flash offset, `None` when unset or empty.
    pub fn offset_address(&self) -> Option<&str> {
        self.get_str("upload.offset_address")
            .filter(|value| !value.trim().is_empty())
    }

    pub fn offset_address_or_default(&self) -> &str {
        self.offset_address().unwrap_or(DEFAULT_OFFSET_ADDRESS)
    }

    pub fn boot_version(&self) -> Option<String> {
        match self.get("upload.boot_version")? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn jlink_device(&self) -> Option<&str> {
        self.get_str("debug.jlink_device")
    }

    pub fn maximum_size(&self) -> Option<u64> {
        self.get("upload.maximum_size").and_then(Value::as_u64)
    }

    pub fn maximum_ram_size(&self) -> Option<u64> {
        self.get("upload.maximum_ram_size").and_then(Value::as_u64)
    }

    pub fn has_debug_tool(&self, name: &str) -> bool {
        self.get("debug.tools")
            .and_then(Value::as_object)
            .map(|tools| tools.contains_key(name))
            .unwrap_or(false)
    }

    pub fn debug_tool(&self, name: &str) -> Option<DebugTool> {
        let tool = self
            .get("debug.tools")
            .and_then(Value::as_object)?
            .get(name)?;
        let server_arguments = tool
            .get("server")
            .and_then(|server| server.get("arguments"))
            .and_then(Value::as_array)
            .map(|arguments| {
                arguments
                    .iter()
                    .filter_map(|value| value.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Some(DebugTool {
            name: name.to_string(),
            server_arguments,
        })
    }
}
