use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const YAML_CONFIG_FILE: &str = "fwforge.yaml";
pub const TOML_CONFIG_FILE: &str = "fwforge.toml";
pub const DEFAULT_TOOLCHAIN_PREFIX: &str = "arm-none-eabi";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Toml(toml::de::Error),
    MissingConfigFile { dir: String },
    MissingField { field: &'static str, path: String },
    InvalidValue { field: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(error) => write!(f, "failed to read config: {}", error),
            ConfigError::Yaml(error) => write!(f, "failed to parse fwforge.yaml: {}", error),
            ConfigError::Toml(error) => write!(f, "failed to parse fwforge.toml: {}", error),
            ConfigError::MissingConfigFile { dir } => write!(
                f,
                "neither {} nor {} found in '{}'",
                YAML_CONFIG_FILE, TOML_CONFIG_FILE, dir
            ),
            ConfigError::MissingField { field, path } => {
                write!(f, "config '{}' missing required field '{}'", path, field)
            }
            ConfigError::InvalidValue { field, value } => {
                write!(f, "invalid value '{}' for '{}'", value, field)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A config value that may be written as one string or as a list.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(value) => vec![value],
            StringOrList::Many(values) => values,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawProjectConfig {
    board: Option<String>,
    boards_dir: Option<String>,
    framework: Option<StringOrList>,
    #[serde(default)]
    framework_flags: BTreeMap<String, StringOrList>,
    upload_protocol: Option<String>,
    upload_port: Option<String>,
    upload_command: Option<String>,
    uploader: Option<String>,
    upload_flags: Option<StringOrList>,
    upload_source: Option<String>,
    build_flags: Option<StringOrList>,
    build_unflags: Option<StringOrList>,
    src_build_flags: Option<StringOrList>,
    build_type: Option<String>,
    #[serde(default)]
    test_build_project_src: bool,
    toolchain_prefix: Option<String>,
    #[serde(default)]
    dirs: RawDirs,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawDirs {
    src: Option<String>,
    test: Option<String>,
    lib: Option<String>,
    build: Option<String>,
}

/// Which linked artifact a user-declared upload command consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadSource {
    Elf,
    #[default]
    Bin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectDirs {
    pub root: PathBuf,
    pub src: PathBuf,
    pub test: PathBuf,
    pub lib: PathBuf,
    pub build: PathBuf,
    pub boards: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectConfig {
    pub board: String,
    pub frameworks: Vec<String>,
    pub framework_flags: BTreeMap<String, Vec<String>>,
    pub upload_protocol: String,
    pub upload_port: Option<String>,
    pub upload_command: Option<String>,
    pub uploader: Option<String>,
    pub upload_flags: Vec<String>,
    pub upload_source: UploadSource,
    pub build_flags: Vec<String>,
    pub build_unflags: Vec<String>,
    pub src_build_flags: Vec<String>,
    pub build_type: Option<String>,
    pub test_build_project_src: bool,
    pub toolchain_prefix: String,
    pub dirs: ProjectDirs,
}

impl ProjectConfig {
    /// Minimal configuration rooted at `root` with every optional value at
    /// its default.
    pub fn new(root: &Path, board: &str) -> Self {
        Self {
            board: board.to_string(),
            frameworks: Vec::new(),
            framework_flags: BTreeMap::new(),
            upload_protocol: String::new(),
            upload_port: None,
            upload_command: None,
            uploader: None,
            upload_flags: Vec::new(),
            upload_source: UploadSource::Bin,
            build_flags: Vec::new(),
            build_unflags: Vec::new(),
            src_build_flags: Vec::new(),
            build_type: None,
            test_build_project_src: false,
            toolchain_prefix: DEFAULT_TOOLCHAIN_PREFIX.to_string(),
            dirs: ProjectDirs::resolve(root, &RawDirs::default(), None),
        }
    }
}

pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let yaml_path = project_dir.join(YAML_CONFIG_FILE);
    if yaml_path.exists() {
        let contents = std::fs::read_to_string(&yaml_path).map_err(ConfigError::Io)?;
        let raw: RawProjectConfig = serde_yaml::from_str(&contents).map_err(ConfigError::Yaml)?;
        return ProjectConfig::from_raw(project_dir, raw, path_string(&yaml_path));
    }

    let toml_path = project_dir.join(TOML_CONFIG_FILE);
    if toml_path.exists() {
        let contents = std::fs::read_to_string(&toml_path).map_err(ConfigError::Io)?;
        let raw: RawProjectConfig = toml::from_str(&contents).map_err(ConfigError::Toml)?;
        return ProjectConfig::from_raw(project_dir, raw, path_string(&toml_path));
    }

    Err(ConfigError::MissingConfigFile {
        dir: path_string(project_dir),
    })
}

impl ProjectConfig {
    fn from_raw(root: &Path, raw: RawProjectConfig, path: String) -> Result<Self, ConfigError> {
        let board = raw
            .board
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingField {
                field: "board",
                path,
            })?;
        let upload_source = match raw.upload_source.as_deref() {
            None | Some("bin") => UploadSource::Bin,
            Some("elf") => UploadSource::Elf,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "upload_source",
                    value: other.to_string(),
                })
            }
        };
        let dirs = ProjectDirs::resolve(root, &raw.dirs, raw.boards_dir.as_deref());
        Ok(Self {
            board,
            frameworks: raw.framework.map(StringOrList::into_vec).unwrap_or_default(),
            framework_flags: raw
                .framework_flags
                .into_iter()
                .map(|(name, flags)| (name, flags.into_vec()))
                .collect(),
            upload_protocol: raw.upload_protocol.unwrap_or_default(),
            upload_port: raw.upload_port,
            upload_command: raw.upload_command,
            uploader: raw.uploader,
            upload_flags: flatten(raw.upload_flags),
            upload_source,
            build_flags: flatten(raw.build_flags),
            build_unflags: flatten(raw.build_unflags),
            src_build_flags: flatten(raw.src_build_flags),
            build_type: raw.build_type,
            test_build_project_src: raw.test_build_project_src,
            toolchain_prefix: raw
                .toolchain_prefix
                .unwrap_or_else(|| DEFAULT_TOOLCHAIN_PREFIX.to_string()),
            dirs,
        })
    }
}

impl ProjectDirs {
    fn resolve(root: &Path, dirs: &RawDirs, boards_dir: Option<&str>) -> Self {
        Self {
            root: root.to_path_buf(),
            src: root.join(dirs.src.as_deref().unwrap_or("src")),
            test: root.join(dirs.test.as_deref().unwrap_or("test")),
            lib: root.join(dirs.lib.as_deref().unwrap_or("lib")),
            build: root.join(dirs.build.as_deref().unwrap_or(".fwforge/build")),
            boards: root.join(boards_dir.unwrap_or("boards")),
        }
    }
}

fn flatten(value: Option<StringOrList>) -> Vec<String> {
    value.map(StringOrList::into_vec).unwrap_or_default()
}

fn path_string(path: &Path) -> String {
    path.to_str().unwrap_or(YAML_CONFIG_FILE).to_string()
}
