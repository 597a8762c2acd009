//! `$NAME` / `${NAME}` placeholder expansion for upload command templates.

use std::collections::BTreeMap;

pub const UPLOADER: &str = "UPLOADER";
pub const UPLOADER_FLAGS: &str = "UPLOADERFLAGS";
pub const SOURCE: &str = "SOURCE";
pub const UPLOAD_PORT: &str = "UPLOAD_PORT";
/// Final path component of the upload port, e.g. `COM3` or `ttyACM0`.
pub const UPLOAD_PORT_NAME: &str = "UPLOAD_PORT_NAME";
pub const SCRIPT: &str = "SCRIPT";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateError {
    Unresolved { name: String, template: String },
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::Unresolved { name, template } => write!(
                f,
                "placeholder '${}' in '{}' has no value",
                name, template
            ),
        }
    }
}

impl std::error::Error for TemplateError {}

/// Values available for substitution. Names that are known placeholders
/// but absent here are an error; unknown names are left verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateValues {
    values: BTreeMap<&'static str, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn expand(&self, template: &str) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(index) = rest.find('$') {
            out.push_str(&rest[..index]);
            let after = &rest[index + 1..];
            let (name, consumed) = match after.strip_prefix('{') {
                Some(braced) => match braced.find('}') {
                    Some(end) => (&braced[..end], end + 2),
                    None => ("", 0),
                },
                None => {
                    let end = after
                        .find(|ch: char| !(ch.is_ascii_uppercase() || ch == '_'))
                        .unwrap_or(after.len());
                    (&after[..end], end)
                }
            };
            if name.is_empty() {
                out.push('$');
                rest = after;
                continue;
            }
            match self.get(name) {
                Some(value) => out.push_str(value),
                None if is_known(name) => {
                    return Err(TemplateError::Unresolved {
                        name: name.to_string(),
                        template: template.to_string(),
                    })
                }
                None => out.push_str(&rest[index..index + 1 + consumed]),
            }
            rest = &after[consumed..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        UPLOADER | UPLOADER_FLAGS | SOURCE | UPLOAD_PORT | UPLOAD_PORT_NAME | SCRIPT
    )
}
