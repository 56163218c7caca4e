//! Theme descriptor resolution

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Platform, ValidationError};

/// A resolved theme: which theme, for which platform, at which version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeDescriptor {
    pub name: String,
    pub platform: String,
    pub version: String,
}

impl ThemeDescriptor {
    /// Theme for `platform`; hybrid platforms theme against themselves.
    pub fn named(name: &str, platform: Platform, version: &str) -> Self {
        Self {
            name: name.to_string(),
            platform: platform.as_str().to_string(),
            version: version.to_string(),
        }
    }

    /// Accepts `"name"`, `"name:platform"` or `{ name, platform?, version? }`.
    pub fn from_value(value: &Value, platform: Platform, default_version: &str) -> Result<Self, ValidationError> {
        match value {
            Value::String(text) => Ok(Self::parse(text, platform, default_version)),
            Value::Object(map) => {
                let field = |key: &str| -> Result<Option<String>, ValidationError> {
                    match map.get(key) {
                        None | Some(Value::Null) => Ok(None),
                        Some(Value::String(s)) => Ok(Some(s.clone())),
                        Some(_) => Err(ValidationError::TypeMismatch {
                            key: format!("theme.{}", key),
                            expected: "string",
                            found: "non-string".to_string(),
                        }),
                    }
                };

                let name = field("name")?.ok_or_else(|| ValidationError::TypeMismatch {
                    key: "theme.name".to_string(),
                    expected: "string",
                    found: "nothing".to_string(),
                })?;

                Ok(Self {
                    name,
                    platform: field("platform")?.unwrap_or_else(|| platform.as_str().to_string()),
                    version: field("version")?.unwrap_or_else(|| default_version.to_string()),
                })
            }
            _ => Err(ValidationError::TypeMismatch {
                key: "theme".to_string(),
                expected: "string or theme descriptor",
                found: value.to_string(),
            }),
        }
    }

    fn parse(text: &str, platform: Platform, default_version: &str) -> Self {
        match text.split_once(':') {
            Some((name, theme_platform)) if !theme_platform.is_empty() => Self {
                name: name.to_string(),
                platform: theme_platform.to_string(),
                version: default_version.to_string(),
            },
            _ => Self::named(text.trim_end_matches(':'), platform, default_version),
        }
    }

    /// Stylesheet path relative to the staging directory.
    pub fn stylesheet(&self) -> String {
        format!(
            "css/{name}/{version}/{platform}/{name}.css",
            name = self.name,
            version = self.version,
            platform = self.platform
        )
    }
}
