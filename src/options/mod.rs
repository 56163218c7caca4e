//! Build and serve option validation
//!
//! Raw options arrive as a flat JSON map assembled from `jetkit.toml`'s
//! `[options]` table and the command line. [`validate`] type-checks every
//! recognized key and resolves the documented defaults, producing a
//! [`ResolvedOptions`] in which nothing is left ambiguous.

mod theme;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::config::DefaultsConfig;
use crate::utils::expand_home;

pub use theme::ThemeDescriptor;

/// Raw, unvalidated options keyed by their camelCase names.
pub type RawOptions = Map<String, Value>;

/// Browsers accepted as a `target` for the browser destination.
pub const SUPPORTED_BROWSERS: &[&str] = &["chrome", "firefox", "edge", "ie", "opera", "safari"];

/// Hybrid builds run Cordova one directory below the project root.
const BUILD_CONFIG_PARENT: &str = "..";

/// Option validation failure. Always names the offending option.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("option '{key}' must be a {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("option '{key}' has invalid value '{value}'; expected one of: {allowed}")]
    InvalidValue {
        key: String,
        value: String,
        allowed: String,
    },

    #[error("option '{key}' value '{value}' is not a valid port number")]
    InvalidPort { key: String, value: String },

    #[error("browser '{value}' is not supported; supported browsers are: {}", SUPPORTED_BROWSERS.join(", "))]
    UnsupportedBrowser { value: String },

    #[error("option 'livereload' cannot be enabled for a release build")]
    ReleaseLivereload,

    #[error("destination '{destination}' is not available for the web platform")]
    WebDestination { destination: Destination },
}

/// Target platform of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Android,
    Ios,
    Windows,
    Browser,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Web,
        Platform::Android,
        Platform::Ios,
        Platform::Windows,
        Platform::Browser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Windows => "windows",
            Platform::Browser => "browser",
        }
    }

    /// Whether the platform is packaged through Cordova.
    pub fn is_hybrid(&self) -> bool {
        !matches!(self, Platform::Web)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s.to_lowercase())
            .ok_or_else(|| invalid_value("platform", s, Platform::ALL.iter().map(|p| p.as_str())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Debug,
    Release,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "debug",
            BuildType::Release => "release",
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, BuildType::Release)
    }
}

impl FromStr for BuildType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" | "dev" => Ok(BuildType::Debug),
            "release" | "prod" => Ok(BuildType::Release),
            _ => Err(invalid_value("buildType", s, ["debug", "release"])),
        }
    }
}

/// Where a hybrid app is deployed when served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    Browser,
    Emulator,
    Device,
    ServerOnly,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Browser => "browser",
            Destination::Emulator => "emulator",
            Destination::Device => "device",
            Destination::ServerOnly => "server-only",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browser" => Ok(Destination::Browser),
            "emulator" => Ok(Destination::Emulator),
            "device" => Ok(Destination::Device),
            "server-only" | "serveronly" => Ok(Destination::ServerOnly),
            _ => Err(invalid_value(
                "destination",
                s,
                ["browser", "emulator", "device", "server-only"],
            )),
        }
    }
}

/// Global settings that are projected into every sub-task config.
///
/// `None` means "not given", which must leave a sub-task's own value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalOverrides {
    pub livereload: Option<bool>,
    pub open: Option<bool>,
    pub port: Option<u16>,
    pub livereload_port: Option<u16>,
}

/// Fully validated options for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    pub platform: Platform,
    pub build_type: BuildType,
    pub destination: Destination,
    pub target: Option<String>,
    pub livereload: bool,
    pub port: u16,
    pub livereload_port: u16,
    pub open: bool,
    pub theme: ThemeDescriptor,
    pub build_config: PathBuf,
    pub user_options: Option<String>,
    pub platform_options: Option<String>,
    /// Values the user supplied explicitly, after livereload policy.
    pub overrides: GlobalOverrides,
}

/// Validate raw options against the configured defaults.
pub fn validate(raw: &RawOptions, defaults: &DefaultsConfig) -> Result<ResolvedOptions, ValidationError> {
    let platform = match get_str(raw, "platform")? {
        Some(value) => value.parse()?,
        None => Platform::Web,
    };

    // Release wins if either spelling asks for it.
    let build_type = match (get_str(raw, "buildType")?, get_bool(raw, "release")?) {
        (_, Some(true)) => BuildType::Release,
        (Some(value), _) => value.parse()?,
        (None, _) => BuildType::Debug,
    };

    let (destination, target) = resolve_destination(raw, platform)?;

    let explicit_port = get_port(raw, "port")?;
    let explicit_lr_port = get_port(raw, "livereloadPort")?;
    let open = get_bool(raw, "open")?;
    let explicit_livereload = get_bool(raw, "livereload")?;

    let livereload = resolve_livereload(explicit_livereload, build_type, destination, defaults)?;

    let theme = match raw.get("theme") {
        None | Some(Value::Null) => ThemeDescriptor::named(&defaults.theme, platform, &defaults.theme_version),
        Some(value) => ThemeDescriptor::from_value(value, platform, &defaults.theme_version)?,
    };

    let build_config = match get_str(raw, "buildConfig")? {
        Some(path) => normalize_build_config(path),
        None => normalize_build_config(&defaults.build_config),
    };

    Ok(ResolvedOptions {
        platform,
        build_type,
        destination,
        target,
        livereload,
        port: explicit_port.unwrap_or(defaults.server_port),
        livereload_port: explicit_lr_port.unwrap_or(defaults.livereload_port),
        open: open.unwrap_or(false),
        theme,
        build_config,
        user_options: get_str(raw, "userOptions")?.map(str::to_string),
        platform_options: get_str(raw, "platformOptions")?.map(str::to_string),
        overrides: GlobalOverrides {
            livereload: Some(livereload),
            open,
            port: explicit_port,
            livereload_port: explicit_lr_port,
        },
    })
}

/// Apply the livereload rules in order; later rules override earlier ones.
fn resolve_livereload(
    explicit: Option<bool>,
    build_type: BuildType,
    destination: Destination,
    defaults: &DefaultsConfig,
) -> Result<bool, ValidationError> {
    let mut livereload = match (explicit, build_type.is_release()) {
        (None, true) => {
            info!("Livereload disabled for release build");
            false
        }
        (None, false) => defaults.livereload,
        (Some(true), true) => return Err(ValidationError::ReleaseLivereload),
        (Some(value), _) => value,
    };

    if destination == Destination::Device && livereload {
        info!("Livereload disabled when deploying to a device");
        livereload = false;
    }

    Ok(livereload)
}

fn resolve_destination(
    raw: &RawOptions,
    platform: Platform,
) -> Result<(Destination, Option<String>), ValidationError> {
    let destination = get_str(raw, "destination")?;
    let target = get_str(raw, "target")?;

    // "browser:firefox" carries the target browser inline.
    let (destination, target) = match destination.and_then(|d| d.split_once(':')) {
        Some((dest, browser)) => (Some(dest), Some(browser).or(target)),
        None => (destination, target),
    };

    let target = target.map(validate_browser).transpose()?;

    let destination = match destination {
        Some(value) => value.parse()?,
        None if platform.is_hybrid() => Destination::Emulator,
        None => Destination::Browser,
    };

    if !platform.is_hybrid() && matches!(destination, Destination::Emulator | Destination::Device) {
        return Err(ValidationError::WebDestination { destination });
    }

    Ok((destination, target))
}

fn validate_browser(value: &str) -> Result<String, ValidationError> {
    let lower = value.to_lowercase();
    if SUPPORTED_BROWSERS.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(ValidationError::UnsupportedBrowser {
            value: value.to_string(),
        })
    }
}

/// Expand a leading `~` and anchor relative paths one directory up.
pub fn normalize_build_config(path: &str) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        Path::new(BUILD_CONFIG_PARENT).join(expanded)
    }
}

fn get_str<'a>(raw: &'a RawOptions, key: &str) -> Result<Option<&'a str>, ValidationError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(mismatch(key, "string", other)),
    }
}

fn get_bool(raw: &RawOptions, key: &str) -> Result<Option<bool>, ValidationError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(mismatch(key, "boolean", other)),
    }
}

/// Ports may be given as numbers or numeric strings.
fn get_port(raw: &RawOptions, key: &str) -> Result<Option<u16>, ValidationError> {
    let invalid = |value: String| ValidationError::InvalidPort {
        key: key.to_string(),
        value,
    };

    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(n.to_string())),
        Some(Value::String(s)) => s.trim().parse::<u16>().map(Some).map_err(|_| invalid(s.clone())),
        Some(other) => Err(mismatch(key, "number", other)),
    }
}

fn mismatch(key: &str, expected: &'static str, found: &Value) -> ValidationError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    ValidationError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.to_string(),
    }
}

fn invalid_value<'a>(key: &str, value: &str, allowed: impl IntoIterator<Item = &'a str>) -> ValidationError {
    ValidationError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        allowed: allowed.into_iter().collect::<Vec<_>>().join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(value: Value) -> RawOptions {
        match value {
            Value::Object(map) => map,
            _ => panic!("options must be an object"),
        }
    }

    fn resolve(value: Value) -> Result<ResolvedOptions, ValidationError> {
        validate(&raw(value), &DefaultsConfig::default())
    }

    #[test]
    fn test_empty_options_resolve_to_defaults() {
        let opts = resolve(json!({})).unwrap();
        assert_eq!(opts.platform, Platform::Web);
        assert_eq!(opts.build_type, BuildType::Debug);
        assert_eq!(opts.destination, Destination::Browser);
        assert!(opts.livereload);
        assert_eq!(opts.port, 8000);
        assert_eq!(opts.livereload_port, 35729);
        assert!(!opts.open);
        assert_eq!(opts.theme.name, "redwood");
        assert_eq!(opts.build_config, Path::new("..").join("build.json"));
    }

    #[test]
    fn test_hybrid_destination_defaults_to_emulator() {
        let opts = resolve(json!({ "platform": "android" })).unwrap();
        assert_eq!(opts.destination, Destination::Emulator);
    }

    #[test]
    fn test_release_without_livereload_turns_it_off() {
        for platform in ["web", "android", "ios", "windows", "browser"] {
            let opts = resolve(json!({ "platform": platform, "buildType": "release" })).unwrap();
            assert!(!opts.livereload, "platform {}", platform);
        }
        let opts = resolve(json!({ "release": true })).unwrap();
        assert!(!opts.livereload);
    }

    #[test]
    fn test_release_with_livereload_fails() {
        let err = resolve(json!({ "buildType": "release", "livereload": true })).unwrap_err();
        assert_eq!(err, ValidationError::ReleaseLivereload);
    }

    #[test]
    fn test_release_with_livereload_false_is_allowed() {
        let opts = resolve(json!({ "buildType": "release", "livereload": false })).unwrap();
        assert!(!opts.livereload);
    }

    #[test]
    fn test_device_destination_disables_livereload() {
        let opts = resolve(json!({ "platform": "ios", "destination": "device", "livereload": true })).unwrap();
        assert!(!opts.livereload);
        assert_eq!(opts.overrides.livereload, Some(false));
    }

    #[test]
    fn test_configured_livereload_default_applies() {
        let defaults = DefaultsConfig {
            livereload: false,
            ..DefaultsConfig::default()
        };
        let opts = validate(&raw(json!({})), &defaults).unwrap();
        assert!(!opts.livereload);
    }

    #[test]
    fn test_type_mismatch_names_the_key() {
        let err = resolve(json!({ "livereload": "yes" })).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                key: "livereload".into(),
                expected: "boolean",
                found: "string".into(),
            }
        );
        assert!(err.to_string().contains("livereload"));
    }

    #[test]
    fn test_ports_are_coerced() {
        let opts = resolve(json!({ "port": "9000", "livereloadPort": 36000 })).unwrap();
        assert_eq!(opts.port, 9000);
        assert_eq!(opts.livereload_port, 36000);
        assert_eq!(opts.overrides.port, Some(9000));
    }

    #[test]
    fn test_non_numeric_port_fails() {
        let err = resolve(json!({ "port": "eighty" })).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPort { ref key, .. } if key == "port"));
    }

    #[test]
    fn test_unsupported_browser_lists_the_valid_set() {
        let err = resolve(json!({ "destination": "browser:netscape" })).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("netscape"));
        for browser in SUPPORTED_BROWSERS {
            assert!(message.contains(browser));
        }
    }

    #[test]
    fn test_inline_browser_target() {
        let opts = resolve(json!({ "platform": "browser", "destination": "browser:Firefox" })).unwrap();
        assert_eq!(opts.destination, Destination::Browser);
        assert_eq!(opts.target.as_deref(), Some("firefox"));
    }

    #[test]
    fn test_web_rejects_device_destination() {
        let err = resolve(json!({ "destination": "device" })).unwrap_err();
        assert!(matches!(err, ValidationError::WebDestination { .. }));
    }

    #[test]
    fn test_unknown_platform_fails() {
        let err = resolve(json!({ "platform": "symbian" })).unwrap_err();
        assert!(err.to_string().contains("platform"));
    }

    #[test]
    fn test_build_config_normalization() {
        assert_eq!(normalize_build_config("/etc/build.json"), PathBuf::from("/etc/build.json"));
        assert_eq!(normalize_build_config("conf/build.json"), Path::new("..").join("conf/build.json"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(normalize_build_config("~/build.json"), home.join("build.json"));
        }
    }

    #[test]
    fn test_unset_overrides_stay_undefined() {
        let opts = resolve(json!({})).unwrap();
        assert_eq!(opts.overrides.open, None);
        assert_eq!(opts.overrides.port, None);
        assert_eq!(opts.overrides.livereload_port, None);
        assert_eq!(opts.overrides.livereload, Some(true));
    }
}
