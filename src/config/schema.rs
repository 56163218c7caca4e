//! Configuration schema definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Project metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,

    /// Application sources are TypeScript
    #[serde(default)]
    pub typescript: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            typescript: false,
        }
    }
}

fn default_name() -> String {
    "jet-app".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Directory layout, relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_source")]
    pub source: String,

    /// Staging directory for web builds
    #[serde(default = "default_staging")]
    pub staging: String,

    /// Cordova project directory for hybrid builds
    #[serde(default = "default_hybrid")]
    pub hybrid: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            staging: default_staging(),
            hybrid: default_hybrid(),
        }
    }
}

fn default_source() -> String {
    "src".to_string()
}

fn default_staging() -> String {
    "web".to_string()
}

fn default_hybrid() -> String {
    "hybrid".to_string()
}

/// Values used when an option is not given
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Livereload for non-release builds
    #[serde(default = "default_true")]
    pub livereload: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub server_port: u16,

    #[serde(default = "default_livereload_port")]
    pub livereload_port: u16,

    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default = "default_theme_version")]
    pub theme_version: String,

    /// Cordova build configuration (signing etc.)
    #[serde(default = "default_build_config")]
    pub build_config: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            livereload: true,
            host: default_host(),
            server_port: default_server_port(),
            livereload_port: default_livereload_port(),
            theme: default_theme(),
            theme_version: default_theme_version(),
            build_config: default_build_config(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_server_port() -> u16 {
    8000
}

fn default_livereload_port() -> u16 {
    35729
}

fn default_theme() -> String {
    "redwood".to_string()
}

fn default_theme_version() -> String {
    "1.0.0".to_string()
}

fn default_build_config() -> String {
    "build.json".to_string()
}

/// Web build settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Stylesheets linked in addition to the theme, relative to staging
    #[serde(default)]
    pub stylesheets: Vec<String>,

    /// Public URL prefix; when set the bundler injects styles itself
    #[serde(default)]
    pub public_path: Option<String>,

    /// HTML template, relative to the source directory
    #[serde(default)]
    pub html_template: Option<String>,
}

/// A named sub-task configuration (`[connect.<name>]`, `[watch.<name>]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubTaskConfig {
    /// Settings bag that global options are projected into
    #[serde(default)]
    pub options: Map<String, Value>,

    /// Glob patterns, relative to the project root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl SubTaskConfig {
    pub fn with_options(options: Value) -> Self {
        Self {
            options: match options {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            files: Vec::new(),
        }
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(Value::as_bool)
    }

    pub fn option_port(&self, key: &str) -> Option<u16> {
        self.options
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok())
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

pub type SubTaskConfigs = BTreeMap<String, SubTaskConfig>;

/// Shell commands run at pipeline lifecycle points
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooksConfig {
    #[serde(default)]
    pub before_build: Vec<String>,

    #[serde(default)]
    pub after_build: Vec<String>,

    #[serde(default)]
    pub before_serve: Vec<String>,

    #[serde(default)]
    pub after_serve: Vec<String>,
}

/// Webpack customization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebpackSettings {
    /// Command receiving `{context, webpack}` on stdin and printing the result
    #[serde(default)]
    pub transform: Option<String>,

    /// JSON file deep-merged over the composed configuration
    #[serde(default)]
    pub overrides: Option<String>,

    /// Command used to run the bundler
    #[serde(default = "default_webpack_command")]
    pub command: String,
}

impl Default for WebpackSettings {
    fn default() -> Self {
        Self {
            transform: None,
            overrides: None,
            command: default_webpack_command(),
        }
    }
}

fn default_webpack_command() -> String {
    "npx webpack".to_string()
}

/// Cordova integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CordovaConfig {
    #[serde(default = "default_cordova_command")]
    pub command: String,
}

impl Default for CordovaConfig {
    fn default() -> Self {
        Self {
            command: default_cordova_command(),
        }
    }
}

fn default_cordova_command() -> String {
    "cordova".to_string()
}
