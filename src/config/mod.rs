//! Configuration handling for jetkit
//!
//! Parses and manages `jetkit.toml` configuration files. The loaded
//! [`Config`] is passed explicitly through the pipeline; nothing is kept in
//! process-wide state.

mod merge;
mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::options::{Platform, RawOptions, ResolvedOptions};

pub use merge::{merge_sub_configs, MergedConfig};
pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    #[serde(default)]
    pub project: ProjectConfig,

    /// Directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Option defaults
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Raw option values, overridden by the command line
    #[serde(default)]
    pub options: RawOptions,

    /// Web build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Dev server sub-tasks
    #[serde(default)]
    pub connect: SubTaskConfigs,

    /// File watch sub-tasks
    #[serde(default)]
    pub watch: SubTaskConfigs,

    /// Lifecycle hook commands
    #[serde(default)]
    pub hooks: HooksConfig,

    /// Webpack customization
    #[serde(default)]
    pub webpack: WebpackSettings,

    /// Cordova integration
    #[serde(default)]
    pub cordova: CordovaConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let canonical_path = absolute(path.as_ref())?;

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::parse(&content)?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise use defaults rooted beside it.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let canonical_path = absolute(path.as_ref())?;
        if canonical_path.is_file() {
            return Self::load(canonical_path);
        }

        debug!("No config at {}, using defaults", canonical_path.display());
        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::default_config(root))
    }

    /// Parse configuration text without touching the filesystem
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse jetkit.toml")
    }

    /// Create a default configuration
    pub fn default_config(root: PathBuf) -> Self {
        Self { root, ..Self::default() }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.paths.source == self.paths.staging {
            anyhow::bail!(
                "paths.staging must differ from paths.source ('{}') or sources would be overwritten",
                self.paths.source
            );
        }

        for (name, config) in self.connect.iter().chain(self.watch.iter()) {
            if let Some(port) = config.options.get("port") {
                if !port.is_u64() {
                    anyhow::bail!("Sub-task '{}' has a non-numeric port: {}", name, port);
                }
            }
        }

        Ok(())
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.paths.source)
    }

    pub fn hybrid_dir(&self) -> PathBuf {
        self.root.join(&self.paths.hybrid)
    }

    /// Where compiled output for `platform` is written.
    pub fn staging_dir(&self, platform: Platform) -> PathBuf {
        if platform.is_hybrid() {
            self.hybrid_dir().join("www")
        } else {
            self.root.join(&self.paths.staging)
        }
    }

    /// Application entry module.
    pub fn entry_path(&self) -> PathBuf {
        let ext = if self.project.typescript { "ts" } else { "js" };
        self.source_dir().join("js").join(format!("main.{}", ext))
    }

    pub fn html_template_path(&self) -> PathBuf {
        self.source_dir()
            .join(self.build.html_template.as_deref().unwrap_or("index.html"))
    }

    /// Connect sub-tasks, falling back to a single dev server entry.
    pub fn connect_configs(&self) -> SubTaskConfigs {
        if !self.connect.is_empty() {
            return self.connect.clone();
        }
        let mut configs = SubTaskConfigs::new();
        configs.insert(
            "devServer".to_string(),
            SubTaskConfig::with_options(json!({
                "hostname": self.defaults.host,
                "port": self.defaults.server_port,
                "livereload": self.defaults.livereload,
                "open": true,
            })),
        );
        configs
    }

    /// Watch sub-tasks, falling back to watching the whole source tree.
    pub fn watch_configs(&self) -> SubTaskConfigs {
        if !self.watch.is_empty() {
            return self.watch.clone();
        }
        let mut configs = SubTaskConfigs::new();
        configs.insert(
            "sources".to_string(),
            SubTaskConfig {
                files: vec![format!("{}/**/*", self.paths.source)],
                ..SubTaskConfig::with_options(json!({
                    "livereload": self.defaults.livereload,
                    "livereloadPort": self.defaults.livereload_port,
                }))
            },
        );
        configs
    }

    /// Project resolved options into the connect and watch sub-tasks.
    pub fn merge_with(&self, options: &ResolvedOptions) -> MergedConfig {
        MergedConfig {
            connect: merge_sub_configs(&self.connect_configs(), &options.overrides),
            watch: merge_sub_configs(&self.watch_configs(), &options.overrides),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
