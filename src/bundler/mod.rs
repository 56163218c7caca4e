//! Bundler invocation
//!
//! The bundler is an external engine: it receives a composed
//! [`WebpackConfig`] and reports either compile statistics or the errors it
//! collected. [`WebpackCli`] drives webpack through its command line.

mod render;

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::utils::run_shell;
use crate::webpack::{BuildContext, WebpackConfig};

pub use render::render_config_module;

/// Information about an emitted asset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetInfo {
    pub name: String,
    #[serde(default)]
    pub size: usize,
}

/// Result of a successful compilation
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    pub duration: Duration,
    pub assets: Vec<AssetInfo>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundler failed to run: {0}")]
    Engine(String),

    #[error("compilation failed with {} error(s):\n{}", .0.len(), .0.join("\n"))]
    Compilation(Vec<String>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Something that can compile a webpack configuration
#[async_trait]
pub trait BundlerEngine: Send + Sync {
    async fn compile(&self, config: &WebpackConfig, ctx: &BuildContext) -> Result<CompileStats, BundleError>;
}

/// Subset of `webpack --json` output
#[derive(Debug, Default, Deserialize)]
struct StatsJson {
    #[serde(default)]
    errors: Vec<StatsMessage>,
    #[serde(default)]
    warnings: Vec<StatsMessage>,
    #[serde(default)]
    assets: Vec<AssetInfo>,
}

/// webpack 4 prints plain strings, webpack 5 objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatsMessage {
    Text(String),
    Detailed { message: String },
}

impl StatsMessage {
    fn into_message(self) -> String {
        match self {
            StatsMessage::Text(message) | StatsMessage::Detailed { message } => message,
        }
    }
}

/// Runs webpack's CLI against a generated config module
pub struct WebpackCli {
    command: String,
    work_dir: PathBuf,
}

impl WebpackCli {
    pub fn new(command: impl Into<String>, work_dir: PathBuf) -> Self {
        Self {
            command: command.into(),
            work_dir,
        }
    }

    /// Write the config module and return its path
    fn write_config(&self, config: &WebpackConfig) -> anyhow::Result<PathBuf> {
        let dir = self.work_dir.join(".jetkit");
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join("webpack.config.js");
        fs::write(&path, render_config_module(config.as_value()))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[async_trait]
impl BundlerEngine for WebpackCli {
    async fn compile(&self, config: &WebpackConfig, ctx: &BuildContext) -> Result<CompileStats, BundleError> {
        let start = Instant::now();
        let config_path = self.write_config(config)?;
        let command = format!("{} --config \"{}\" --json", self.command, config_path.display());

        let bar = spinner(&format!("Bundling for {}", ctx.platform));
        let output = run_shell(&command, &self.work_dir, None, &[]).await;
        bar.finish_and_clear();
        let output = output?;

        let stats: Option<StatsJson> = match serde_json::from_str(output.stdout.trim()) {
            Ok(stats) => Some(stats),
            Err(e) => {
                debug!("Could not parse webpack stats: {}", e);
                None
            }
        };

        let Some(stats) = stats else {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            return Err(BundleError::Engine(detail.to_string()));
        };

        if !stats.errors.is_empty() {
            return Err(BundleError::Compilation(
                stats.errors.into_iter().map(StatsMessage::into_message).collect(),
            ));
        }
        if !output.success {
            return Err(BundleError::Engine(output.stderr.trim().to_string()));
        }

        let warnings: Vec<String> = stats.warnings.into_iter().map(StatsMessage::into_message).collect();
        for warning in &warnings {
            warn!("{}", warning);
        }

        Ok(CompileStats {
            duration: start.elapsed(),
            assets: stats.assets,
            warnings,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::options::{validate, RawOptions};
    use serde_json::json;

    fn context(root: PathBuf) -> BuildContext {
        let config = Config::default_config(root);
        let options = validate(&RawOptions::new(), &config.defaults).unwrap();
        let merged = config.merge_with(&options);
        BuildContext::new(&config, options, &merged)
    }

    fn config() -> WebpackConfig {
        WebpackConfig::new(json!({ "mode": "development" }))
    }

    #[tokio::test]
    async fn test_successful_stats_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WebpackCli::new(
            r#"echo '{"errors":[],"warnings":[{"message":"big"}],"assets":[{"name":"js/main.js","size":42}]}' ;:"#,
            dir.path().to_path_buf(),
        );

        let stats = engine.compile(&config(), &context(dir.path().to_path_buf())).await.unwrap();
        assert_eq!(stats.assets, vec![AssetInfo { name: "js/main.js".into(), size: 42 }]);
        assert_eq!(stats.warnings, vec!["big"]);
        assert!(dir.path().join(".jetkit/webpack.config.js").is_file());
    }

    #[tokio::test]
    async fn test_compilation_errors_fail_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WebpackCli::new(
            r#"echo '{"errors":["Module not found","Syntax error"]}'; exit 1 ;:"#,
            dir.path().to_path_buf(),
        );

        let err = engine.compile(&config(), &context(dir.path().to_path_buf())).await.unwrap_err();
        match err {
            BundleError::Compilation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_engine_failure_without_stats() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WebpackCli::new("echo 'webpack: not found' >&2; exit 127 ;:", dir.path().to_path_buf());

        let err = engine.compile(&config(), &context(dir.path().to_path_buf())).await.unwrap_err();
        assert!(matches!(err, BundleError::Engine(ref msg) if msg.contains("not found")));
    }
}
