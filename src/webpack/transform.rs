//! User extension point for the composed webpack configuration

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use super::{BuildContext, WebpackConfig};
use crate::utils::run_shell;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("webpack transform `{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("webpack transform `{command}` printed invalid output: {source}")]
    InvalidOutput {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("webpack transform failed: {0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Rewrites the webpack configuration before it reaches the bundler.
///
/// Returning `Ok(None)` keeps the configuration as it was.
#[async_trait]
pub trait WebpackTransform: Send + Sync {
    async fn transform(
        &self,
        context: &mut BuildContext,
        config: WebpackConfig,
    ) -> Result<Option<WebpackConfig>, TransformError>;
}

/// A transform backed by a closure
pub struct FnTransform<F>(F);

impl<F> FnTransform<F>
where
    F: Fn(&mut BuildContext, WebpackConfig) -> Result<Option<WebpackConfig>, TransformError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> WebpackTransform for FnTransform<F>
where
    F: Fn(&mut BuildContext, WebpackConfig) -> Result<Option<WebpackConfig>, TransformError> + Send + Sync,
{
    async fn transform(
        &self,
        context: &mut BuildContext,
        config: WebpackConfig,
    ) -> Result<Option<WebpackConfig>, TransformError> {
        (self.0)(context, config)
    }
}

/// What a transform command may print: either half can be left out.
#[derive(Debug, Serialize, Deserialize)]
struct TransformOutput {
    #[serde(default)]
    context: Option<BuildContext>,
    #[serde(default)]
    webpack: Option<WebpackConfig>,
}

/// A shell command reading `{context, webpack}` JSON on stdin.
pub struct CommandTransform {
    command: String,
    cwd: PathBuf,
}

impl CommandTransform {
    pub fn new(command: impl Into<String>, cwd: PathBuf) -> Self {
        Self {
            command: command.into(),
            cwd,
        }
    }
}

#[async_trait]
impl WebpackTransform for CommandTransform {
    async fn transform(
        &self,
        context: &mut BuildContext,
        config: WebpackConfig,
    ) -> Result<Option<WebpackConfig>, TransformError> {
        let payload = json!({ "context": &*context, "webpack": config }).to_string();
        let output = run_shell(&self.command, &self.cwd, Some(&payload), &[]).await?;

        if !output.success {
            return Err(TransformError::Failed {
                command: self.command.clone(),
                status: output
                    .code
                    .map(|c| format!("status {}", c))
                    .unwrap_or_else(|| "a signal".to_string()),
                stderr: output.stderr.trim().to_string(),
            });
        }

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            debug!("Transform `{}` returned nothing", self.command);
            return Ok(None);
        }

        let parsed: TransformOutput =
            serde_json::from_str(stdout).map_err(|source| TransformError::InvalidOutput {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut updated) = parsed.context {
            updated.compiler = context.compiler.take();
            *context = updated;
        }

        Ok(parsed.webpack)
    }
}

/// Run the optional transform; a `None` result keeps `config`.
pub async fn apply_transform(
    transform: Option<&dyn WebpackTransform>,
    context: &mut BuildContext,
    config: WebpackConfig,
) -> Result<WebpackConfig, TransformError> {
    let Some(transform) = transform else {
        return Ok(config);
    };

    let result = transform.transform(context, config.clone()).await?;
    Ok(result.unwrap_or(config))
}
