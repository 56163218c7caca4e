//! Lifecycle hooks
//!
//! Hooks are registered per [`HookName`] and run in registration order with
//! the mutable [`BuildContext`]. Running a name with nothing registered does
//! nothing.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::HooksConfig;
use crate::utils::run_shell;
use crate::webpack::BuildContext;

/// Pipeline points at which hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    BeforeBuild,
    AfterBuild,
    BeforeServe,
    AfterServe,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::BeforeBuild => "before_build",
            HookName::AfterBuild => "after_build",
            HookName::BeforeServe => "before_serve",
            HookName::AfterServe => "after_serve",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook '{hook}' ({name}) failed: {message}")]
    Failed {
        hook: HookName,
        name: String,
        message: String,
    },

    #[error("hook '{hook}' ({name}) printed an invalid context: {source}")]
    InvalidContext {
        hook: HookName,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A lifecycle hook. May mutate the context in place.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Hook name for logging and debugging
    fn name(&self) -> &str;

    async fn run(&self, hook: HookName, ctx: &mut BuildContext) -> Result<(), HookError>;
}

/// Runs registered hooks in order
#[derive(Default, Clone)]
pub struct HookRunner {
    hooks: HashMap<HookName, Vec<Arc<dyn Hook>>>,
}

impl HookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register shell-command hooks from `[hooks]`
    pub fn from_config(config: &HooksConfig, cwd: PathBuf) -> Self {
        let mut runner = Self::new();
        let sections = [
            (HookName::BeforeBuild, &config.before_build),
            (HookName::AfterBuild, &config.after_build),
            (HookName::BeforeServe, &config.before_serve),
            (HookName::AfterServe, &config.after_serve),
        ];
        for (name, commands) in sections {
            for command in commands {
                runner.register(name, Arc::new(CommandHook::new(command.clone(), cwd.clone())));
            }
        }
        runner
    }

    pub fn register(&mut self, name: HookName, hook: Arc<dyn Hook>) {
        self.hooks.entry(name).or_default().push(hook);
    }

    pub fn is_registered(&self, name: HookName) -> bool {
        self.hooks.get(&name).is_some_and(|h| !h.is_empty())
    }

    /// Run every hook registered under `name`, awaiting each in turn.
    pub async fn run(&self, name: HookName, ctx: &mut BuildContext) -> Result<(), HookError> {
        let Some(hooks) = self.hooks.get(&name) else {
            debug!("No {} hooks registered", name);
            return Ok(());
        };

        for hook in hooks {
            info!("Running {} hook: {}", name, hook.name());
            hook.run(name, ctx).await?;
        }
        Ok(())
    }
}

/// A hook running a shell command.
///
/// The command gets the context as JSON on stdin and `JETKIT_HOOK` in its
/// environment. If it prints a JSON object, that becomes the new context.
pub struct CommandHook {
    command: String,
    cwd: PathBuf,
}

impl CommandHook {
    pub fn new(command: String, cwd: PathBuf) -> Self {
        Self { command, cwd }
    }
}

#[async_trait]
impl Hook for CommandHook {
    fn name(&self) -> &str {
        &self.command
    }

    async fn run(&self, hook: HookName, ctx: &mut BuildContext) -> Result<(), HookError> {
        let payload = serde_json::to_string(&*ctx).map_err(anyhow::Error::from)?;
        let envs = vec![("JETKIT_HOOK".to_string(), hook.as_str().to_string())];
        let output = run_shell(&self.command, &self.cwd, Some(&payload), &envs).await?;

        if !output.success {
            return Err(HookError::Failed {
                hook,
                name: self.command.clone(),
                message: output.stderr.trim().to_string(),
            });
        }

        let stdout = output.stdout.trim();
        if !stdout.starts_with('{') {
            if !stdout.is_empty() {
                info!("{}", stdout);
            }
            return Ok(());
        }

        let mut updated: BuildContext =
            serde_json::from_str(stdout).map_err(|source| HookError::InvalidContext {
                hook,
                name: self.command.clone(),
                source,
            })?;
        updated.compiler = ctx.compiler.take();
        *ctx = updated;
        Ok(())
    }
}
