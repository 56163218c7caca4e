//! Serve command implementation

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use tracing::info;

use super::OptionArgs;
use crate::config::Config;
use crate::options::validate;
use crate::pipeline::Pipeline;

/// Build, serve with livereload and deploy
#[derive(Args, Debug)]
pub struct ServeCommand {
    #[command(flatten)]
    pub options: OptionArgs,

    /// Open the app in a browser
    #[arg(long)]
    pub open: bool,

    /// Serve the existing staging output without building
    #[arg(long)]
    pub no_build: bool,
}

impl ServeCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        info!("Loading configuration from {}", config_path);
        let config = Config::load_or_default(config_path)?;

        let mut raw = self.options.to_raw(&config.options);
        if self.open {
            raw.insert("open".to_string(), Value::Bool(true));
        }
        let options = validate(&raw, &config.defaults)?;

        eprintln!(
            "{} Serving {} to {}...",
            "→".blue(),
            options.platform.to_string().bold(),
            options.destination
        );

        let pipeline = Pipeline::new(config);
        let session = pipeline.serve(options, self.no_build).await?;

        eprintln!(
            "\n{} Dev server at {}",
            "✓".green().bold(),
            session.server.url().cyan().underline()
        );
        if let Some(addr) = session.server.livereload_addr() {
            eprintln!("  {} Livereload on port {}", "•".dimmed(), addr.port().to_string().green());
        }
        eprintln!("  {} Press {} to stop\n", "•".dimmed(), "Ctrl+C".yellow());

        pipeline.watch(session).await?;
        Ok(())
    }
}
