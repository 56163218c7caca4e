//! Build command implementation

use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use super::OptionArgs;
use crate::config::Config;
use crate::options::validate;
use crate::pipeline::Pipeline;
use crate::utils::{format_duration, format_size};

/// Build the app for a platform
#[derive(Args, Debug)]
pub struct BuildCommand {
    #[command(flatten)]
    pub options: OptionArgs,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let start = Instant::now();

        info!("Loading configuration from {}", config_path);
        let config = Config::load_or_default(config_path)?;
        let options = validate(&self.options.to_raw(&config.options), &config.defaults)?;

        eprintln!(
            "{} Building {} ({})...",
            "→".blue(),
            options.platform.to_string().bold(),
            options.build_type.as_str()
        );

        let ctx = Pipeline::new(config).build(options).await?;

        eprintln!(
            "\n{} Built into {} in {}\n",
            "✓".green().bold(),
            ctx.staging_path.display().to_string().cyan(),
            format_duration(start.elapsed())
        );

        if let Some(stats) = &ctx.compiler {
            for asset in &stats.assets {
                eprintln!(
                    "  {} {} {}",
                    "•".dimmed(),
                    asset.name.cyan(),
                    format_size(asset.size).dimmed()
                );
            }
            if !stats.assets.is_empty() {
                eprintln!();
            }
        }

        Ok(())
    }
}
