//! Hybrid patch command implementation

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::config::Config;
use crate::hybrid::{cordova_dir, patch_all, PatchEnv};

/// Patch `index.html` and `config.xml` of prepared Cordova platforms.
///
/// Meant to run as Cordova's `after_prepare` hook; settings come from the
/// environment `jetkit serve` passes to Cordova.
#[derive(Args, Debug)]
pub struct HybridPatchCommand {
    /// Cordova project directory (overrides `cordovaDirectory`)
    #[arg(long)]
    pub cordova_dir: Option<PathBuf>,
}

impl HybridPatchCommand {
    pub fn execute(&self, config_path: &str) -> Result<()> {
        let env = PatchEnv::from_process();
        let dir = match &self.cordova_dir {
            Some(dir) => dir.clone(),
            None => cordova_dir(&env, &Config::load_or_default(config_path)?.hybrid_dir()),
        };

        let reports = patch_all(&dir, &env);
        if reports.is_empty() {
            eprintln!("{} No platforms patched in {}", "•".dimmed(), dir.display());
        }
        for report in &reports {
            eprintln!(
                "{} Patched {} {}",
                "✓".green().bold(),
                report.platform.to_string().bold(),
                format!("(index.html: {}, config.xml: {})", report.index_html, report.config_xml).dimmed()
            );
        }
        Ok(())
    }
}
