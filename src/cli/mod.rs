//! Command-line interface for jetkit
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: Build the app for a platform
//! - `serve`: Build, serve with livereload and deploy
//! - `hybrid-patch`: Patch prepared Cordova platform assets

mod build;
mod hybrid;
mod serve;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use crate::options::RawOptions;

pub use build::BuildCommand;
pub use hybrid::HybridPatchCommand;
pub use serve::ServeCommand;

/// jetkit - build and serve web and hybrid apps
#[derive(Parser, Debug)]
#[command(name = "jetkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to jetkit.toml config file
    #[arg(short, long, global = true, default_value = "jetkit.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the app
    Build(BuildCommand),

    /// Build, serve and deploy the app with livereload
    Serve(ServeCommand),

    /// Patch Cordova platform assets after `cordova prepare`
    HybridPatch(HybridPatchCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Build(cmd) => cmd.execute(&self.config).await,
            Commands::Serve(cmd) => cmd.execute(&self.config).await,
            Commands::HybridPatch(cmd) => cmd.execute(&self.config),
        }
    }
}

/// Options shared by `build` and `serve`
#[derive(Args, Debug, Default)]
pub struct OptionArgs {
    /// Target platform (web, android, ios, windows, browser)
    pub platform: Option<String>,

    /// Build for release
    #[arg(short, long)]
    pub release: bool,

    /// Theme name, optionally `name:platform`
    #[arg(long)]
    pub theme: Option<String>,

    /// Deploy destination (browser[:name], emulator, device, server-only)
    #[arg(long, group = "deploy")]
    pub destination: Option<String>,

    /// Deploy to a connected device
    #[arg(long, group = "deploy")]
    pub device: bool,

    /// Deploy to an emulator
    #[arg(long, group = "deploy")]
    pub emulator: bool,

    /// Deploy to a browser, optionally naming it
    #[arg(long, group = "deploy", num_args = 0..=1, default_missing_value = "", value_name = "NAME")]
    pub browser: Option<String>,

    /// Only start the dev server
    #[arg(long, group = "deploy")]
    pub server_only: bool,

    /// Cordova build configuration file
    #[arg(long)]
    pub build_config: Option<String>,

    /// Enable livereload
    #[arg(long, conflicts_with = "no_livereload")]
    pub livereload: bool,

    /// Disable livereload
    #[arg(long)]
    pub no_livereload: bool,

    /// Dev server port
    #[arg(long)]
    pub port: Option<String>,

    /// Livereload server port
    #[arg(long)]
    pub livereload_port: Option<String>,

    /// Free-form options passed through to hooks
    #[arg(long)]
    pub user_options: Option<String>,

    /// Options passed to Cordova after `--`
    #[arg(long)]
    pub platform_options: Option<String>,
}

impl OptionArgs {
    /// Overlay the given flags on `base` (the `[options]` table).
    ///
    /// Values stay raw here so the validator reports bad input.
    pub fn to_raw(&self, base: &RawOptions) -> RawOptions {
        let mut raw = base.clone();
        let mut set = |key: &str, value: Value| {
            raw.insert(key.to_string(), value);
        };

        let strings = [
            ("platform", &self.platform),
            ("theme", &self.theme),
            ("buildConfig", &self.build_config),
            ("port", &self.port),
            ("livereloadPort", &self.livereload_port),
            ("userOptions", &self.user_options),
            ("platformOptions", &self.platform_options),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                set(key, Value::from(value.as_str()));
            }
        }

        if self.release {
            set("buildType", Value::from("release"));
        }

        if self.livereload {
            set("livereload", Value::Bool(true));
        } else if self.no_livereload {
            set("livereload", Value::Bool(false));
        }

        let destination = match (&self.destination, &self.browser) {
            (Some(destination), _) => Some(destination.clone()),
            (None, Some(name)) if name.is_empty() => Some("browser".to_string()),
            (None, Some(name)) => Some(format!("browser:{}", name)),
            (None, None) if self.device => Some("device".to_string()),
            (None, None) if self.emulator => Some("emulator".to_string()),
            (None, None) if self.server_only => Some("server-only".to_string()),
            (None, None) => None,
        };
        if let Some(destination) = destination {
            set("destination", Value::from(destination));
        }

        raw
    }
}

/// Print the jetkit banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "jetkit".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jetkit").chain(args.iter().copied())).unwrap()
    }

    fn raw_of(cli: &Cli, base: Value) -> Value {
        let Value::Object(base) = base else { unreachable!() };
        let raw = match &cli.command {
            Commands::Build(cmd) => cmd.options.to_raw(&base),
            Commands::Serve(cmd) => cmd.options.to_raw(&base),
            Commands::HybridPatch(_) => unreachable!(),
        };
        Value::Object(raw)
    }

    #[test]
    fn test_flags_become_raw_options() {
        let cli = parse(&["build", "android", "--release", "--device", "--port", "8100"]);
        assert_eq!(
            raw_of(&cli, json!({})),
            json!({ "platform": "android", "buildType": "release", "destination": "device", "port": "8100" })
        );
    }

    #[test]
    fn test_flags_override_config_options() {
        let cli = parse(&["serve", "--theme", "alta:android", "--no-livereload"]);
        assert_eq!(
            raw_of(&cli, json!({ "theme": "redwood", "open": true })),
            json!({ "theme": "alta:android", "livereload": false, "open": true })
        );
    }

    #[test]
    fn test_browser_flag_with_and_without_name() {
        let cli = parse(&["serve", "android", "--browser"]);
        assert_eq!(raw_of(&cli, json!({}))["destination"], json!("browser"));

        let cli = parse(&["serve", "android", "--browser", "firefox"]);
        assert_eq!(raw_of(&cli, json!({}))["destination"], json!("browser:firefox"));
    }

    #[test]
    fn test_conflicting_destinations_are_rejected() {
        let result = Cli::try_parse_from(["jetkit", "serve", "android", "--device", "--emulator"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = parse(&["build", "-v", "--config", "app/jetkit.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, "app/jetkit.toml");
    }
}
