//! Per-invocation build/serve context

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bundler::CompileStats;
use crate::config::{Config, MergedConfig};
use crate::options::{BuildType, Destination, Platform, ResolvedOptions, ThemeDescriptor};

/// Mutable state threaded through one build or serve call.
///
/// Hooks and the webpack transform receive it as JSON and may hand back a
/// modified copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildContext {
    pub options: ResolvedOptions,
    pub platform: Platform,
    pub build_type: BuildType,
    pub root: PathBuf,
    pub source_path: PathBuf,
    pub staging_path: PathBuf,
    pub entry: PathBuf,
    pub theme: ThemeDescriptor,
    pub host: String,
    pub port: u16,
    pub livereload_port: u16,
    /// Whether the dev server opens a browser
    pub open: bool,
    pub typescript: bool,

    /// Result of the last successful compilation
    #[serde(skip)]
    pub compiler: Option<CompileStats>,
}

impl BuildContext {
    pub fn new(config: &Config, options: ResolvedOptions, merged: &MergedConfig) -> Self {
        let server = merged.server();
        let host = server
            .and_then(|s| s.option_str("hostname"))
            .unwrap_or(&config.defaults.host)
            .to_string();
        let port = server.and_then(|s| s.option_port("port")).unwrap_or(options.port);
        // Hybrid apps only get a desktop browser for the browser destination.
        let open = server.and_then(|s| s.option_bool("open")).unwrap_or(options.open)
            && (!options.platform.is_hybrid() || options.destination == Destination::Browser);

        Self {
            platform: options.platform,
            build_type: options.build_type,
            root: config.root.clone(),
            source_path: config.source_dir(),
            staging_path: config.staging_dir(options.platform),
            entry: config.entry_path(),
            theme: options.theme.clone(),
            host,
            port,
            livereload_port: options.livereload_port,
            open,
            typescript: config.project.typescript,
            compiler: None,
            options,
        }
    }

    pub fn livereload(&self) -> bool {
        self.options.livereload
    }
}
