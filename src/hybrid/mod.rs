//! Hybrid asset patching
//!
//! Runs after Cordova has prepared a platform and rewrites the copied
//! `index.html` and `config.xml` in place. Every edit is best effort: a
//! missing file or tag leaves the document alone, and a failing platform
//! is logged without stopping the others.
//!
//! The patcher is configured entirely through the environment Cordova
//! inherits from `jetkit serve` (see [`PatchEnv`]).

mod cordova;
mod html;
mod markup;
mod xml;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::options::{Destination, Platform};

pub use cordova::{build_env, deploy_env, CordovaRunner};
pub use html::{add_body_classes, add_livereload_script, allow_livereload_in_csp, platform_classes};
pub use xml::{add_allow_navigation, set_content_src, set_load_timeout, LOAD_URL_TIMEOUT};

/// Livereload port used when `livereloadPort` is not set
pub const DEFAULT_LIVERELOAD_PORT: u16 = 35729;

/// Hosts and the Android emulator's alias for them
const BROWSER_HOST: &str = "localhost";
const ANDROID_EMULATOR_HOST: &str = "10.0.2.2";
const LOOPBACK_HOST: &str = "127.0.0.1";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Patcher inputs, as environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchEnv {
    pub livereload: Option<String>,
    pub livereload_port: Option<String>,
    pub platform: Option<String>,
    pub port: Option<String>,
    pub destination: Option<String>,
    pub cordova_directory: Option<String>,
}

/// Where a served app points its webview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployTarget {
    pub platform: Platform,
    pub port: u16,
    pub destination: Destination,
}

impl PatchEnv {
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut env = Self::default();
        for (key, value) in vars {
            let slot = match key.as_ref() {
                "livereload" => &mut env.livereload,
                "livereloadPort" => &mut env.livereload_port,
                "platform" => &mut env.platform,
                "port" => &mut env.port,
                "destination" => &mut env.destination,
                "cordovaDirectory" => &mut env.cordova_directory,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        env
    }

    /// Set, and not the string `false`
    pub fn livereload_enabled(&self) -> bool {
        matches!(self.livereload.as_deref(), Some(value) if value != "false")
    }

    pub fn livereload_port(&self) -> u16 {
        match self.livereload_port.as_deref().map(str::parse) {
            Some(Ok(port)) => port,
            Some(Err(_)) => {
                warn!("Ignoring invalid livereloadPort, using {}", DEFAULT_LIVERELOAD_PORT);
                DEFAULT_LIVERELOAD_PORT
            }
            None => DEFAULT_LIVERELOAD_PORT,
        }
    }

    pub fn destination(&self) -> Option<Destination> {
        self.destination.as_deref().and_then(|d| d.parse().ok())
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform.as_deref().and_then(|p| p.parse().ok())
    }

    /// Deploy metadata, only when platform, port and destination are all valid
    pub fn deploy_target(&self) -> Option<DeployTarget> {
        Some(DeployTarget {
            platform: self.platform()?,
            port: self.port.as_deref()?.parse().ok()?,
            destination: self.destination()?,
        })
    }
}

/// Host a page on `platform` uses to reach the development machine
pub fn livereload_host(platform: Platform, destination: Option<Destination>) -> &'static str {
    match (destination, platform) {
        (Some(Destination::Browser), _) => BROWSER_HOST,
        (_, Platform::Android) => ANDROID_EMULATOR_HOST,
        _ => LOOPBACK_HOST,
    }
}

/// Apply the `index.html` edits for `platform`
pub fn patch_index_html(html: &str, platform: Platform, env: &PatchEnv) -> String {
    let patched = add_body_classes(html, &platform_classes(platform));
    if !env.livereload_enabled() {
        return patched;
    }

    let host = livereload_host(platform, env.destination());
    let port = env.livereload_port();
    let patched = allow_livereload_in_csp(&patched, host, port);
    add_livereload_script(&patched, host, port)
}

/// Apply the `config.xml` edits for `platform`
pub fn patch_config_xml(xml: &str, platform: Platform, env: &PatchEnv) -> String {
    let mut patched = xml.to_string();

    // Only the platform being served is redirected to the dev server.
    if let Some(target) = env.deploy_target().filter(|t| t.platform == platform) {
        match server_url(livereload_host(platform, Some(target.destination)), target.port) {
            Ok(base) => {
                if let Ok(index) = base.join("index.html") {
                    patched = set_content_src(&patched, index.as_str());
                }
                patched = add_allow_navigation(&patched, &format!("{}*", base));
            }
            Err(e) => warn!("Skipping content source rewrite: {}", e),
        }
    }

    set_load_timeout(&patched)
}

fn server_url(host: &str, port: u16) -> Result<Url, url::ParseError> {
    Url::parse(&format!("http://{}:{}/", host, port))
}

/// Files the patcher edits for one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRoots {
    pub www: PathBuf,
    pub config_xml: Option<PathBuf>,
}

impl PlatformRoots {
    pub fn index_html(&self) -> PathBuf {
        self.www.join("index.html")
    }
}

/// Locate `platform`'s prepared assets under a Cordova project
pub fn platform_roots(cordova_dir: &Path, platform: Platform) -> PlatformRoots {
    let platforms = cordova_dir.join("platforms");
    match platform {
        Platform::Android => {
            let main = platforms.join("android").join("app").join("src").join("main");
            PlatformRoots {
                www: main.join("assets").join("www"),
                config_xml: Some(main.join("res").join("xml").join("config.xml")),
            }
        }
        Platform::Ios => {
            let ios = platforms.join("ios");
            PlatformRoots {
                www: ios.join("www"),
                config_xml: find_ios_config(&ios),
            }
        }
        Platform::Windows | Platform::Browser | Platform::Web => {
            let dir = platforms.join(platform.as_str());
            PlatformRoots {
                www: dir.join("www"),
                config_xml: Some(dir.join("config.xml")),
            }
        }
    }
}

/// iOS keeps `config.xml` in a directory named after the app
fn find_ios_config(ios_dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(ios_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("config.xml"))
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Which files were rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub platform: Platform,
    pub index_html: bool,
    pub config_xml: bool,
}

/// Patch one platform's files. Missing files are skipped.
pub fn patch_platform(cordova_dir: &Path, platform: Platform, env: &PatchEnv) -> Result<PatchReport, PatchError> {
    let roots = platform_roots(cordova_dir, platform);

    let index_html = rewrite(&roots.index_html(), |html| patch_index_html(html, platform, env))?;
    let config_xml = match &roots.config_xml {
        Some(path) => rewrite(path, |xml| patch_config_xml(xml, platform, env))?,
        None => false,
    };

    Ok(PatchReport {
        platform,
        index_html,
        config_xml,
    })
}

fn rewrite(path: &Path, patch: impl FnOnce(&str) -> String) -> Result<bool, PatchError> {
    if !path.is_file() {
        debug!("Nothing to patch at {}", path.display());
        return Ok(false);
    }

    let original = fs::read_to_string(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let patched = patch(&original);
    if patched == original {
        return Ok(false);
    }

    fs::write(path, patched).map_err(|source| PatchError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

/// Resolve the Cordova directory, preferring `cordovaDirectory`
pub fn cordova_dir(env: &PatchEnv, fallback: &Path) -> PathBuf {
    match env.cordova_directory.as_deref() {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => fallback.to_path_buf(),
    }
}

/// Patch the requested platform, or every installed one.
///
/// Failures are logged per platform and never abort the remaining ones.
pub fn patch_all(cordova_dir: &Path, env: &PatchEnv) -> Vec<PatchReport> {
    let platforms: Vec<Platform> = match env.platform().filter(Platform::is_hybrid) {
        Some(platform) => vec![platform],
        None => Platform::ALL
            .iter()
            .copied()
            .filter(|p| p.is_hybrid() && cordova_dir.join("platforms").join(p.as_str()).is_dir())
            .collect(),
    };

    let mut reports = Vec::new();
    for platform in platforms {
        match patch_platform(cordova_dir, platform, env) {
            Ok(report) => {
                info!(
                    "Patched {} (index.html: {}, config.xml: {})",
                    platform, report.index_html, report.config_xml
                );
                reports.push(report);
            }
            Err(e) => error!("Could not patch {}: {}", platform, e),
        }
    }
    reports
}
