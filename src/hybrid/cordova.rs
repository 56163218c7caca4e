//! Cordova invocation for hybrid builds and deploys

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::options::{Destination, ResolvedOptions};
use crate::utils::run_shell;

/// Environment the `after_prepare` patcher reads while serving
pub fn deploy_env(options: &ResolvedOptions, port: u16, cordova_dir: &Path) -> Vec<(String, String)> {
    vec![
        ("livereload".to_string(), options.livereload.to_string()),
        ("livereloadPort".to_string(), options.livereload_port.to_string()),
        ("platform".to_string(), options.platform.to_string()),
        ("port".to_string(), port.to_string()),
        ("destination".to_string(), options.destination.to_string()),
        ("cordovaDirectory".to_string(), cordova_dir.display().to_string()),
    ]
}

/// Environment for a `prepare` outside of serving. Without a deploy target
/// the patcher leaves the content source alone and livereload off.
pub fn build_env(options: &ResolvedOptions, cordova_dir: &Path) -> Vec<(String, String)> {
    vec![
        ("livereload".to_string(), "false".to_string()),
        ("livereloadPort".to_string(), options.livereload_port.to_string()),
        ("cordovaDirectory".to_string(), cordova_dir.display().to_string()),
    ]
}

fn quote(arg: &str) -> String {
    if arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// Runs the Cordova CLI inside the hybrid project
#[derive(Debug, Clone)]
pub struct CordovaRunner {
    command: String,
    hybrid_dir: PathBuf,
}

impl CordovaRunner {
    pub fn new(command: impl Into<String>, hybrid_dir: PathBuf) -> Self {
        Self {
            command: command.into(),
            hybrid_dir,
        }
    }

    pub fn prepare_args(&self, options: &ResolvedOptions) -> Vec<String> {
        vec!["prepare".to_string(), options.platform.to_string()]
    }

    /// Arguments for deploying to `options.destination`.
    /// `None` for server-only, which never starts Cordova.
    pub fn deploy_args(&self, options: &ResolvedOptions) -> Option<Vec<String>> {
        let platform = options.platform.to_string();
        let mut args: Vec<String> = match options.destination {
            Destination::ServerOnly => return None,
            Destination::Emulator => vec!["emulate".into(), platform],
            Destination::Device => vec!["run".into(), platform, "--device".into()],
            Destination::Browser => {
                let mut args = vec!["run".to_string(), "browser".to_string()];
                if let Some(target) = &options.target {
                    args.push(format!("--target={}", target));
                }
                args
            }
        };

        args.push(if options.build_type.is_release() {
            "--release".into()
        } else {
            "--debug".into()
        });

        // The path is relative to the hybrid directory, where Cordova runs.
        if self.hybrid_dir.join(&options.build_config).is_file() {
            args.push(format!("--buildConfig={}", options.build_config.display()));
        }

        Some(args)
    }

    /// `serve_port` is the dev server port when preparing for a serve,
    /// `None` for a plain build.
    pub async fn prepare(&self, options: &ResolvedOptions, serve_port: Option<u16>) -> Result<()> {
        let args = self.prepare_args(options);
        let env = match serve_port {
            Some(port) => deploy_env(options, port, &self.hybrid_dir),
            None => build_env(options, &self.hybrid_dir),
        };
        self.run(&args, options, &env).await
    }

    pub async fn deploy(&self, options: &ResolvedOptions, port: u16) -> Result<()> {
        match self.deploy_args(options) {
            Some(args) => {
                let env = deploy_env(options, port, &self.hybrid_dir);
                self.run(&args, options, &env).await
            }
            None => {
                debug!("Server-only destination, skipping Cordova deploy");
                Ok(())
            }
        }
    }

    fn command_line(&self, args: &[String], options: &ResolvedOptions) -> String {
        let mut line = self.command.clone();
        for arg in args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        if let Some(platform_options) = options.platform_options.as_deref().filter(|o| !o.trim().is_empty()) {
            line.push_str(" -- ");
            line.push_str(platform_options);
        }
        line
    }

    async fn run(&self, args: &[String], options: &ResolvedOptions, env: &[(String, String)]) -> Result<()> {
        let line = self.command_line(args, options);
        info!("Running {}", line);

        let output = run_shell(&line, &self.hybrid_dir, None, env).await?;
        for text in [&output.stdout, &output.stderr] {
            if !text.trim().is_empty() {
                debug!("{}", text.trim());
            }
        }

        if !output.success {
            bail!(
                "`{}` failed with exit code {:?}: {}",
                line,
                output.code,
                output.stderr.trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultsConfig;
    use crate::options::validate;
    use serde_json::{json, Value};

    fn options(value: Value) -> ResolvedOptions {
        let Value::Object(raw) = value else { unreachable!() };
        validate(&raw, &DefaultsConfig::default()).unwrap()
    }

    fn runner(dir: &Path) -> CordovaRunner {
        CordovaRunner::new("cordova", dir.to_path_buf())
    }

    #[test]
    fn test_emulator_deploy() {
        let dir = tempfile::tempdir().unwrap();
        let args = runner(dir.path()).deploy_args(&options(json!({ "platform": "android" })));
        assert_eq!(args, Some(vec!["emulate".into(), "android".into(), "--debug".into()]));
    }

    #[test]
    fn test_device_release_deploy() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(json!({ "platform": "ios", "destination": "device", "release": true }));
        assert_eq!(
            runner(dir.path()).deploy_args(&opts),
            Some(vec!["run".into(), "ios".into(), "--device".into(), "--release".into()])
        );
    }

    #[test]
    fn test_browser_deploy_with_target() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(json!({ "platform": "android", "destination": "browser:firefox" }));
        assert_eq!(
            runner(dir.path()).deploy_args(&opts),
            Some(vec![
                "run".into(),
                "browser".into(),
                "--target=firefox".into(),
                "--debug".into()
            ])
        );
    }

    #[test]
    fn test_server_only_has_no_deploy() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(json!({ "platform": "android", "destination": "server-only" }));
        assert_eq!(runner(dir.path()).deploy_args(&opts), None);
    }

    #[test]
    fn test_existing_build_config_is_passed() {
        let dir = tempfile::tempdir().unwrap();
        let hybrid = dir.path().join("hybrid");
        std::fs::create_dir_all(&hybrid).unwrap();
        std::fs::write(dir.path().join("build.json"), "{}").unwrap();

        let args = runner(&hybrid)
            .deploy_args(&options(json!({ "platform": "android" })))
            .unwrap();
        assert_eq!(args.last().map(String::as_str), Some("--buildConfig=../build.json"));
    }

    #[test]
    fn test_platform_options_follow_separator() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let opts = options(json!({ "platform": "android", "platformOptions": "--gradleArg=--offline" }));

        let line = runner.command_line(&runner.prepare_args(&opts), &opts);
        assert_eq!(line, "cordova prepare android -- --gradleArg=--offline");
    }

    #[test]
    fn test_deploy_env_carries_livereload_metadata() {
        let opts = options(json!({ "platform": "android", "livereloadPort": 35800 }));
        let env = deploy_env(&opts, 8000, Path::new("hybrid"));
        let get = |key: &str| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("livereload"), Some("true"));
        assert_eq!(get("livereloadPort"), Some("35800"));
        assert_eq!(get("port"), Some("8000"));
        assert_eq!(get("destination"), Some("emulator"));
        assert_eq!(get("cordovaDirectory"), Some("hybrid"));
    }

    #[test]
    fn test_build_env_has_no_deploy_target() {
        let opts = options(json!({ "platform": "android" }));
        let env = build_env(&opts, Path::new("hybrid"));
        let get = |key: &str| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("livereload"), Some("false"));
        assert_eq!(get("platform"), None);
        assert_eq!(get("port"), None);
        assert_eq!(get("destination"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CordovaRunner::new("echo nope >&2; exit 3 ;:", dir.path().to_path_buf());
        let err = runner
            .prepare(&options(json!({ "platform": "android" })), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
