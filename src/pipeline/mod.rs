//! Build and serve pipelines
//!
//! One [`Pipeline`] call owns its [`BuildContext`] from validation to the
//! last hook. `before_*` hooks finish before the engine starts and
//! `after_*` hooks only run once it reports success.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bundler::{BundleError, BundlerEngine, WebpackCli};
use crate::config::{Config, MergedConfig};
use crate::hooks::{HookError, HookName, HookRunner};
use crate::hybrid::CordovaRunner;
use crate::options::{Destination, ResolvedOptions};
use crate::server::{DevServer, DevServerHandle, DevServerOptions, SourceWatcher, WatchFilter};
use crate::utils::relative_path;
use crate::webpack::{
    apply_transform, base_config, compose, reorganize_type_definitions, BuildContext, CommandTransform, TransformError,
    WebpackTransform,
};

/// Debounce window for source changes while serving
const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("webpack transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("{0}")]
    Unsupported(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// A running serve invocation
pub struct ServeSession {
    pub context: BuildContext,
    pub merged: MergedConfig,
    pub server: DevServerHandle,
}

pub struct Pipeline {
    config: Arc<Config>,
    hooks: HookRunner,
    bundler: Arc<dyn BundlerEngine>,
    transform: Option<Arc<dyn WebpackTransform>>,
    cordova: Option<CordovaRunner>,
}

impl Pipeline {
    /// Wire the pipeline from `config`: shell hooks, the webpack CLI, the
    /// optional transform command and Cordova.
    pub fn new(config: Config) -> Self {
        let root = config.root.clone();
        let hooks = HookRunner::from_config(&config.hooks, root.clone());
        let bundler: Arc<dyn BundlerEngine> = Arc::new(WebpackCli::new(config.webpack.command.clone(), root.clone()));
        let transform = config
            .webpack
            .transform
            .as_ref()
            .map(|command| Arc::new(CommandTransform::new(command.clone(), root.clone())) as Arc<dyn WebpackTransform>);
        let cordova = Some(CordovaRunner::new(config.cordova.command.clone(), config.hybrid_dir()));

        Self {
            config: Arc::new(config),
            hooks,
            bundler,
            transform,
            cordova,
        }
    }

    pub fn with_hooks(mut self, hooks: HookRunner) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_bundler(mut self, bundler: Arc<dyn BundlerEngine>) -> Self {
        self.bundler = bundler;
        self
    }

    pub fn with_transform(mut self, transform: Option<Arc<dyn WebpackTransform>>) -> Self {
        self.transform = transform;
        self
    }

    /// Replace the Cordova runner; `None` skips Cordova entirely.
    pub fn with_cordova(mut self, cordova: Option<CordovaRunner>) -> Self {
        self.cordova = cordova;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn context(&self, options: ResolvedOptions) -> (BuildContext, MergedConfig) {
        let merged = self.config.merge_with(&options);
        let ctx = BuildContext::new(&self.config, options, &merged);
        (ctx, merged)
    }

    /// Build once for `options.platform`
    pub async fn build(&self, options: ResolvedOptions) -> Result<BuildContext> {
        let (mut ctx, _) = self.context(options);
        self.compile(&mut ctx, false).await?;
        Ok(ctx)
    }

    /// One build pass. `serving` hands Cordova the deploy metadata for the
    /// dev server; a plain build prepares without it.
    async fn compile(&self, ctx: &mut BuildContext, serving: bool) -> Result<()> {
        self.hooks.run(HookName::BeforeBuild, ctx).await?;

        let webpack = compose(ctx, &self.config)?;
        let webpack = apply_transform(self.transform.as_deref(), ctx, webpack).await?;
        let stats = self.bundler.compile(&webpack, ctx).await?;
        info!(
            "Compiled {} asset(s) in {}ms",
            stats.assets.len(),
            stats.duration.as_millis()
        );
        ctx.compiler = Some(stats);

        if ctx.typescript {
            match reorganize_type_definitions(&ctx.staging_path) {
                Ok(0) => {}
                Ok(moved) => debug!("Moved {} type definition(s)", moved),
                Err(e) => warn!("Could not reorganize type definitions: {:#}", e),
            }
        }

        if ctx.platform.is_hybrid() {
            if let Some(cordova) = &self.cordova {
                cordova.prepare(&ctx.options, serving.then_some(ctx.port)).await?;
            }
        }

        self.hooks.run(HookName::AfterBuild, ctx).await?;
        Ok(())
    }

    /// Build (unless `skip_build`), start the dev server and deploy.
    pub async fn serve(&self, options: ResolvedOptions, skip_build: bool) -> Result<ServeSession> {
        let (mut ctx, merged) = self.context(options);

        if base_config(&ctx, &self.config)?.dev_server().is_none() {
            return Err(PipelineError::Unsupported(format!(
                "{} builds cannot be served; serve a debug build instead",
                ctx.build_type.as_str()
            )));
        }

        if !skip_build {
            self.compile(&mut ctx, true).await?;
        }

        self.hooks.run(HookName::BeforeServe, &mut ctx).await?;

        let server = DevServer::new(DevServerOptions {
            host: ctx.host.clone(),
            port: ctx.port,
            root: ctx.staging_path.clone(),
            livereload: ctx.livereload(),
            livereload_port: ctx.livereload_port,
            open: ctx.open,
        })
        .start()
        .await?;

        if ctx.platform.is_hybrid() && ctx.options.destination != Destination::ServerOnly {
            if let Some(cordova) = &self.cordova {
                cordova.deploy(&ctx.options, ctx.port).await?;
            }
        }

        self.hooks.run(HookName::AfterServe, &mut ctx).await?;

        Ok(ServeSession {
            context: ctx,
            merged,
            server,
        })
    }

    /// Rebuild on source changes until interrupted, then stop the server.
    pub async fn watch(&self, session: ServeSession) -> Result<()> {
        let ServeSession {
            mut context,
            merged,
            server,
        } = session;

        let patterns = merged.watch_patterns();
        let mut watcher = if patterns.is_empty() {
            None
        } else {
            let filter = WatchFilter::new(self.config.root.clone(), &patterns)?;
            Some(SourceWatcher::start(filter, WATCH_DEBOUNCE)?)
        };

        loop {
            let changed = tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = next_change(&mut watcher) => changed,
            };
            let Some(changed) = changed else { break };

            let first = changed.first().map(|p| self.relative(p));
            info!("{} file(s) changed, rebuilding", changed.len());

            match self.compile(&mut context, true).await {
                Ok(()) if context.livereload() => server.reload(first),
                Ok(()) => {}
                Err(e) => {
                    error!("Rebuild failed: {}", e);
                    server.report_error(e.to_string());
                }
            }
        }

        server.shutdown().await;
        Ok(())
    }

    fn relative(&self, path: &Path) -> String {
        relative_path(&self.config.root, path).unwrap_or_else(|| path.display().to_string())
    }
}

async fn next_change(watcher: &mut Option<SourceWatcher>) -> Option<Vec<PathBuf>> {
    match watcher {
        Some(watcher) => watcher.changed().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::bundler::CompileStats;
    use crate::hooks::Hook;
    use crate::options::{validate, RawOptions};
    use crate::webpack::{FnTransform, WebpackConfig};

    type Log = Arc<Mutex<Vec<String>>>;

    struct FakeBundler {
        log: Log,
        fail: bool,
    }

    #[async_trait]
    impl BundlerEngine for FakeBundler {
        async fn compile(
            &self,
            config: &WebpackConfig,
            _ctx: &BuildContext,
        ) -> std::result::Result<CompileStats, BundleError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("compile:{}", config.mode().unwrap_or("?")));
            if self.fail {
                return Err(BundleError::Compilation(vec!["Module not found".into()]));
            }
            Ok(CompileStats::default())
        }
    }

    struct RecordingHook {
        log: Log,
    }

    #[async_trait]
    impl Hook for RecordingHook {
        fn name(&self) -> &str {
            "recording"
        }

        async fn run(&self, hook: HookName, ctx: &mut BuildContext) -> std::result::Result<(), HookError> {
            self.log.lock().unwrap().push(hook.to_string());
            if hook == HookName::BeforeBuild {
                ctx.options.user_options = Some("from-hook".into());
            }
            Ok(())
        }
    }

    fn project() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.html"), "<html><body></body></html>").unwrap();
        let config = Config::default_config(dir.path().to_path_buf());
        (dir, config)
    }

    fn options(config: &Config, value: Value) -> ResolvedOptions {
        let raw: RawOptions = match value {
            Value::Object(map) => map,
            _ => RawOptions::new(),
        };
        validate(&raw, &config.defaults).unwrap()
    }

    fn pipeline(config: Config, log: &Log, fail: bool) -> Pipeline {
        let mut hooks = HookRunner::new();
        for name in [
            HookName::BeforeBuild,
            HookName::AfterBuild,
            HookName::BeforeServe,
            HookName::AfterServe,
        ] {
            hooks.register(name, Arc::new(RecordingHook { log: log.clone() }));
        }

        Pipeline::new(config)
            .with_hooks(hooks)
            .with_bundler(Arc::new(FakeBundler {
                log: log.clone(),
                fail,
            }))
            .with_cordova(None)
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_build_runs_hooks_around_compile() {
        let (_dir, config) = project();
        let opts = options(&config, json!({}));
        let log = Log::default();

        let ctx = pipeline(config, &log, false).build(opts).await.unwrap();

        assert_eq!(entries(&log), vec!["before_build", "compile:development", "after_build"]);
        assert!(ctx.compiler.is_some());
        assert_eq!(ctx.options.user_options.as_deref(), Some("from-hook"));
    }

    #[tokio::test]
    async fn test_release_build_uses_production_overlay() {
        let (_dir, config) = project();
        let opts = options(&config, json!({ "release": true }));
        let log = Log::default();

        pipeline(config, &log, false).build(opts).await.unwrap();
        assert!(entries(&log).contains(&"compile:production".to_string()));
    }

    #[tokio::test]
    async fn test_failed_compile_skips_after_hook() {
        let (_dir, config) = project();
        let opts = options(&config, json!({}));
        let log = Log::default();

        let err = pipeline(config, &log, true).build(opts).await.unwrap_err();

        assert!(matches!(err, PipelineError::Bundle(BundleError::Compilation(_))));
        assert_eq!(entries(&log), vec!["before_build", "compile:development"]);
    }

    #[tokio::test]
    async fn test_transform_replaces_config() {
        let (_dir, config) = project();
        let opts = options(&config, json!({}));
        let log = Log::default();
        let transform = FnTransform::new(|_ctx: &mut BuildContext, config: WebpackConfig| {
            Ok(Some(config.merge(json!({ "mode": "none" }))))
        });

        pipeline(config, &log, false)
            .with_transform(Some(Arc::new(transform)))
            .build(opts)
            .await
            .unwrap();
        assert!(entries(&log).contains(&"compile:none".to_string()));
    }

    #[tokio::test]
    async fn test_release_serve_is_unsupported() {
        let (_dir, config) = project();
        let opts = options(&config, json!({ "release": true }));
        let log = Log::default();

        let err = match pipeline(config, &log, false).serve(opts, false).await {
            Err(e) => e,
            Ok(_) => panic!("release serve should fail"),
        };

        assert!(matches!(err, PipelineError::Unsupported(_)));
        assert!(err.to_string().contains("cannot be served"));
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_release_serve_without_template_is_unsupported() {
        let (dir, config) = project();
        std::fs::remove_file(dir.path().join("src/index.html")).unwrap();
        let opts = options(&config, json!({ "release": true }));
        let log = Log::default();

        let err = match pipeline(config, &log, false).serve(opts, false).await {
            Err(e) => e,
            Ok(_) => panic!("release serve should fail"),
        };
        assert!(matches!(err, PipelineError::Unsupported(_)));
    }

    /// Cordova stand-in that records the environment `prepare` ran with
    #[cfg(unix)]
    fn env_recorder(config: &Config) -> CordovaRunner {
        std::fs::create_dir_all(config.hybrid_dir()).unwrap();
        CordovaRunner::new("env > env.txt ;:", config.hybrid_dir())
    }

    #[cfg(unix)]
    fn recorded_env(config_root: &Path) -> Vec<String> {
        std::fs::read_to_string(config_root.join("hybrid/env.txt"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hybrid_build_prepares_without_deploy_metadata() {
        let (dir, config) = project();
        let opts = options(&config, json!({ "platform": "android" }));
        let cordova = env_recorder(&config);
        let log = Log::default();

        pipeline(config, &log, false)
            .with_cordova(Some(cordova))
            .build(opts)
            .await
            .unwrap();

        let env = recorded_env(dir.path());
        assert!(env.contains(&"livereload=false".to_string()));
        assert!(!env.iter().any(|line| line.starts_with("destination=")));
        assert!(!env.iter().any(|line| line.starts_with("port=")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hybrid_serve_prepares_with_deploy_metadata() {
        let (dir, config) = project();
        let opts = options(
            &config,
            json!({ "platform": "android", "destination": "server-only", "port": 0, "livereloadPort": 0 }),
        );
        let cordova = env_recorder(&config);
        let log = Log::default();

        let session = pipeline(config, &log, false)
            .with_cordova(Some(cordova))
            .serve(opts, false)
            .await
            .unwrap();
        session.server.shutdown().await;

        let env = recorded_env(dir.path());
        assert!(env.contains(&"livereload=true".to_string()));
        assert!(env.contains(&"platform=android".to_string()));
        assert!(env.contains(&"destination=server-only".to_string()));
    }

    #[tokio::test]
    async fn test_serve_order() {
        let (_dir, config) = project();
        let opts = options(
            &config,
            json!({ "port": 0, "livereloadPort": 0, "open": false }),
        );
        let log = Log::default();

        let session = pipeline(config, &log, false).serve(opts, false).await.unwrap();
        session.server.shutdown().await;

        assert_eq!(
            entries(&log),
            vec![
                "before_build",
                "compile:development",
                "after_build",
                "before_serve",
                "after_serve"
            ]
        );
    }

    #[tokio::test]
    async fn test_serve_without_build() {
        let (_dir, config) = project();
        let opts = options(
            &config,
            json!({ "port": 0, "livereload": false, "open": false }),
        );
        let log = Log::default();

        let session = pipeline(config, &log, false).serve(opts, true).await.unwrap();
        assert!(session.server.livereload_addr().is_none());
        session.server.shutdown().await;

        assert_eq!(entries(&log), vec!["before_serve", "after_serve"]);
    }
}
