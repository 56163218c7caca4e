//! Source watching for serve mode

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Matches changed paths, relative to the project root, against the
/// `watch` sub-task's file patterns
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    set: GlobSet,
}

impl WatchFilter {
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).with_context(|| format!("Invalid watch pattern '{}'", pattern))?;
            builder.add(glob);
        }
        Ok(Self {
            root: root.into(),
            set: builder.build().context("Failed to build watch patterns")?,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.set.is_match(relative)
    }
}

/// Debounced watcher over the project root.
///
/// Dropping it stops watching.
pub struct SourceWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    rx: mpsc::UnboundedReceiver<Vec<PathBuf>>,
}

impl SourceWatcher {
    pub fn start(filter: WatchFilter, debounce: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = filter.root.clone();

        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let mut changed: Vec<PathBuf> = events
                    .into_iter()
                    .map(|event| event.path)
                    .filter(|path| filter.matches(path))
                    .collect();
                changed.sort();
                changed.dedup();
                if !changed.is_empty() {
                    let _ = tx.send(changed);
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        })
        .context("Failed to create file watcher")?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        debug!("Watching {}", root.display());

        Ok(Self {
            _debouncer: debouncer,
            rx,
        })
    }

    /// Next batch of changed paths
    pub async fn changed(&mut self) -> Option<Vec<PathBuf>> {
        self.rx.recv().await
    }
}
