//! Watch subscriptions and the dispatch of change events to pipelines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobSet, GlobSetBuilder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use trowel_pipelines::source::{self, slash_path};
use trowel_pipelines::{PathTable, Pipelines, Task};

use crate::reload::{ReloadHub, ReloadMessage};
use crate::watcher::WatchEvent;

/// What to tell connected browsers once a triggered run succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterRun {
    Nothing,
    Reload,
    InjectCss,
}

impl AfterRun {
    fn message(self) -> Option<ReloadMessage> {
        match self {
            AfterRun::Nothing => None,
            AfterRun::Reload => Some(ReloadMessage::Reload),
            AfterRun::InjectCss => Some(ReloadMessage::Css),
        }
    }
}

/// A standing rule binding source patterns to a pipeline run.
#[derive(Debug, Clone)]
pub struct Subscription {
    task: Task,
    patterns: Vec<String>,
    matcher: GlobSet,
    after: AfterRun,
}

impl Subscription {
    pub fn new(task: Task, patterns: Vec<String>, after: AfterRun) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(source::glob(pattern)?);
        }

        Ok(Self {
            task,
            matcher: builder.build()?,
            patterns,
            after,
        })
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn after(&self) -> AfterRun {
        self.after
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a slash-separated path relative to the project root matches.
    pub fn matches(&self, relative: &str) -> bool {
        self.matcher.is_match(relative)
    }
}

/// Every subscription of a development session.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard subscriptions for a path table.
    pub fn from_paths(paths: &PathTable) -> Result<Self, globset::Error> {
        let mut registry = Self::new();

        registry.subscribe(Task::Styles, vec![paths.styles_watch.clone()], AfterRun::InjectCss)?;
        registry.subscribe(
            Task::Pages,
            vec![paths.components_watch(), paths.pages_src.clone()],
            AfterRun::Reload,
        )?;
        registry.subscribe(Task::Scripts, paths.scripts_src.clone(), AfterRun::Reload)?;
        registry.subscribe(Task::Images, vec![paths.images_src.clone()], AfterRun::Reload)?;
        registry.subscribe(
            Task::Fonts,
            vec![paths.fonts_src.clone(), paths.fonts_woff2_src.clone()],
            AfterRun::Nothing,
        )?;

        Ok(registry)
    }

    pub fn subscribe(
        &mut self,
        task: Task,
        patterns: Vec<String>,
        after: AfterRun,
    ) -> Result<(), globset::Error> {
        self.subscriptions
            .push(Subscription::new(task, patterns, after)?);
        Ok(())
    }

    /// Subscriptions whose patterns match a project-relative path.
    pub fn matching(&self, relative: &str) -> Vec<&Subscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.matches(relative))
            .collect()
    }

    /// Directories to watch so every pattern is covered, without nesting.
    pub fn watch_roots(&self, root: &Path) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = self
            .subscriptions
            .iter()
            .flat_map(|s| s.patterns.iter())
            .map(|p| source::glob_base(p))
            .collect();
        bases.sort();
        bases.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for base in bases {
            if !roots.iter().any(|r| base.starts_with(r)) {
                roots.push(base);
            }
        }

        roots.into_iter().map(|r| root.join(r)).collect()
    }
}

/// Routes change events to the pipelines that own them.
pub struct Orchestrator {
    pipelines: Arc<Pipelines>,
    registry: SubscriptionRegistry,
    hub: ReloadHub,
    canonical_root: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(pipelines: Arc<Pipelines>, registry: SubscriptionRegistry, hub: ReloadHub) -> Self {
        let canonical_root = pipelines.root().canonicalize().ok();
        Self {
            pipelines,
            registry,
            hub,
            canonical_root,
        }
    }

    /// Consume watch events until the channel closes.
    pub async fn run(self, mut events: mpsc::Receiver<WatchEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }
        tracing::debug!("Watch channel closed");
    }

    /// Start a run of every task subscribed to the event's path.
    ///
    /// Removals rerun the task like changes do, so outputs built from a
    /// deleted file are refreshed or the break is reported. Runs are not
    /// coalesced: a second event for the same task starts a second run even
    /// while the first is still going.
    pub fn dispatch(&self, event: &WatchEvent) -> Vec<JoinHandle<()>> {
        let path = event.path();

        let Some(relative) = self.relative(path) else {
            tracing::debug!("Ignoring change outside the project: {}", path.display());
            return Vec::new();
        };

        self.registry
            .matching(&relative)
            .into_iter()
            .map(|subscription| {
                tracing::info!("{} changed, running {}", relative, subscription.task());
                self.spawn(subscription.task(), subscription.after())
            })
            .collect()
    }

    fn relative(&self, path: &Path) -> Option<String> {
        self.canonical_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .or_else(|| path.strip_prefix(self.pipelines.root()).ok())
            .map(slash_path)
    }

    fn spawn(&self, task: Task, after: AfterRun) -> JoinHandle<()> {
        let pipelines = Arc::clone(&self.pipelines);
        let hub = self.hub.clone();

        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || pipelines.run(task)).await {
                Ok(Ok(report)) if report.is_clean() => {
                    if let Some(msg) = after.message() {
                        hub.send(msg);
                    }
                }
                Ok(Ok(report)) => {
                    tracing::debug!("{} had {} failures, not refreshing", task, report.failed);
                }
                Ok(Err(e)) => {
                    tracing::error!("Error {}: {}", task, e);
                    hub.send(ReloadMessage::Error {
                        task: task.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => tracing::error!("{} run did not complete: {}", task, e),
            }
        })
    }
}
