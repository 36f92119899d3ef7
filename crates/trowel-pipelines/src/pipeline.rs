//! Pipeline context, tasks and run reports.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use crate::notify::Notifier;
use crate::paths::PathTable;
use crate::source::{self, SourceFile};
use crate::{fonts, images, pages, scripts, styles};

/// An asset category with its own pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Images,
    Fonts,
    Styles,
    Scripts,
    Pages,
}

impl Task {
    /// Every task, in the order a full build runs them.
    pub const ALL: [Task; 5] = [
        Task::Images,
        Task::Fonts,
        Task::Styles,
        Task::Scripts,
        Task::Pages,
    ];

    /// Command name of the task.
    pub fn name(&self) -> &'static str {
        match self {
            Task::Images => "images",
            Task::Fonts => "fonts",
            Task::Styles => "styles",
            Task::Scripts => "scripts",
            Task::Pages => "pages",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("Unknown task: {}", s))
    }
}

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// This many output files were written
    Written(usize),

    /// Every output was already up to date
    Skipped,

    /// The file could not be transformed
    Failed(String),
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Task that ran
    pub task: Task,

    /// Output files written
    pub written: usize,

    /// Sources skipped as up to date
    pub skipped: usize,

    /// Sources that failed to transform
    pub failed: usize,

    /// Total run time in milliseconds
    pub duration_ms: u64,
}

impl PipelineReport {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            written: 0,
            skipped: 0,
            failed: 0,
            duration_ms: 0,
        }
    }

    /// True when no file failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Errors that abort a pipeline run.
///
/// Per-file transformation failures are not errors: they are reported and
/// the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid source pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shared context for running pipelines against one project.
pub struct Pipelines {
    root: PathBuf,
    paths: PathTable,
    notifier: Arc<dyn Notifier>,
}

impl Pipelines {
    /// Create pipelines for the project at `root`.
    pub fn new(root: impl Into<PathBuf>, paths: PathTable, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            root: root.into(),
            paths,
            notifier,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    /// Resolve a path from the path table against the project root.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Expand a source pattern from the path table.
    pub fn sources(&self, pattern: &str) -> Result<Vec<SourceFile>, PipelineError> {
        source::expand(&self.root, pattern).map_err(|e| PipelineError::Pattern {
            pattern: pattern.to_string(),
            source: e,
        })
    }

    /// Run a single task over its whole batch.
    pub fn run(&self, task: Task) -> Result<PipelineReport, PipelineError> {
        let start = Instant::now();
        tracing::debug!("Running {}", task);

        let mut report = match task {
            Task::Images => images::run(self)?,
            Task::Fonts => fonts::run(self)?,
            Task::Styles => styles::run(self)?,
            Task::Scripts => scripts::run(self)?,
            Task::Pages => pages::run(self)?,
        };
        report.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "{}: {} written, {} skipped, {} failed in {}ms",
            task,
            report.written,
            report.skipped,
            report.failed,
            report.duration_ms
        );

        Ok(report)
    }

    /// Run every task once, in build order.
    pub fn run_all(&self) -> Result<Vec<PipelineReport>, PipelineError> {
        Task::ALL.into_iter().map(|task| self.run(task)).collect()
    }

    /// Fold a file outcome into the report, notifying on failure.
    pub(crate) fn record(&self, report: &mut PipelineReport, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Written(n) => report.written += n,
            FileOutcome::Skipped => report.skipped += 1,
            FileOutcome::Failed(message) => {
                report.failed += 1;
                self.notifier.transform_failed(report.task, &message);
            }
        }
    }
}

/// Write an output file, creating its directory first.
pub(crate) fn write_output(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(path, contents).map_err(|e| PipelineError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::RecordingNotifier;
    use std::collections::BTreeMap;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn scaffold(root: &Path) {
        write(root, "app/scss/style.scss", "$c: #333;\n.nav { a { color: $c; } }\n");
        write(root, "app/js/main.js", "function greet(name) { return 'hi ' + name; }\ngreet('x');\n");
        write(root, "app/components/header.html", "<header>Site</header>");
        write(root, "app/pages/index.html", "<body>@@header<main></main></body>");
        write(root, "app/images/src/logo.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(dir).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn parses_task_names() {
        assert_eq!("styles".parse::<Task>().unwrap(), Task::Styles);
        assert!("watch".parse::<Task>().is_err());
        assert_eq!(Task::Images.to_string(), "images");
    }

    #[test]
    fn runs_every_task_in_build_order() {
        let temp = tempdir().unwrap();
        scaffold(temp.path());

        let notifier = Arc::new(RecordingNotifier::new());
        let pipelines = Pipelines::new(temp.path(), PathTable::default(), notifier.clone());
        let reports = pipelines.run_all().unwrap();

        let order: Vec<Task> = reports.iter().map(|r| r.task).collect();
        assert_eq!(order, Task::ALL.to_vec());
        assert!(reports.iter().all(|r| r.is_clean()));
        assert!(notifier.reports.lock().unwrap().is_empty());

        assert!(temp.path().join("app/css/style.min.css").exists());
        assert!(temp.path().join("app/js/main.min.js").exists());
        assert!(temp.path().join("app/index.html").exists());
        assert!(temp.path().join("app/images/logo.svg").exists());
    }

    #[test]
    fn repeated_runs_produce_identical_trees() {
        let temp = tempdir().unwrap();
        scaffold(temp.path());

        let pipelines = Pipelines::new(
            temp.path(),
            PathTable::default(),
            Arc::new(RecordingNotifier::new()),
        );

        pipelines.run_all().unwrap();
        let first = snapshot(&temp.path().join("app"));

        pipelines.run_all().unwrap();
        let second = snapshot(&temp.path().join("app"));

        assert_eq!(first, second);
    }

    #[test]
    fn failing_task_does_not_stop_the_others() {
        let temp = tempdir().unwrap();
        scaffold(temp.path());
        write(temp.path(), "app/scss/style.scss", ".nav { color: ; ");

        let notifier = Arc::new(RecordingNotifier::new());
        let pipelines = Pipelines::new(temp.path(), PathTable::default(), notifier.clone());
        let reports = pipelines.run_all().unwrap();

        let styles = reports.iter().find(|r| r.task == Task::Styles).unwrap();
        assert_eq!(styles.failed, 1);
        assert_eq!(notifier.messages(Task::Styles).len(), 1);
        assert!(temp.path().join("app/index.html").exists());
    }

    #[test]
    fn unwritable_destination_aborts_the_run() {
        let temp = tempdir().unwrap();
        write(temp.path(), "app/scss/style.scss", ".nav { color: red; }\n");
        write(temp.path(), "app/css", "not a directory");

        let notifier = Arc::new(RecordingNotifier::new());
        let pipelines = Pipelines::new(temp.path(), PathTable::default(), notifier.clone());
        let result = pipelines.run(Task::Styles);

        match result {
            Err(PipelineError::Write { path, .. }) => assert!(path.ends_with("app/css")),
            other => panic!("Expected write error, got {:?}", other),
        }
        assert!(notifier.reports.lock().unwrap().is_empty());
    }
}
