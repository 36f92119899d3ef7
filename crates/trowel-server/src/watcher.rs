//! Filesystem watching.
//!
//! Events are forwarded as they arrive. Bursts are not coalesced: every
//! change reaches the orchestrator.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File was created or modified
    Changed(PathBuf),

    /// File was deleted
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Changed(path) | WatchEvent::Removed(path) => path,
        }
    }
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given directories.
    ///
    /// Directories that do not exist yet are skipped. Returns the watcher and
    /// a channel to receive events; events stop when the watcher is dropped.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(256);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            match res {
                Ok(event) => {
                    let _ = sync_tx.send(event);
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                tracing::debug!("Watching {}", path.display());
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            } else {
                tracing::debug!("Not watching missing directory {}", path.display());
            }
        }

        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                for path in event.paths {
                    if let Some(e) = classify_event(path, &event.kind) {
                        if async_tx.blocking_send(e).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Resolve watch roots to directories that exist now.
///
/// A missing root is replaced by its nearest existing ancestor inside
/// `project`, so directories created later in the session are still seen.
/// Roots nested inside another root are dropped.
pub fn existing_roots(roots: &[PathBuf], project: &Path) -> Vec<PathBuf> {
    let mut resolved: Vec<PathBuf> = roots
        .iter()
        .map(|root| {
            root.ancestors()
                .take_while(|dir| dir.starts_with(project))
                .find(|dir| dir.exists())
                .unwrap_or(project)
                .to_path_buf()
        })
        .collect();
    resolved.sort();
    resolved.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for dir in resolved {
        if !roots.iter().any(|r| dir.starts_with(r)) {
            roots.push(dir);
        }
    }
    roots
}

fn classify_event(path: PathBuf, kind: &EventKind) -> Option<WatchEvent> {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(WatchEvent::Changed(path)),
        EventKind::Remove(_) => Some(WatchEvent::Removed(path)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn classifies_event_kinds() {
        let path = PathBuf::from("app/scss/style.scss");

        assert_eq!(
            classify_event(path.clone(), &EventKind::Create(CreateKind::File)),
            Some(WatchEvent::Changed(path.clone()))
        );
        assert_eq!(
            classify_event(path.clone(), &EventKind::Modify(ModifyKind::Any)),
            Some(WatchEvent::Changed(path.clone()))
        );
        assert_eq!(
            classify_event(path.clone(), &EventKind::Remove(RemoveKind::File)),
            Some(WatchEvent::Removed(path.clone()))
        );
        assert_eq!(
            classify_event(path, &EventKind::Access(AccessKind::Any)),
            None
        );
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("style.scss");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "body { color: red; }").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        let event = event.unwrap().expect("channel should not be closed");
        assert!(event.path().ends_with("style.scss"));
    }

    #[test]
    fn missing_roots_fall_back_to_existing_ancestors() {
        let temp = tempdir().unwrap();
        let app = temp.path().join("app");
        fs::create_dir_all(app.join("scss")).unwrap();
        fs::create_dir_all(app.join("js")).unwrap();

        let roots = existing_roots(&[app.join("js"), app.join("scss")], temp.path());
        assert_eq!(roots, vec![app.join("js"), app.join("scss")]);

        let roots = existing_roots(&[app.join("images/src"), app.join("scss")], temp.path());
        assert_eq!(roots, vec![app.clone()]);

        let roots = existing_roots(&[temp.path().join("site/fonts")], temp.path());
        assert_eq!(roots, vec![temp.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn sees_directories_created_after_start() {
        let temp = tempdir().unwrap();
        let app = temp.path().join("app");
        fs::create_dir_all(&app).unwrap();

        let roots = existing_roots(&[app.join("images/src")], temp.path());
        let (watcher, mut rx) = FileWatcher::new(&roots).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::create_dir_all(app.join("images/src")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(app.join("images/src/logo.svg"), "<svg/>").unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(3), async {
            while let Some(event) = rx.recv().await {
                if event.path().ends_with("images/src/logo.svg") {
                    return true;
                }
            }
            false
        })
        .await;
        drop(watcher);

        assert_eq!(seen, Ok(true), "no event for the new directory's file");
    }

    #[test]
    fn missing_directories_are_skipped() {
        let temp = tempdir().unwrap();
        let result = FileWatcher::new(&[temp.path().join("absent")]);
        assert!(result.is_ok());
    }
}
