//! Directory watcher producing resource notifications.

use crate::core::{Kind, ResourceNotification, ResourceNotificationDispatcher};
use crate::error::{NotifyError, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

/// Watches a resource store directory and announces changes.
///
/// Uses the `notify` crate to watch the directory recursively. Events are
/// coalesced per path for `debounce` after the first one arrives, then each
/// path is announced once through the dispatcher. Paths are relative to the
/// watched root.
///
/// Must be started from within a tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use cluster_notify::prelude::*;
/// use cluster_notify::watch::ResourceWatcher;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<()> {
/// let dispatcher = Arc::new(ClusterDispatcher::builder().build()?);
/// let debounce = dispatcher.settings().watch_debounce();
/// let _watcher = ResourceWatcher::start("/var/lib/data_dir", debounce, dispatcher)?;
/// # Ok(())
/// # }
/// ```
pub struct ResourceWatcher {
    root: PathBuf,
    debounce: Duration,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ResourceWatcher {
    /// Start watching `root`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::WatchError`] if there is no tokio runtime, the
    /// directory cannot be resolved, or the OS watcher cannot be created.
    pub fn start(
        root: impl AsRef<Path>,
        debounce: Duration,
        dispatcher: Arc<dyn ResourceNotificationDispatcher>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| NotifyError::WatchError(format!("No tokio runtime: {}", e)))?;

        let root = root.as_ref().canonicalize().map_err(|e| {
            NotifyError::WatchError(format!(
                "Failed to resolve {}: {}",
                root.as_ref().display(),
                e
            ))
        })?;

        let (tx, rx) = mpsc::unbounded_channel::<(String, Kind)>();

        let event_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "Filesystem watcher error");
                    return;
                }
            };
            let Some(kind) = classify(&event.kind) else {
                return;
            };
            for path in &event.paths {
                if let Some(relative) = relative_path(&event_root, path) {
                    let _ = tx.send((relative, kind));
                }
            }
        })
        .map_err(|e| NotifyError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| NotifyError::WatchError(format!("Failed to watch path: {}", e)))?;

        let task = runtime.spawn(run(rx, debounce, dispatcher));
        debug!(root = %root.display(), ?debounce, "Watching resource store");

        Ok(Self {
            root,
            debounce,
            _watcher: watcher,
            task,
        })
    }

    /// Canonical directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Coalescing window.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce
    }
}

impl Drop for ResourceWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<(String, Kind)>,
    debounce: Duration,
    dispatcher: Arc<dyn ResourceNotificationDispatcher>,
) {
    let mut pending = BTreeMap::new();

    while let Some((path, kind)) = rx.recv().await {
        coalesce(&mut pending, path, kind);
        let deadline = Instant::now() + debounce;

        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some((path, kind)) => coalesce(&mut pending, path, kind),
                    None => {
                        flush(&mut pending, dispatcher.as_ref());
                        return;
                    }
                },
                _ = sleep_until(deadline) => break,
            }
        }

        flush(&mut pending, dispatcher.as_ref());
    }
}

fn flush(pending: &mut BTreeMap<String, Kind>, dispatcher: &dyn ResourceNotificationDispatcher) {
    for (path, kind) in std::mem::take(pending) {
        dispatcher.changed(&ResourceNotification::new(path, kind));
    }
}

fn coalesce(pending: &mut BTreeMap<String, Kind>, path: String, kind: Kind) {
    match pending.get(&path).copied() {
        None => {
            pending.insert(path, kind);
        }
        Some(previous) => match merge(previous, kind) {
            Some(merged) => {
                pending.insert(path, merged);
            }
            None => {
                pending.remove(&path);
            }
        },
    }
}

/// Combine two changes to the same path seen within one window.
///
/// `None` means the path came and went, so nothing is announced.
fn merge(previous: Kind, next: Kind) -> Option<Kind> {
    match (previous, next) {
        (Kind::EntryCreate, Kind::EntryModify) => Some(Kind::EntryCreate),
        (Kind::EntryCreate, Kind::EntryDelete) => None,
        (Kind::EntryDelete, Kind::EntryCreate) => Some(Kind::EntryModify),
        (_, next) => Some(next),
    }
}

fn classify(kind: &EventKind) -> Option<Kind> {
    match kind {
        EventKind::Create(_) => Some(Kind::EntryCreate),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(Kind::EntryDelete),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Kind::EntryCreate),
        EventKind::Modify(_) => Some(Kind::EntryModify),
        EventKind::Remove(_) => Some(Kind::EntryDelete),
        _ => None,
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LocalDispatcher, ResourceListener};
    use crate::error::ListenerError;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(Kind::EntryCreate)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(Kind::EntryModify)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(Kind::EntryDelete)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::Any)),
            Some(Kind::EntryDelete)
        );
        assert_eq!(classify(&EventKind::Any), None);
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/data");
        assert_eq!(
            relative_path(root, Path::new("/data/styles/foo.sld")),
            Some("styles/foo.sld".to_string())
        );
        assert_eq!(relative_path(root, Path::new("/data")), None);
        assert_eq!(relative_path(root, Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn test_coalesce() {
        let mut pending = BTreeMap::new();
        coalesce(&mut pending, "a".to_string(), Kind::EntryCreate);
        coalesce(&mut pending, "a".to_string(), Kind::EntryModify);
        coalesce(&mut pending, "b".to_string(), Kind::EntryCreate);
        coalesce(&mut pending, "b".to_string(), Kind::EntryDelete);
        coalesce(&mut pending, "c".to_string(), Kind::EntryDelete);
        coalesce(&mut pending, "c".to_string(), Kind::EntryCreate);

        assert_eq!(pending.get("a"), Some(&Kind::EntryCreate));
        assert_eq!(pending.get("b"), None);
        assert_eq!(pending.get("c"), Some(&Kind::EntryModify));
    }

    #[tokio::test]
    async fn test_start_requires_existing_directory() {
        let dispatcher: Arc<dyn ResourceNotificationDispatcher> = Arc::new(LocalDispatcher::new());
        let result = ResourceWatcher::start(
            "/nonexistent/data_dir",
            Duration::from_millis(50),
            dispatcher,
        );
        assert!(matches!(result, Err(NotifyError::WatchError(_))));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher: Arc<dyn ResourceNotificationDispatcher> = Arc::new(LocalDispatcher::new());
        let result = ResourceWatcher::start(temp_dir.path(), Duration::from_millis(50), dispatcher);
        assert!(matches!(result, Err(NotifyError::WatchError(_))));
    }

    #[tokio::test]
    async fn test_file_change_is_announced() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = Arc::new(LocalDispatcher::new());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn ResourceListener> = Arc::new(
            move |n: &ResourceNotification| -> std::result::Result<(), ListenerError> {
                let _ = tx.send(n.path().to_string());
                Ok(())
            },
        );
        dispatcher.add_listener("foo.sld", listener);

        let watcher = ResourceWatcher::start(
            temp_dir.path(),
            Duration::from_millis(50),
            dispatcher.clone(),
        )
        .unwrap();
        assert_eq!(watcher.debounce_duration(), Duration::from_millis(50));

        let path = watcher.root().join("foo.sld");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(&path, "<StyledLayerDescriptor/>").unwrap();
        });

        let received = timeout(Duration::from_secs(2), rx.recv()).await;
        assert_eq!(received.unwrap().as_deref(), Some("foo.sld"));
    }
}
