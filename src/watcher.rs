//! Change notifiers for watch mode.
//!
//! A [`Watcher`] reports changed files to a callback. The composer subscribes
//! to one and rebuilds the affected pipelines. [`FsWatcher`] watches a
//! directory tree on disk with debouncing; [`FakeWatcher`] lets tests emit
//! changes by hand and wait for the resulting rebuilds.

use crate::error::WatchError;
use crate::paths;
use futures::future::{join_all, BoxFuture};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default debounce window for file system events, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Callback invoked with the absolute path of every changed file.
pub type OnChange = Arc<dyn Fn(PathBuf) -> BoxFuture<'static, ()> + Send + Sync>;

/// Source of file change notifications.
pub trait Watcher: Send + Sync {
    /// Start delivering changes to `on_change` until the guard is stopped.
    fn start(&self, on_change: OnChange) -> Result<WatchGuard, WatchError>;
}

/// Stops a subscription when stopped or dropped.
pub struct WatchGuard {
    stop: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl WatchGuard {
    /// Guard that runs `stop` once.
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self { stop: Mutex::new(Some(Box::new(stop))) }
    }

    /// Stop delivering changes. Calling this more than once is a no-op.
    pub fn stop(&self) {
        let stop = self.stop.lock().take();
        if let Some(stop) = stop {
            stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.lock().is_none()
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard").field("stopped", &self.is_stopped()).finish()
    }
}

/// Watches a directory tree on disk.
///
/// Events are debounced per path, so a burst of writes to one file produces a
/// single notification. Only regular files are reported.
#[derive(Debug, Clone)]
pub struct FsWatcher {
    root: PathBuf,
    debounce: Duration,
}

impl FsWatcher {
    /// Watch `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WatchError> {
        let root = paths::resolve_path(root);
        if !root.exists() {
            return Err(WatchError::RootNotFound(root));
        }
        Ok(Self { root, debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS) })
    }

    /// Set the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Watcher for FsWatcher {
    /// Callbacks are spawned on the tokio runtime `start` is called from.
    fn start(&self, on_change: OnChange) -> Result<WatchGuard, WatchError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;

        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        let is_edit = matches!(event.kind, DebouncedEventKind::Any);
                        if !is_edit || !event.path.is_file() {
                            continue;
                        }
                        let path = paths::resolve_path(&event.path);
                        debug!(path = %path.display(), "file changed on disk");
                        runtime.spawn(on_change(path));
                    }
                }
                Err(error) => warn!(error = ?error, "watch error"),
            }
        })
        .map_err(WatchError::WatcherInit)?;

        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(WatchError::WatchPath)?;

        Ok(WatchGuard::new(move || drop(debouncer)))
    }
}

type Subscribers = Arc<Mutex<Vec<(u64, OnChange)>>>;

/// In-memory watcher for tests.
///
/// Nothing is observed on disk; changes are reported through
/// [`emit_change`](FakeWatcher::emit_change).
#[derive(Clone)]
pub struct FakeWatcher {
    root: PathBuf,
    subscribers: Subscribers,
    next_id: Arc<AtomicU64>,
}

impl FakeWatcher {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: paths::resolve_path(root),
            subscribers: Arc::default(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Report a change to `relative` (resolved against the root) and wait
    /// until every subscriber has finished handling it.
    pub async fn emit_change(&self, relative: impl AsRef<Path>) {
        let path = paths::resolve_path(self.root.join(relative));
        let callbacks: Vec<OnChange> =
            self.subscribers.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        join_all(callbacks.iter().map(|cb| cb(path.clone()))).await;
    }
}

impl Watcher for FakeWatcher {
    fn start(&self, on_change: OnChange) -> Result<WatchGuard, WatchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, on_change));

        let subscribers = Arc::downgrade(&self.subscribers);
        Ok(WatchGuard::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.lock().retain(|(other, _)| *other != id);
            }
        }))
    }
}

impl fmt::Debug for FakeWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeWatcher")
            .field("root", &self.root)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn recorder() -> (OnChange, Arc<Mutex<Vec<PathBuf>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let on_change: OnChange = Arc::new(move |path: PathBuf| {
            let sink = Arc::clone(&sink);
            async move { sink.lock().push(path) }.boxed()
        });
        (on_change, seen)
    }

    #[test]
    fn test_guard_stops_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let guard = WatchGuard::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        guard.stop();
        guard.stop();
        assert!(guard.is_stopped());
        drop(guard);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_stops_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        drop(WatchGuard::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fake_watcher_delivers_resolved_path() {
        let watcher = FakeWatcher::new("/project/src");
        let (on_change, seen) = recorder();
        let _guard = watcher.start(on_change).unwrap();

        watcher.emit_change("styles/../main.css").await;
        assert_eq!(*seen.lock(), vec![PathBuf::from("/project/src/main.css")]);
    }

    #[tokio::test]
    async fn test_fake_watcher_stop_unsubscribes() {
        let watcher = FakeWatcher::new("/project");
        let (on_change, seen) = recorder();
        let guard = watcher.start(on_change).unwrap();

        guard.stop();
        watcher.emit_change("a.txt").await;

        assert!(seen.lock().is_empty());
        assert_eq!(watcher.subscriber_count(), 0);
    }

    #[test]
    fn test_fs_watcher_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = FsWatcher::new(temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, WatchError::RootNotFound(_)));
    }

    #[test]
    fn test_fs_watcher_requires_runtime() {
        let temp = TempDir::new().unwrap();
        let watcher = FsWatcher::new(temp.path()).unwrap();
        let (on_change, _) = recorder();
        assert!(matches!(watcher.start(on_change), Err(WatchError::NoRuntime)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fs_watcher_reports_file_write() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let watcher = FsWatcher::new(&root).unwrap().with_debounce(Duration::from_millis(50));
        let (on_change, seen) = recorder();
        let _guard = watcher.start(on_change).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(root.join("a.txt"), "x").unwrap();

        let target = root.join("a.txt");
        for _ in 0..100 {
            if seen.lock().contains(&target) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(seen.lock().contains(&target));
    }
}
