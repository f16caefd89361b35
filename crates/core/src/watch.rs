//! Debounced reload watcher.
//!
//! The watcher collects the files visited by a scan, arms on the container's
//! start signal and disarms on its stop signal. Changes are collapsed over
//! the bounce window into a single [`ReloadRequest`].

use crate::error::{Result, WebscopeError};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webscope_api::{LifecycleEvent, LifecycleKind, LifecycleListener};

/// Extensions whose appearance under a watched directory counts as a change.
const RELEVANT_EXTENSIONS: [&str; 3] = ["class", "jar", "xml"];

/// Asks the coordinator for a fresh assembly pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadRequest {
    pub deployment: String,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Unarmed,
    Armed,
    Closed,
}

/// Observable state of a file; `None` when it does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl FileState {
    fn probe(path: &Path) -> Option<Self> {
        std::fs::metadata(path).ok().map(|meta| Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRegistration {
    pub path: PathBuf,
    pub last_known_state: Option<FileState>,
    /// A directory location, watched with everything below it.
    pub recursive: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registered paths and their last known state.
#[derive(Debug, Default)]
struct Registry {
    entries: Mutex<BTreeMap<PathBuf, WatchRegistration>>,
}

impl Registry {
    fn register(&self, path: &Path) {
        lock(&self.entries).insert(
            path.to_path_buf(),
            WatchRegistration {
                path: path.to_path_buf(),
                last_known_state: FileState::probe(path),
                recursive: path.is_dir(),
            },
        );
    }

    fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    fn paths(&self) -> Vec<PathBuf> {
        lock(&self.entries).keys().cloned().collect()
    }

    /// Directories to watch. Registered directories are watched recursively,
    /// the parents of registered files outside them on their own.
    fn directories(&self) -> BTreeMap<PathBuf, RecursiveMode> {
        let entries = lock(&self.entries);
        let roots: BTreeSet<&Path> = entries
            .values()
            .filter(|r| r.recursive)
            .map(|r| r.path.as_path())
            .collect();

        let mut directories: BTreeMap<PathBuf, RecursiveMode> = roots
            .iter()
            .map(|root| (root.to_path_buf(), RecursiveMode::Recursive))
            .collect();
        for registration in entries.values().filter(|r| !r.recursive) {
            let Some(parent) = registration.path.parent() else {
                continue;
            };
            if !roots.iter().any(|root| parent.starts_with(root)) {
                directories
                    .entry(parent.to_path_buf())
                    .or_insert(RecursiveMode::NonRecursive);
            }
        }
        directories
    }

    /// Registered paths whose state moved since they were recorded, e.g.
    /// between the scan and arming. Their new state is recorded.
    fn stale_paths(&self) -> Vec<PathBuf> {
        let mut entries = lock(&self.entries);
        let mut stale = Vec::new();
        for registration in entries.values_mut() {
            let current = FileState::probe(&registration.path);
            if registration.last_known_state != current {
                registration.last_known_state = current;
                stale.push(registration.path.clone());
            }
        }
        stale
    }

    /// Compare `path` against its last known state and record the new one.
    /// An unregistered path counts only if it is a new relevant file.
    fn is_change(&self, path: &Path) -> bool {
        let current = FileState::probe(path);
        let mut entries = lock(&self.entries);
        match entries.get_mut(path) {
            Some(registration) if registration.recursive => false,
            Some(registration) => {
                if registration.last_known_state == current {
                    return false;
                }
                registration.last_known_state = current;
                true
            }
            None => {
                let relevant = current.is_some()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| RELEVANT_EXTENSIONS.contains(&ext));
                if relevant {
                    entries.insert(
                        path.to_path_buf(),
                        WatchRegistration {
                            path: path.to_path_buf(),
                            last_known_state: current,
                            recursive: false,
                        },
                    );
                }
                relevant
            }
        }
    }
}

struct FsWatcher {
    _watcher: RecommendedWatcher,
    tx: mpsc::UnboundedSender<PathBuf>,
    rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl FsWatcher {
    fn new(registry: Arc<Registry>) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter = Arc::clone(&registry);
        let events = tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    for path in event.paths {
                        if filter.is_change(&path) {
                            let _ = events.send(path);
                        }
                    }
                }
            },
            Config::default(),
        )?;
        for (dir, mode) in registry.directories() {
            if dir.is_dir() {
                watcher.watch(&dir, mode)?;
            }
        }
        Ok(Self {
            _watcher: watcher,
            tx,
            rx,
        })
    }
}

enum Arming {
    Unarmed,
    Armed {
        cancel: CancellationToken,
        _watcher: RecommendedWatcher,
    },
    Closed,
}

pub struct ReloadWatcher {
    deployment: String,
    bounce: Duration,
    registry: Arc<Registry>,
    arming: Mutex<Arming>,
    reload_tx: mpsc::UnboundedSender<ReloadRequest>,
}

impl ReloadWatcher {
    pub fn new(
        deployment: impl Into<String>,
        bounce: Duration,
        reload_tx: mpsc::UnboundedSender<ReloadRequest>,
    ) -> Self {
        Self {
            deployment: deployment.into(),
            bounce,
            registry: Arc::new(Registry::default()),
            arming: Mutex::new(Arming::Unarmed),
            reload_tx,
        }
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn bounce(&self) -> Duration {
        self.bounce
    }

    /// Record a path seen during a scan.
    pub fn register(&self, path: &Path) {
        self.registry.register(path);
    }

    pub fn registered_paths(&self) -> Vec<PathBuf> {
        self.registry.paths()
    }

    /// Whether lifecycle signals should arm this watcher at all.
    pub fn should_run(&self) -> bool {
        !self.bounce.is_zero() && !self.registry.is_empty()
    }

    pub fn state(&self) -> WatcherState {
        match *lock(&self.arming) {
            Arming::Unarmed => WatcherState::Unarmed,
            Arming::Armed { .. } => WatcherState::Armed,
            Arming::Closed => WatcherState::Closed,
        }
    }

    /// Start watching the registered paths. Must run inside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        if !self.should_run() {
            debug!("Watcher for {} has nothing to do; staying unarmed", self.deployment);
            return Ok(());
        }
        let mut arming = lock(&self.arming);
        if matches!(*arming, Arming::Armed { .. }) {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| WebscopeError::Internal(format!("watcher needs a tokio runtime: {e}")))?;
        let FsWatcher { _watcher, tx, rx } = FsWatcher::new(Arc::clone(&self.registry))?;
        let cancel = CancellationToken::new();

        // Events are flowing now; catch up on what changed since the scan.
        for path in self.registry.stale_paths() {
            debug!("{} changed before {} was armed", path.display(), self.deployment);
            let _ = tx.send(path);
        }
        drop(tx);

        let deployment = self.deployment.clone();
        let reload_tx = self.reload_tx.clone();
        handle.spawn(debounce(rx, self.bounce, cancel.clone(), move |paths| {
            info!(
                "Detected changes in {} file(s) of {}; requesting reload",
                paths.len(),
                deployment
            );
            if reload_tx
                .send(ReloadRequest {
                    deployment: deployment.clone(),
                    paths,
                })
                .is_err()
            {
                debug!("Reload receiver for {} is gone", deployment);
            }
        }));

        info!(
            "Watching {} path(s) of {} (bounce {:?})",
            self.registry.paths().len(),
            self.deployment,
            self.bounce
        );
        *arming = Arming::Armed { cancel, _watcher };
        Ok(())
    }

    /// Stop watching. A closed watcher may be started again.
    pub fn close(&self) {
        let mut arming = lock(&self.arming);
        if let Arming::Armed { cancel, .. } = &*arming {
            cancel.cancel();
            debug!("Watcher for {} closed", self.deployment);
        }
        *arming = Arming::Closed;
    }
}

impl LifecycleListener for ReloadWatcher {
    fn lifecycle_event(&self, event: &LifecycleEvent) {
        if event.deployment != self.deployment {
            return;
        }
        if !self.should_run() {
            return;
        }
        match event.kind {
            LifecycleKind::AfterStart => {
                if let Err(e) = self.start() {
                    warn!("Failed to arm watcher for {}: {}", self.deployment, e);
                }
            }
            LifecycleKind::BeforeStop => self.close(),
        }
    }
}

impl Drop for ReloadWatcher {
    fn drop(&mut self) {
        if let Arming::Armed { cancel, .. } = &*lock(&self.arming) {
            cancel.cancel();
        }
    }
}

/// Collapse bursts of changed paths into one `signal` call per quiet period
/// of `bounce`. Returns when `cancel` fires or the change feed ends.
pub async fn debounce<F>(
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    bounce: Duration,
    cancel: CancellationToken,
    mut signal: F,
) where
    F: FnMut(Vec<PathBuf>) + Send + 'static,
{
    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            }
            change = changes.recv() => {
                match change {
                    Some(path) => {
                        pending.insert(path);
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(bounce), if !pending.is_empty() => {
                signal(std::mem::take(&mut pending).into_iter().collect());
            }
        }
    }
    debug!("Debounce loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_signal() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(debounce(
            rx,
            Duration::from_millis(200),
            cancel.clone(),
            move |paths| {
                let _ = signal_tx.send(paths);
            },
        ));

        tx.send(PathBuf::from("/w/a.class")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(PathBuf::from("/w/b.class")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(PathBuf::from("/w/c.jar")).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(signal_rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let paths = signal_rx.try_recv().unwrap();
        assert_eq!(paths.len(), 3);
        assert!(signal_rx.try_recv().is_err());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_signal_separately() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce(
            rx,
            Duration::from_millis(200),
            CancellationToken::new(),
            move |paths| {
                let _ = signal_tx.send(paths);
            },
        ));

        tx.send(PathBuf::from("/w/a.class")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(PathBuf::from("/w/a.class")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(signal_rx.try_recv().is_ok());
        assert!(signal_rx.try_recv().is_ok());
        assert!(signal_rx.try_recv().is_err());

        drop(tx);
        task.await.unwrap();
    }

    #[test]
    fn test_zero_bounce_never_arms() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("web.xml");
        std::fs::write(&file, "<web-app/>").unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let watcher = ReloadWatcher::new("shop", Duration::ZERO, tx);
        watcher.register(&file);
        assert!(!watcher.should_run());

        watcher.lifecycle_event(&LifecycleEvent::after_start("shop"));
        assert_eq!(watcher.state(), WatcherState::Unarmed);
    }

    #[test]
    fn test_nothing_registered_never_arms() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let watcher = ReloadWatcher::new("shop", Duration::from_millis(100), tx);
        assert!(!watcher.should_run());
        watcher.lifecycle_event(&LifecycleEvent::after_start("shop"));
        assert_eq!(watcher.state(), WatcherState::Unarmed);
    }

    #[tokio::test]
    async fn test_lifecycle_arms_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("App.class");
        std::fs::write(&file, [0xCA, 0xFE, 0xBA, 0xBE]).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let watcher = ReloadWatcher::new("shop", Duration::from_millis(100), tx);
        watcher.register(&file);

        watcher.lifecycle_event(&LifecycleEvent::after_start("other"));
        assert_eq!(watcher.state(), WatcherState::Unarmed);

        watcher.lifecycle_event(&LifecycleEvent::after_start("shop"));
        assert_eq!(watcher.state(), WatcherState::Armed);

        watcher.lifecycle_event(&LifecycleEvent::before_stop("shop"));
        assert_eq!(watcher.state(), WatcherState::Closed);

        watcher.lifecycle_event(&LifecycleEvent::after_start("shop"));
        assert_eq!(watcher.state(), WatcherState::Armed);
        watcher.close();
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("App.class");
        std::fs::write(&file, [0xCA, 0xFE]).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let watcher = ReloadWatcher::new("shop", Duration::from_millis(100), tx);
        watcher.register(&file);
        assert!(watcher.start().is_err());
        assert_eq!(watcher.state(), WatcherState::Unarmed);
    }

    #[test]
    fn test_registry_change_detection() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("App.class");
        std::fs::write(&file, [1, 2, 3]).unwrap();

        let registry = Registry::default();
        registry.register(&file);
        assert!(!registry.is_change(&file));

        std::fs::write(&file, [1, 2, 3, 4]).unwrap();
        assert!(registry.is_change(&file));
        assert!(!registry.is_change(&file));

        let fresh = dir.path().join("New.class");
        std::fs::write(&fresh, [1]).unwrap();
        assert!(registry.is_change(&fresh));

        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "x").unwrap();
        assert!(!registry.is_change(&notes));

        std::fs::remove_file(&file).unwrap();
        assert!(registry.is_change(&file));
        assert_eq!(
            registry.directories(),
            BTreeMap::from([(dir.path().to_path_buf(), RecursiveMode::NonRecursive)])
        );
    }

    #[test]
    fn test_directory_locations_are_watched_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("WEB-INF/classes");
        std::fs::create_dir_all(classes.join("app")).unwrap();
        let class = classes.join("app/App.class");
        std::fs::write(&class, [1, 2, 3]).unwrap();
        let web_xml = dir.path().join("WEB-INF/web.xml");
        std::fs::write(&web_xml, "<web-app/>").unwrap();

        let registry = Registry::default();
        registry.register(&classes);
        registry.register(&class);
        registry.register(&web_xml);

        assert_eq!(
            registry.directories(),
            BTreeMap::from([
                (dir.path().join("WEB-INF"), RecursiveMode::NonRecursive),
                (classes.clone(), RecursiveMode::Recursive),
            ])
        );
        // Events on the root itself are not changes; its contents are.
        assert!(!registry.is_change(&classes));
        std::fs::create_dir_all(classes.join("app/deep")).unwrap();
        let nested = classes.join("app/deep/New.class");
        std::fs::write(&nested, [1]).unwrap();
        assert!(registry.is_change(&nested));
    }

    #[test]
    fn test_stale_paths_since_registration() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("Kept.class");
        let edited = dir.path().join("Edited.class");
        std::fs::write(&kept, [1]).unwrap();
        std::fs::write(&edited, [1]).unwrap();

        let registry = Registry::default();
        registry.register(&kept);
        registry.register(&edited);
        std::fs::write(&edited, [1, 2, 3, 4]).unwrap();

        assert_eq!(registry.stale_paths(), vec![edited]);
        assert!(registry.stale_paths().is_empty());
    }

    #[tokio::test]
    async fn test_change_before_arming_requests_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("App.class");
        std::fs::write(&file, [0xCA, 0xFE]).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ReloadWatcher::new("shop", Duration::from_millis(50), tx);
        watcher.register(&file);
        std::fs::write(&file, [0xCA, 0xFE, 0xBA, 0xBE]).unwrap();

        watcher.start().unwrap();
        let request = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.deployment, "shop");
        assert_eq!(request.paths, vec![file]);
        watcher.close();
    }

    #[tokio::test]
    async fn test_armed_watcher_reports_new_class_in_new_package() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(classes.join("App.class"), [1]).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ReloadWatcher::new("shop", Duration::from_millis(50), tx);
        watcher.register(&classes);
        watcher.register(&classes.join("App.class"));
        watcher.start().unwrap();

        std::fs::create_dir_all(classes.join("com/example")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let added = classes.join("com/example/Added.class");
        std::fs::write(&added, [0xCA, 0xFE, 0xBA, 0xBE]).unwrap();

        let request = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(request.paths.contains(&added), "paths: {:?}", request.paths);
        watcher.close();
    }
}
