//! Package manager orchestration
//!
//! [`PackageManager`] owns the installed-package registry, the in-memory
//! catalog, and every background worker: one restartable catalog refresh
//! worker plus one worker per in-flight install. All network and archive
//! work happens on those workers; consumers observe the manager through
//! a typed event channel drained on their own schedule, so no callback
//! ever runs on a worker's stack.
//!
//! # Examples
//!
//! ```no_run
//! use dekpm::{Config, PackageEvent, PackageManager};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = PackageManager::new(Config::load()?)?;
//! let events = manager.subscribe();
//!
//! manager.refresh();
//! while let Some(event) = events.recv_timeout(std::time::Duration::from_secs(30)) {
//!     if let PackageEvent::RefreshFinished { packages } = event {
//!         println!("{} packages available", packages);
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::catalog::CatalogClient;
use crate::registry::{InstalledPackage, Registry};
use crate::task::{self, TaskHandle, TaskOutcome};
use crate::{Config, PackageMetadata, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Notifications delivered to subscribers.
///
/// Everything a consumer needs to render package state flows through
/// here: refresh lifecycle, per-task download progress, terminal install
/// results, and uninstalls. Cancelled tasks emit no terminal event.
#[derive(Debug, Clone)]
pub enum PackageEvent {
    RefreshStarted,
    RefreshFinished { packages: usize },
    DownloadProgress { id: String, progress: f32 },
    InstallFinished { id: String, success: bool, message: String },
    Uninstalled { id: String },
}

/// A live event subscription.
///
/// This value is the unsubscribe token: dropping it closes the channel,
/// and the manager prunes the dead sender on its next broadcast, so a
/// torn-down consumer can never be notified again.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<PackageEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next pending event, if any.
    pub fn try_recv(&self) -> Option<PackageEvent> {
        self.rx.try_recv().ok()
    }

    /// Block up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PackageEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

struct TaskEntry {
    handle: TaskHandle,
    join: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct RefreshState {
    cancel: Option<Arc<AtomicBool>>,
    join: Option<JoinHandle<()>>,
    /// Superseded workers, joined at shutdown
    retired: Vec<JoinHandle<()>>,
}

struct Inner {
    client: CatalogClient,
    library_dir: PathBuf,
    registry: Mutex<Registry>,
    catalog: RwLock<Vec<PackageMetadata>>,
    subscribers: Mutex<Vec<mpsc::Sender<PackageEvent>>>,
    next_subscriber_id: AtomicU64,
    tasks: Mutex<HashMap<String, TaskEntry>>,
    refresh: Mutex<RefreshState>,
    refresh_generation: AtomicU64,
}

impl Inner {
    fn broadcast(&self, event: PackageEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn release_task(&self, id: &str) {
        self.tasks.lock().remove(id);
    }
}

/// The package manager service.
///
/// Meant to be owned by whatever context outlives individual consumer
/// sessions and handed to them by reference. Dropping it cancels and
/// joins every background worker.
pub struct PackageManager {
    inner: Arc<Inner>,
}

impl PackageManager {
    pub fn new(config: Config) -> Result<Self> {
        let client = CatalogClient::new(&config.catalog)?;
        let library_dir = config.library.dir.clone();
        let registry = Registry::load(&library_dir)?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                library_dir,
                registry: Mutex::new(registry),
                catalog: RwLock::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(0),
                tasks: Mutex::new(HashMap::new()),
                refresh: Mutex::new(RefreshState::default()),
                refresh_generation: AtomicU64::new(0),
            }),
        })
    }

    /// Subscribe to manager events. See [`Subscription`].
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push(tx);
        Subscription { id, rx }
    }

    /// Start (or restart) the background catalog refresh.
    ///
    /// Safe to call while a previous refresh is running: the old worker
    /// is cancelled and superseded, and only the newest worker may swap
    /// the catalog in and emit [`PackageEvent::RefreshFinished`].
    pub fn refresh(&self) {
        self.inner.broadcast(PackageEvent::RefreshStarted);

        // The lock is held from supersede through the new worker's store,
        // so concurrent callers cannot orphan each other's join handle.
        let mut state = self.inner.refresh.lock();
        if let Some(old) = state.cancel.take() {
            old.store(true, Ordering::Relaxed);
        }
        if let Some(old_join) = state.join.take() {
            state.retired.push(old_join);
        }

        let generation = self.inner.refresh_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(AtomicBool::new(false));

        let inner = self.inner.clone();
        let worker_cancel = cancel.clone();
        let join = thread::spawn(move || {
            let packages = inner.client.fetch_catalog(&worker_cancel);

            // A superseded or cancelled worker exits without touching state
            if worker_cancel.load(Ordering::Relaxed)
                || inner.refresh_generation.load(Ordering::SeqCst) != generation
            {
                return;
            }

            let count = packages.len();
            *inner.catalog.write() = packages;
            inner.broadcast(PackageEvent::RefreshFinished { packages: count });
        });

        state.cancel = Some(cancel);
        state.join = Some(join);
    }

    /// Whether a refresh worker is currently running.
    pub fn is_refreshing(&self) -> bool {
        let state = self.inner.refresh.lock();
        state.join.as_ref().map(|j| !j.is_finished()).unwrap_or(false)
    }

    /// Snapshot of the last successfully fetched catalog.
    ///
    /// Empty until the first refresh completes.
    pub fn available_packages(&self) -> Vec<PackageMetadata> {
        self.inner.catalog.read().clone()
    }

    /// Snapshot of the installed-package registry.
    pub fn installed_packages(&self) -> Vec<InstalledPackage> {
        self.inner.registry.lock().entries().to_vec()
    }

    pub fn is_installed(&self, metadata: &PackageMetadata) -> bool {
        self.inner.registry.lock().contains(metadata.id())
    }

    /// The in-flight task for this package, if one is running.
    pub fn find_task(&self, metadata: &PackageMetadata) -> Option<TaskHandle> {
        let tasks = self.inner.tasks.lock();
        tasks
            .get(metadata.id())
            .filter(|entry| !entry.handle.is_finished())
            .map(|entry| entry.handle.clone())
    }

    /// Start installing a package and return a handle to the task.
    ///
    /// The source URL is normalized to secure transport and the archive
    /// filename is derived from the URL's final path segment. At most one
    /// live task exists per package id: when one is already running its
    /// handle is returned instead of spawning a duplicate.
    pub fn install(&self, metadata: &PackageMetadata) -> TaskHandle {
        let metadata = metadata.with_secure_url();
        let id = metadata.id().to_string();

        let filename = metadata
            .url()
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(metadata.name())
            .to_string();
        let destination = self.inner.library_dir.join(filename);

        // Check and insert under one lock: a concurrent install for the
        // same id must attach to this task, never spawn a second one.
        let handle = {
            let mut tasks = self.inner.tasks.lock();
            if let Some(entry) = tasks.get(&id) {
                if !entry.handle.is_finished() {
                    return entry.handle.clone();
                }
            }
            let handle = TaskHandle::new(metadata, destination);
            tasks.insert(
                id.clone(),
                TaskEntry {
                    handle: handle.clone(),
                    join: None,
                },
            );
            handle
        };

        let inner = self.inner.clone();
        let worker = handle.clone();
        let task_id = id.clone();
        let join = thread::spawn(move || {
            let result = task::run(inner.client.http(), &worker, &inner.registry, |progress| {
                inner.broadcast(PackageEvent::DownloadProgress {
                    id: task_id.clone(),
                    progress,
                });
            });

            worker.mark_finished();
            match result {
                Ok(TaskOutcome::Installed(_)) => inner.broadcast(PackageEvent::InstallFinished {
                    id: task_id.clone(),
                    success: true,
                    message: format!("Installed {}", worker.metadata().name()),
                }),
                // A cancelled task reports nothing
                Ok(TaskOutcome::Cancelled) => {}
                Err(e) => inner.broadcast(PackageEvent::InstallFinished {
                    id: task_id.clone(),
                    success: false,
                    message: e.to_string(),
                }),
            }
            inner.release_task(&task_id);
        });

        // The worker may already have released itself; only then is the
        // entry gone, and the finished thread needs no join bookkeeping.
        if let Some(entry) = self.inner.tasks.lock().get_mut(&id) {
            entry.join = Some(join);
        }

        handle
    }

    /// Uninstall a package: remove it from the registry (deleting its
    /// install directory) and notify subscribers. A no-op if the package
    /// is not installed.
    pub fn uninstall(&self, metadata: &PackageMetadata) {
        let removed = {
            let mut registry = self.inner.registry.lock();
            if registry.contains(metadata.id()) {
                registry.remove(metadata.id());
                true
            } else {
                false
            }
        };

        if removed {
            self.inner.broadcast(PackageEvent::Uninstalled {
                id: metadata.id().to_string(),
            });
        }
    }

    /// Fetch the object names exported by the package at `url`.
    pub fn fetch_object_names(&self, url: &str) -> Vec<String> {
        self.inner.client.fetch_object_names(url)
    }

    pub fn library_dir(&self) -> &Path {
        &self.inner.library_dir
    }

    /// Cancel every background worker and wait for all of them to exit.
    ///
    /// Called from `Drop`; safe to call more than once. After this
    /// returns no event will ever be delivered again.
    pub fn shutdown(&self) {
        let (join, retired) = {
            let mut state = self.inner.refresh.lock();
            if let Some(cancel) = state.cancel.take() {
                cancel.store(true, Ordering::Relaxed);
            }
            (state.join.take(), std::mem::take(&mut state.retired))
        };
        for handle in retired.into_iter().chain(join) {
            let _ = handle.join();
        }

        let entries: Vec<TaskEntry> = self
            .inner
            .tasks
            .lock()
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        for entry in &entries {
            entry.handle.cancel();
        }
        for entry in entries {
            if let Some(handle) = entry.join {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for PackageManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
