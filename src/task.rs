//! Download and install tasks
//!
//! A task streams one package archive from its source URL into memory in
//! fixed-size chunks, extracts it into the library directory, and
//! registers the result. It runs on a dedicated worker thread owned by
//! the package manager; progress and completion reach the consumer
//! through the manager's event channel, never directly from the worker.
//!
//! Cancellation is cooperative: the flag is checked before every chunk
//! read, and a cancelled task exits without registering anything or
//! reporting a terminal result.

use crate::registry::{InstalledPackage, Registry};
use crate::{Error, PackageMetadata, Result};
use flate2::read::GzDecoder;
use parking_lot::Mutex;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tar::Archive;

/// Bytes pulled from the stream per read.
const CHUNK_SIZE: usize = 8192;

/// Shared view of one in-flight install.
///
/// Handles are cheap clones over shared state; the manager keeps one in
/// its active-task map and gives copies to callers so they can watch
/// progress or request cancellation.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

struct TaskShared {
    metadata: PackageMetadata,
    destination: PathBuf,
    cancel: AtomicBool,
    finished: AtomicBool,
    progress: Mutex<f32>,
}

impl TaskHandle {
    pub(crate) fn new(metadata: PackageMetadata, destination: PathBuf) -> Self {
        Self {
            shared: Arc::new(TaskShared {
                metadata,
                destination,
                cancel: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                progress: Mutex::new(0.0),
            }),
        }
    }

    /// Metadata of the package being installed.
    pub fn metadata(&self) -> &PackageMetadata {
        &self.shared.metadata
    }

    /// Destination file path the archive is named after.
    pub fn destination(&self) -> &Path {
        &self.shared.destination
    }

    /// Last reported download progress, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        *self.shared.progress.lock()
    }

    /// Whether the task has reached a terminal state (or was cancelled).
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Relaxed)
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::Relaxed)
    }

    pub(crate) fn set_progress(&self, progress: f32) {
        *self.shared.progress.lock() = progress;
    }

    pub(crate) fn mark_finished(&self) {
        self.shared.finished.store(true, Ordering::Relaxed);
    }

    pub(crate) fn cancel_flag(&self) -> &AtomicBool {
        &self.shared.cancel
    }
}

/// How a worker run ended, short of an error.
pub(crate) enum TaskOutcome {
    /// Extracted and registered at the given install path.
    Installed(PathBuf),
    /// Cancelled mid-flight; nothing was registered.
    Cancelled,
}

/// Execute one download/install on the calling (worker) thread.
///
/// Connect, stream, extract, register. `on_progress` fires after every
/// chunk with the cumulative fraction. Connection failures and non-2xx
/// statuses error out before any progress is reported.
pub(crate) fn run(
    client: &reqwest::blocking::Client,
    handle: &TaskHandle,
    registry: &Mutex<Registry>,
    on_progress: impl Fn(f32),
) -> Result<TaskOutcome> {
    let metadata = handle.metadata();

    // Connecting
    let response = client.get(metadata.url()).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Transport {
            status: status.as_u16(),
        });
    }

    // Downloading
    let total = response.content_length().unwrap_or(0);
    let data = match read_chunks(response, total, handle.cancel_flag(), |progress| {
        handle.set_progress(progress);
        on_progress(progress);
    })? {
        Some(data) => data,
        None => return Ok(TaskOutcome::Cancelled),
    };

    // Extracting
    let target_dir = handle
        .destination()
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let install_path = target_dir.join(metadata.name());
    let existed_before = install_path.exists();

    if let Err(e) = extract(&data, &target_dir) {
        // Don't leave a half-extracted directory behind
        if !existed_before && install_path.exists() {
            let _ = fs::remove_dir_all(&install_path);
        }
        return Err(e);
    }

    // Registering
    registry
        .lock()
        .add(InstalledPackage::new(metadata, install_path.clone()));

    Ok(TaskOutcome::Installed(install_path))
}

/// Pull the stream into memory in fixed-size chunks.
///
/// Returns `Ok(None)` when the cancel flag was observed; the buffer
/// collected so far is discarded. `on_chunk` receives the cumulative
/// fraction after every chunk (0.0 when the total is unknown).
pub(crate) fn read_chunks<R: Read>(
    mut reader: R,
    total: u64,
    cancel: &AtomicBool,
    mut on_chunk: impl FnMut(f32),
) -> std::io::Result<Option<Vec<u8>>> {
    let mut data = Vec::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut downloaded: u64 = 0;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }

        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }

        data.extend_from_slice(&buffer[..read]);
        downloaded += read as u64;

        let progress = if total > 0 {
            (downloaded as f64 / total as f64) as f32
        } else {
            0.0
        };
        on_chunk(progress);
    }

    Ok(Some(data))
}

/// Unpack a gzipped tarball held in memory into `target_dir`.
fn extract(data: &[u8], target_dir: &Path) -> Result<()> {
    let tar = GzDecoder::new(data);
    let mut archive = Archive::new(tar);
    archive
        .unpack(target_dir)
        .map_err(|e| Error::Extraction(e.to_string()))
}
