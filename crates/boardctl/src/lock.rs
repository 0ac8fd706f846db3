//! Exclusive access to the board.
//!
//! Only one exchange may talk to the board at a time, across threads and
//! across independently started `boardctl` processes. A [`ResourceLock`]
//! hands out a [`HeldLock`] that must be released when the exchange ends;
//! [`LockGuard`] scopes that release so it also happens on early returns and
//! panics.
//!
//! [`FileLock`] is the production implementation: an advisory exclusive lock
//! on a well-known file which is removed again on release. [`InProcessLock`]
//! gives the same contract inside one process.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::error::{BoardError, Result};

/// How often a bounded wait retries a contended file lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A mutual-exclusion primitive guarding the board.
pub trait ResourceLock: Send + Sync {
    /// Block until the lock is held.
    fn acquire(&self) -> Result<Box<dyn HeldLock>>;
}

/// Proof of exclusive ownership, returned by [`ResourceLock::acquire`].
pub trait HeldLock: Send {
    /// Name of the locked resource, for logs and errors.
    fn resource(&self) -> &str;

    /// Give up ownership.
    fn release(self: Box<Self>) -> Result<()>;
}

/// Scoped ownership of a [`ResourceLock`].
///
/// Call [`LockGuard::release`] to observe release errors. If the guard is
/// dropped without that, the lock is released and any error is logged.
pub struct LockGuard {
    held: Option<Box<dyn HeldLock>>,
}

impl LockGuard {
    /// Acquire `lock` and wrap the result in a guard.
    pub fn acquire(lock: &dyn ResourceLock) -> Result<Self> {
        let held = lock.acquire()?;
        trace!("Acquired lock {}", held.resource());
        Ok(LockGuard { held: Some(held) })
    }

    /// Release the lock, reporting any failure.
    pub fn release(mut self) -> Result<()> {
        match self.held.take() {
            Some(held) => {
                trace!("Releasing lock {}", held.resource());
                held.release()
            }
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(held) = self.held.take() {
            let resource = held.resource().to_string();
            if let Err(e) = held.release() {
                warn!("Failed to release lock {} during unwind: {}", resource, e);
            }
        }
    }
}

// ============================================================================
// File Lock
// ============================================================================

/// Advisory exclusive lock on a file, shared by every process on the host.
///
/// The lock file is created on acquire and removed on release. Since a
/// waiter may have opened the file just before the previous holder removed
/// it, a freshly acquired lock is only accepted if the path still names the
/// locked file; otherwise the acquire starts over on a new file.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    wait_timeout: Option<Duration>,
}

impl FileLock {
    /// Create a lock on `path` that waits for as long as it takes.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLock {
            path: path.into(),
            wait_timeout: None,
        }
    }

    /// Give up with [`BoardError::LockTimeout`] after waiting `timeout`.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resource(&self) -> String {
        self.path.display().to_string()
    }

    fn acquire_error(&self, source: io::Error) -> BoardError {
        BoardError::LockAcquire {
            resource: self.resource(),
            source,
        }
    }

    fn open(&self) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
    }

    /// Poll a non-blocking lock until it succeeds or the wait runs out.
    fn lock_bounded(&self, file: &File, started: Instant, limit: Duration) -> Result<()> {
        let contended = fs2::lock_contended_error();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(()),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.raw_os_error() == contended.raw_os_error() =>
                {
                    let waited = started.elapsed();
                    if waited >= limit {
                        return Err(BoardError::LockTimeout {
                            resource: self.resource(),
                            waited,
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL.min(limit - waited));
                }
                Err(e) => return Err(self.acquire_error(e)),
            }
        }
    }

    /// Whether `self.path` still refers to `file`.
    #[cfg(unix)]
    fn still_current(&self, file: &File) -> io::Result<bool> {
        use std::os::unix::fs::MetadataExt;

        let held = file.metadata()?;
        match fs::metadata(&self.path) {
            Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(unix))]
    fn still_current(&self, _file: &File) -> io::Result<bool> {
        Ok(self.path.exists())
    }
}

impl ResourceLock for FileLock {
    fn acquire(&self) -> Result<Box<dyn HeldLock>> {
        let started = Instant::now();
        loop {
            let file = self.open().map_err(|e| self.acquire_error(e))?;

            match self.wait_timeout {
                Some(limit) => self.lock_bounded(&file, started, limit)?,
                None => file.lock_exclusive().map_err(|e| self.acquire_error(e))?,
            }

            if self.still_current(&file).map_err(|e| self.acquire_error(e))? {
                debug!(
                    "Locked {} after {:.1}ms",
                    self.path.display(),
                    started.elapsed().as_secs_f64() * 1000.0
                );
                return Ok(Box::new(FileLockHandle {
                    file,
                    path: self.path.clone(),
                    resource: self.resource(),
                }));
            }

            // Dropping the file releases the stale lock.
            debug!("Lock file {} was replaced while waiting, retrying", self.path.display());
        }
    }
}

/// A held [`FileLock`].
struct FileLockHandle {
    file: File,
    path: PathBuf,
    resource: String,
}

impl HeldLock for FileLockHandle {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn release(self: Box<Self>) -> Result<()> {
        let FileLockHandle { file, path, resource } = *self;

        // Remove while still holding the lock, so anyone who locks the old
        // file after us sees that it is gone and retries.
        let removed = fs::remove_file(&path);
        let unlocked = FileExt::unlock(&file);
        drop(file);

        removed.map_err(|source| BoardError::LockRelease {
            resource: resource.clone(),
            source,
        })?;
        unlocked.map_err(|source| BoardError::LockRelease { resource, source })?;
        Ok(())
    }
}

// ============================================================================
// In-Process Lock
// ============================================================================

#[derive(Debug, Default)]
struct InProcessState {
    held: Mutex<bool>,
    freed: Condvar,
    acquisitions: AtomicUsize,
}

/// A lock that only excludes threads of the current process.
///
/// Clones share the same lock.
#[derive(Debug, Clone)]
pub struct InProcessLock {
    name: String,
    wait_timeout: Option<Duration>,
    state: Arc<InProcessState>,
}

impl InProcessLock {
    /// Create a new, free lock.
    pub fn new(name: impl Into<String>) -> Self {
        InProcessLock {
            name: name.into(),
            wait_timeout: None,
            state: Arc::new(InProcessState::default()),
        }
    }

    /// Give up with [`BoardError::LockTimeout`] after waiting `timeout`.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Whether the lock is currently held.
    pub fn is_held(&self) -> bool {
        *self.state.held.lock()
    }

    /// How many times the lock has been acquired.
    pub fn acquisitions(&self) -> usize {
        self.state.acquisitions.load(Ordering::SeqCst)
    }
}

impl ResourceLock for InProcessLock {
    fn acquire(&self) -> Result<Box<dyn HeldLock>> {
        let started = Instant::now();
        let mut held = self.state.held.lock();
        while *held {
            match self.wait_timeout {
                None => self.state.freed.wait(&mut held),
                Some(limit) => {
                    let waited = started.elapsed();
                    if waited >= limit {
                        return Err(BoardError::LockTimeout {
                            resource: self.name.clone(),
                            waited,
                        });
                    }
                    self.state.freed.wait_for(&mut held, limit - waited);
                }
            }
        }
        *held = true;
        self.state.acquisitions.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(InProcessHandle {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

/// A held [`InProcessLock`].
struct InProcessHandle {
    name: String,
    state: Arc<InProcessState>,
}

impl HeldLock for InProcessHandle {
    fn resource(&self) -> &str {
        &self.name
    }

    fn release(self: Box<Self>) -> Result<()> {
        *self.state.held.lock() = false;
        self.state.freed.notify_one();
        Ok(())
    }
}
