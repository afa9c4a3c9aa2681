//! Named mutual-exclusion regions
//!
//! A region serializes a critical section across every caller that uses the
//! same name. `FileLockRegion` is backed by an advisory OS file lock and so
//! excludes other processes on the host; `InProcessRegion` only excludes
//! threads of this process. Both give up after a bounded wait.

use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{PipelineError, Result};

/// Interval between acquisition attempts on a contended file lock
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive execution of a critical section
pub trait MutualExclusionRegion: Send + Sync {
    /// Run `body` while holding region `name`
    ///
    /// The region is released on every exit path, including when `body`
    /// fails or panics. Fails with `LockTimeout` when the region cannot be
    /// acquired within the configured wait.
    fn with_lock<T, F>(&self, name: &str, body: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>;
}

/// Region backed by an exclusive lock on `<dir>/<name>.lock`
#[derive(Debug, Clone)]
pub struct FileLockRegion {
    dir: PathBuf,
    timeout: Duration,
}

/// Held file lock; released on drop
#[derive(Debug)]
struct FileLockGuard {
    file: File,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        // Closing the file releases the lock as well
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileLockRegion {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    /// Lock file backing region `name`
    pub fn lock_path(&self, name: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.lock", safe))
    }

    fn acquire(&self, name: &str) -> Result<FileLockGuard> {
        let path = self.lock_path(name);
        let file = open_lock_file(&path)
            .map_err(|e| PipelineError::io(format!("opening lock file {}", path.display()), e))?;

        let started = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    log::debug!(
                        "Acquired region '{}' after {:?}",
                        name,
                        started.elapsed()
                    );
                    return Ok(FileLockGuard { file });
                }
                Err(e) if is_contended(&e) => {
                    let waited = started.elapsed();
                    if waited >= self.timeout {
                        log::error!("Gave up waiting for region '{}' after {:?}", name, waited);
                        return Err(PipelineError::LockTimeout {
                            region: name.to_string(),
                            waited,
                        });
                    }
                    log::debug!("Region '{}' is held elsewhere, waiting", name);
                    std::thread::sleep(RETRY_INTERVAL.min(self.timeout - waited));
                }
                Err(e) => {
                    return Err(PipelineError::io(
                        format!("locking {}", path.display()),
                        e,
                    ))
                }
            }
        }
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || (e.raw_os_error().is_some()
            && e.raw_os_error() == fs2::lock_contended_error().raw_os_error())
}

impl MutualExclusionRegion for FileLockRegion {
    fn with_lock<T, F>(&self, name: &str, body: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let _guard = self.acquire(name)?;
        body()
    }
}

/// Region shared by the threads of one process
#[derive(Debug)]
pub struct InProcessRegion {
    held: Mutex<HashSet<String>>,
    released: Condvar,
    timeout: Duration,
}

/// Held in-process region; released on drop
struct InProcessGuard<'a> {
    region: &'a InProcessRegion,
    name: String,
}

impl Drop for InProcessGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .region
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        held.remove(&self.name);
        self.region.released.notify_all();
    }
}

impl InProcessRegion {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    fn acquire(&self, name: &str) -> Result<InProcessGuard<'_>> {
        let held = self
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let started = Instant::now();
        let (mut held, wait) = self
            .released
            .wait_timeout_while(held, self.timeout, |held| held.contains(name))
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if wait.timed_out() && held.contains(name) {
            let waited = started.elapsed();
            log::error!("Gave up waiting for region '{}' after {:?}", name, waited);
            return Err(PipelineError::LockTimeout {
                region: name.to_string(),
                waited,
            });
        }
        held.insert(name.to_string());
        Ok(InProcessGuard {
            region: self,
            name: name.to_string(),
        })
    }
}

impl MutualExclusionRegion for InProcessRegion {
    fn with_lock<T, F>(&self, name: &str, body: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let _guard = self.acquire(name)?;
        body()
    }
}

impl<R: MutualExclusionRegion> MutualExclusionRegion for std::sync::Arc<R> {
    fn with_lock<T, F>(&self, name: &str, body: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        (**self).with_lock(name, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;

    #[test]
    fn test_file_region_runs_body_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let region = FileLockRegion::new(dir.path(), Duration::from_secs(1));

        let value = region.with_lock("branches", || Ok(7)).unwrap();
        assert_eq!(value, 7);
        // Released: a second acquisition succeeds immediately
        assert_eq!(region.with_lock("branches", || Ok(8)).unwrap(), 8);
        assert!(region.lock_path("branches").exists());
    }

    #[test]
    fn test_file_region_released_after_body_error() {
        let dir = tempfile::tempdir().unwrap();
        let region = FileLockRegion::new(dir.path(), Duration::from_millis(200));

        let err = region
            .with_lock::<(), _>("r", || Err(PipelineError::invalid("boom")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(region.with_lock("r", || Ok(())).is_ok());
    }

    #[test]
    fn test_file_region_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let holder = FileLockRegion::new(dir.path(), Duration::from_secs(5));
        let waiter = FileLockRegion::new(dir.path(), Duration::from_millis(150));

        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            holder
                .with_lock("contended", || {
                    locked_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
                .unwrap();
        });

        locked_rx.recv().unwrap();
        let err = waiter.with_lock("contended", || Ok(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockTimeout);
        assert!(err.to_string().contains("contended"));

        release_tx.send(()).unwrap();
        handle.join().unwrap();
        assert!(waiter.with_lock("contended", || Ok(())).is_ok());
    }

    #[test]
    fn test_region_names_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let region = FileLockRegion::new(dir.path(), Duration::from_millis(100));

        let nested = region
            .with_lock("outer", || region.with_lock("inner", || Ok("ok")))
            .unwrap();
        assert_eq!(nested, "ok");
        assert_ne!(region.lock_path("a/b"), region.lock_path("a_c"));
        assert!(region.lock_path("a/b").starts_with(dir.path()));
    }

    #[test]
    fn test_in_process_region_serializes_threads() {
        let region = Arc::new(InProcessRegion::new(Duration::from_secs(10)));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let region = Arc::clone(&region);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    region
                        .with_lock("shared", || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(5));
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_in_process_region_times_out() {
        let region = InProcessRegion::new(Duration::from_millis(50));
        let err = region
            .with_lock("r", || region.with_lock("r", || Ok(())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockTimeout);
        // Released after the outer body returned
        assert!(region.with_lock("r", || Ok(())).is_ok());
    }
}
