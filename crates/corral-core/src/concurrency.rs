use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Exclusive advisory lock on one container name, held for as long as the
/// value lives. Keeps two corral processes from driving the same container.
pub struct ContainerLock {
    lock_file: File,
    path: PathBuf,
}

impl ContainerLock {
    pub fn lock_path(lock_dir: &Path, name: &str) -> PathBuf {
        lock_dir.join(format!("{name}.lock"))
    }

    fn open(lock_dir: &Path, name: &str) -> Result<(File, PathBuf), CoreError> {
        std::fs::create_dir_all(lock_dir)?;
        let path = Self::lock_path(lock_dir, name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        Ok((file, path))
    }

    /// Block until the lock for `name` is ours.
    pub fn acquire(lock_dir: &Path, name: &str) -> Result<Self, CoreError> {
        let (file, path) = Self::open(lock_dir, name)?;
        file.lock_exclusive()
            .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::WouldBlock, e)))?;
        debug!("locked {}", path.display());
        Ok(Self {
            lock_file: file,
            path,
        })
    }

    /// Take the lock if nobody holds it.
    pub fn try_acquire(lock_dir: &Path, name: &str) -> Result<Option<Self>, CoreError> {
        let (file, path) = Self::open(lock_dir, name)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                lock_file: file,
                path,
            })),
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ContainerLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// First Ctrl-C asks the running command to wind down; a second one exits.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(1);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\nshutdown requested, tearing down container...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_file_named_after_container() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ContainerLock::acquire(dir.path(), "web").unwrap();
        assert_eq!(lock.path(), dir.path().join("web.lock"));
        assert!(lock.path().exists());
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let _lock = ContainerLock::acquire(dir.path(), "web").unwrap();
        assert!(ContainerLock::try_acquire(dir.path(), "web")
            .unwrap()
            .is_none());
        assert!(ContainerLock::try_acquire(dir.path(), "db")
            .unwrap()
            .is_some());
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = ContainerLock::acquire(dir.path(), "web").unwrap();
        }
        assert!(ContainerLock::try_acquire(dir.path(), "web")
            .unwrap()
            .is_some());
    }

    #[test]
    fn lock_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("run").join("corral");
        let lock = ContainerLock::acquire(&nested, "web").unwrap();
        assert!(nested.is_dir());
        drop(lock);
    }
}
