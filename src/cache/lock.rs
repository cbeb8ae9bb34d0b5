//! Advisory lock file guarding index read-modify-write cycles.
//!
//! The lock file holds a per-holder token. Removing a lock, whether releasing
//! our own or breaking a stale one, first renames the file to a unique
//! sibling and only deletes it if the token is the expected one, so a single
//! contender wins and nobody deletes a lock they do not own.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CacheError;

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Held lock; the file is removed on drop if it still carries our token
#[derive(Debug)]
pub struct IndexLock {
    path: PathBuf,
    token: String,
}

impl IndexLock {
    /// Create `path` exclusively, waiting up to `timeout` for a current
    /// holder and breaking locks older than `stale_after`
    pub fn acquire(path: &Path, timeout: Duration, stale_after: Duration) -> Result<Self, CacheError> {
        let deadline = Instant::now() + timeout;
        let token = Uuid::new_v4().to_string();
        let storage = |source: std::io::Error| CacheError::Storage {
            path: path.to_path_buf(),
            source,
        };

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(token.as_bytes()).and_then(|_| file.sync_all()) {
                        let _ = std::fs::remove_file(path);
                        return Err(storage(e));
                    }
                    debug!("Acquired cache lock {}", path.display());
                    return Ok(Self {
                        path: path.to_path_buf(),
                        token,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(stale_token) = stale_token(path, stale_after) {
                        if take_if_owned(path, &stale_token) {
                            warn!("Broke stale cache lock {}", path.display());
                        }
                        continue;
                    }
                }
                Err(source) => return Err(storage(source)),
            }

            if Instant::now() >= deadline {
                return Err(CacheError::LockTimeout {
                    path: path.to_path_buf(),
                });
            }
            std::thread::sleep(RETRY_INTERVAL);
        }
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if !take_if_owned(&self.path, &self.token) {
            warn!(
                "Cache lock {} was broken by another writer before release",
                self.path.display()
            );
        }
    }
}

/// Token of the lock at `path` if it is older than `stale_after`
fn stale_token(path: &Path, stale_after: Duration) -> Option<String> {
    let age = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())?;
    if age <= stale_after {
        return None;
    }
    std::fs::read_to_string(path).ok()
}

/// Remove the lock at `path` if it carries `token`.
///
/// The file is first renamed to a unique sibling; of several contenders only
/// one rename succeeds. If the claimed file turns out to belong to someone
/// else it is linked back into place without clobbering a newer lock.
fn take_if_owned(path: &Path, token: &str) -> bool {
    let claimed = path.with_file_name(format!(
        ".{}.{}.released",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Uuid::new_v4()
    ));

    if std::fs::rename(path, &claimed).is_err() {
        return false;
    }

    let owned = std::fs::read_to_string(&claimed)
        .map(|content| content == token)
        .unwrap_or(false);

    if !owned {
        if let Err(e) = std::fs::hard_link(&claimed, path) {
            if e.kind() != ErrorKind::AlreadyExists {
                warn!("Failed to restore cache lock {}: {}", path.display(), e);
            }
        }
    }
    if let Err(e) = std::fs::remove_file(&claimed) {
        warn!("Failed to remove {}: {}", claimed.display(), e);
    }
    owned
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("index.lock");

        let held = IndexLock::acquire(&path, Duration::from_millis(50), Duration::from_secs(30)).unwrap();
        let second = IndexLock::acquire(&path, Duration::from_millis(50), Duration::from_secs(30));
        assert!(matches!(second, Err(CacheError::LockTimeout { .. })));

        drop(held);
        assert!(!path.exists());
        assert!(IndexLock::acquire(&path, Duration::from_millis(50), Duration::from_secs(30)).is_ok());
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("index.lock");
        std::fs::write(&path, "left over by a crashed writer").unwrap();

        let lock = IndexLock::acquire(&path, Duration::from_millis(200), Duration::ZERO).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), lock.token);
    }

    #[test]
    fn test_broken_holder_does_not_release_new_lock() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("index.lock");

        let slow = IndexLock::acquire(&path, Duration::from_millis(50), Duration::from_secs(30)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let current = IndexLock::acquire(&path, Duration::from_millis(200), Duration::from_millis(5)).unwrap();

        drop(slow);
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), current.token);

        let third = IndexLock::acquire(&path, Duration::from_millis(50), Duration::from_secs(30));
        assert!(matches!(third, Err(CacheError::LockTimeout { .. })));

        drop(current);
        assert!(!path.exists());
    }

    #[test]
    fn test_foreign_lock_survives_take() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("index.lock");
        std::fs::write(&path, "someone else").unwrap();

        assert!(!take_if_owned(&path, "mine"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "someone else");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_is_storage_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("missing").join("index.lock");

        let result = IndexLock::acquire(&path, Duration::from_millis(50), Duration::from_secs(30));
        assert!(matches!(result, Err(CacheError::Storage { .. })));
    }
}
