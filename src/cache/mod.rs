//! # Results Cache
//!
//! Content-addressed store of analysis results on the local filesystem.
//!
//! A cache directory holds one metadata index, `cache_metadata.json`, mapping
//! fingerprints to `{ timestamp, source }`, plus one `<fingerprint>.json`
//! payload per entry. The index is authoritative: an entry counts only while
//! the index lists it and it is younger than the TTL, and an index entry whose
//! payload is missing or unreadable is a miss.
//!
//! Writes hold the `cache_metadata.json.lock` file for the whole cycle of
//! writing the payload and loading, mutating and saving the index, so
//! concurrent writers of different keys never drop each other's entries.
//! Reads take no lock.
//!
//! Known limitation: exclusion lasts only as long as a writer finishes
//! within `stale_lock_secs`. A writer that overruns has its lock broken, and
//! a `put` racing a `sweep_expired` on the same key may then leave an index
//! entry without its payload. Such an entry reads as a miss and is replaced
//! by the next `put`.

mod lock;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::types::AnalysisResult;
use crate::config::CacheConfig;
use crate::error::{AnalyzerError, CacheError, Result};

pub use lock::IndexLock;

/// Payload layout version; payloads with another version are misses
pub const FORMAT_VERSION: u32 = 1;

const INDEX_FILE: &str = "cache_metadata.json";
const LOCK_FILE: &str = "cache_metadata.json.lock";
const READ_CHUNK: usize = 64 * 1024;

/// What goes into a file's fingerprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// Content, size and modification time
    #[default]
    ContentAndMtime,
    /// Content only; touching a file keeps its entry
    ContentOnly,
}

/// One index record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub timestamp: DateTime<Utc>,

    /// File the result was computed from
    #[serde(default)]
    pub source: Option<PathBuf>,
}

type Index = BTreeMap<String, IndexEntry>;

#[derive(Serialize, Deserialize)]
struct Payload {
    format_version: u32,
    key: String,
    result: AnalysisResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries listed in the index
    pub entries: usize,

    /// Listed entries past their TTL
    pub expired: usize,
}

/// Persistent results cache rooted at one directory
pub struct ResultsCache {
    directory: PathBuf,
    ttl: chrono::Duration,
    mode: FingerprintMode,
    lock_timeout: Duration,
    stale_lock: Duration,
}

impl ResultsCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            ttl: chrono::Duration::days(config.ttl_days as i64),
            mode: config.fingerprint,
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            stale_lock: Duration::from_secs(config.stale_lock_secs),
        }
    }

    /// Cache in `directory` with default settings
    pub fn in_directory<P: Into<PathBuf>>(directory: P) -> Self {
        Self::new(&CacheConfig {
            directory: directory.into(),
            ..CacheConfig::default()
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Deterministic key for a file on disk
    pub fn fingerprint<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let path = path.as_ref();
        let storage = |source: std::io::Error| CacheError::Storage {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(storage)?;
        let metadata = file.metadata().map_err(storage)?;

        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; READ_CHUNK];
        loop {
            let read = file.read(&mut buffer).map_err(storage)?;
            if read == 0 {
                break;
            }
            context.consume(&buffer[..read]);
        }

        if self.mode == FingerprintMode::ContentAndMtime {
            let mtime = metadata
                .modified()
                .map_err(storage)?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            context.consume(metadata.len().to_le_bytes());
            context.consume(mtime.to_le_bytes());
        }

        Ok(format!("{:x}", context.compute()))
    }

    /// Fingerprint `path` and look it up
    pub fn lookup<P: AsRef<Path>>(&self, path: P) -> Result<Option<AnalysisResult>> {
        let key = self.fingerprint(path)?;
        Ok(self.get(&key))
    }

    /// Stored result for `key` if present and within the TTL
    pub fn get(&self, key: &str) -> Option<AnalysisResult> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<AnalysisResult> {
        if !is_valid_key(key) {
            return None;
        }

        let index = self.load_index();
        let Some(entry) = index.get(key) else {
            debug!("Cache miss for {}", key);
            return None;
        };

        if self.is_expired(entry, now) {
            debug!("Cache entry {} expired at {}", key, entry.timestamp + self.ttl);
            return None;
        }

        let path = self.payload_path(key);
        let payload = match self.read_payload(&path, key) {
            Ok(payload) => payload?,
            Err(e) => {
                warn!("Ignoring cache entry {}: {}", key, e);
                return None;
            }
        };

        debug!("Cache hit for {}", key);
        Some(payload.result)
    }

    /// Store `result` under `key`, replacing any previous entry
    pub fn put(&self, key: &str, result: &AnalysisResult) -> Result<()> {
        self.put_entry(key, result, None, Utc::now())
    }

    /// Store `result` and remember which file it came from
    pub fn put_with_source(&self, key: &str, result: &AnalysisResult, source: &Path) -> Result<()> {
        self.put_entry(key, result, Some(source.to_path_buf()), Utc::now())
    }

    /// Store `result` with an explicit creation time
    pub fn put_at(&self, key: &str, result: &AnalysisResult, timestamp: DateTime<Utc>) -> Result<()> {
        self.put_entry(key, result, None, timestamp)
    }

    fn put_entry(
        &self,
        key: &str,
        result: &AnalysisResult,
        source: Option<PathBuf>,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        if !is_valid_key(key) {
            return Err(AnalyzerError::generic(format!("Invalid cache key '{}'", key)));
        }
        self.ensure_directory()?;

        let payload = Payload {
            format_version: FORMAT_VERSION,
            key: key.to_string(),
            result: result.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&payload)
            .map_err(|e| AnalyzerError::generic(format!("Failed to serialize cache payload: {}", e)))?;

        self.transaction(|index| {
            self.write_atomic(&self.payload_path(key), &bytes)?;
            index.insert(key.to_string(), IndexEntry { timestamp, source });
            Ok(())
        })?;

        debug!("Cached result under {}", key);
        Ok(())
    }

    /// Delete every entry older than the TTL, returning how many went
    pub fn sweep_expired(&self) -> Result<usize> {
        if !self.index_path().exists() {
            return Ok(0);
        }

        let now = Utc::now();
        let removed = self.transaction(|index| {
            let expired: Vec<String> = index
                .iter()
                .filter(|(_, entry)| self.is_expired(entry, now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                index.remove(key);
                self.remove_payload(key)?;
            }
            Ok(expired.len())
        })?;

        info!("Swept {} expired cache entries", removed);
        Ok(removed)
    }

    /// Delete every entry and payload, including orphaned payloads
    pub fn clear_all(&self) -> Result<usize> {
        if !self.directory.exists() {
            return Ok(0);
        }

        let removed = self.transaction(|index| {
            let count = index.len();
            for key in index.keys() {
                self.remove_payload(key)?;
            }
            index.clear();
            self.remove_orphans()?;
            Ok(count)
        })?;

        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let index = self.load_index();
        CacheStats {
            entries: index.len(),
            expired: index.values().filter(|e| self.is_expired(e, now)).count(),
        }
    }

    /// Index entry for `key`, expired or not
    pub fn entry(&self, key: &str) -> Option<IndexEntry> {
        self.load_index().remove(key)
    }

    fn is_expired(&self, entry: &IndexEntry, now: DateTime<Utc>) -> bool {
        now - entry.timestamp > self.ttl
    }

    /// Load, mutate and save the index while holding the lock file
    fn transaction<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Index) -> Result<T>,
    {
        self.ensure_directory()?;
        let _lock = IndexLock::acquire(
            &self.directory.join(LOCK_FILE),
            self.lock_timeout,
            self.stale_lock,
        )?;

        let mut index = self.load_index();
        let output = mutate(&mut index)?;
        self.save_index(&index)?;
        Ok(output)
    }

    fn load_index(&self) -> Index {
        let path = self.index_path();
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Index::new(),
            Err(e) => {
                warn!("Cache index {} unreadable, treating as empty: {}", path.display(), e);
                return Index::new();
            }
        };

        match serde_json::from_slice(&content) {
            Ok(index) => index,
            Err(e) => {
                let err = CacheError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                };
                warn!("{}; treating index as empty", err);
                Index::new()
            }
        }
    }

    fn save_index(&self, index: &Index) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| AnalyzerError::generic(format!("Failed to serialize cache index: {}", e)))?;
        self.write_atomic(&self.index_path(), &bytes)
    }

    /// `Ok(None)` for a missing payload, `Err` for a corrupt one
    fn read_payload(&self, path: &Path, key: &str) -> std::result::Result<Option<Payload>, CacheError> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache index lists {} but its payload is missing", key);
                return Ok(None);
            }
            Err(e) => {
                return Err(CacheError::Corrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let payload: Payload = serde_json::from_slice(&content).map_err(|e| CacheError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if payload.format_version != FORMAT_VERSION || payload.key != key {
            return Err(CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "payload header mismatch (version {}, key {})",
                    payload.format_version, payload.key
                ),
            });
        }

        Ok(Some(payload))
    }

    /// Write to a uniquely named sibling, then rename into place
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let storage = |source: std::io::Error| CacheError::Storage {
            path: path.to_path_buf(),
            source,
        };

        std::fs::write(&tmp, bytes).map_err(storage)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(storage(e).into());
        }
        Ok(())
    }

    fn remove_payload(&self, key: &str) -> Result<()> {
        let path = self.payload_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Storage { path, source }.into()),
        }
    }

    /// Payloads and temporaries written by this cache that no index entry
    /// refers to. Anything else in the directory is left alone.
    fn remove_orphans(&self) -> Result<()> {
        let entries = std::fs::read_dir(&self.directory).map_err(|source| CacheError::Storage {
            path: self.directory.clone(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_cache_temporary(&name) || is_cache_payload(&path, &name) {
                debug!("Removing orphaned cache file {}", path.display());
                std::fs::remove_file(&path)
                    .map_err(|source| CacheError::Storage { path: path.clone(), source })?;
            }
        }
        Ok(())
    }

    fn ensure_directory(&self) -> Result<()> {
        std::fs::create_dir_all(&self.directory).map_err(|source| CacheError::Storage {
            path: self.directory.clone(),
            source,
        })?;
        Ok(())
    }

    fn index_path(&self) -> PathBuf {
        self.directory.join(INDEX_FILE)
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", key))
    }
}

/// Keys become file names, so only plain identifiers are accepted
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `<key>.json` holding a payload for that key
fn is_cache_payload(path: &Path, name: &str) -> bool {
    let Some(key) = name.strip_suffix(".json") else {
        return false;
    };
    if name == INDEX_FILE || !is_valid_key(key) {
        return false;
    }
    std::fs::read(path)
        .ok()
        .and_then(|content| serde_json::from_slice::<Payload>(&content).ok())
        .is_some_and(|payload| payload.key == key)
}

/// `.<target>.<uuid>.tmp` left by `write_atomic` for the index or a payload
fn is_cache_temporary(name: &str) -> bool {
    let Some(inner) = name
        .strip_prefix('.')
        .and_then(|n| n.strip_suffix(".tmp"))
    else {
        return false;
    };
    let Some((target, id)) = inner.rsplit_once('.') else {
        return false;
    };
    if uuid::Uuid::parse_str(id).is_err() {
        return false;
    }
    target == INDEX_FILE
        || target
            .strip_suffix(".json")
            .is_some_and(is_valid_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn sample_result(bpm: f64) -> AnalysisResult {
        AnalysisResult {
            key: "A minor".to_string(),
            bpm,
            additional_info: BTreeMap::from([
                ("duration".to_string(), 180.5),
                ("tempo_confidence".to_string(), 0.42),
            ]),
        }
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));

        assert!(cache.get("abc123").is_none());
        cache.put("abc123", &sample_result(128.0)).unwrap();
        assert_eq!(cache.get("abc123"), Some(sample_result(128.0)));

        cache.put("abc123", &sample_result(90.0)).unwrap();
        assert_eq!(cache.get("abc123").unwrap().bpm, 90.0);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_fingerprint_tracks_content_and_mtime() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));
        let path = temp_dir.path().join("track.wav");
        std::fs::write(&path, b"RIFF audio bytes").unwrap();

        let first = cache.fingerprint(&path).unwrap();
        assert_eq!(first, cache.fingerprint(&path).unwrap());
        assert_eq!(first.len(), 32);

        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        std::fs::write(&path, b"RIFF audio byteS").unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        assert_ne!(first, cache.fingerprint(&path).unwrap());

        let before_touch = cache.fingerprint(&path).unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime + Duration::from_secs(60))
            .unwrap();
        assert_ne!(before_touch, cache.fingerprint(&path).unwrap());
    }

    #[test]
    fn test_content_only_fingerprint_ignores_mtime() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::new(&CacheConfig {
            directory: temp_dir.path().join("cache"),
            fingerprint: FingerprintMode::ContentOnly,
            ..CacheConfig::default()
        });
        let path = temp_dir.path().join("track.wav");
        std::fs::write(&path, b"RIFF audio bytes").unwrap();

        let first = cache.fingerprint(&path).unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();
        assert_eq!(first, cache.fingerprint(&path).unwrap());
    }

    #[test]
    fn test_expired_entries_miss_and_are_swept() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));

        let eight_days_ago = Utc::now() - chrono::Duration::days(8);
        let six_days_ago = Utc::now() - chrono::Duration::days(6);
        cache.put_at("old", &sample_result(100.0), eight_days_ago).unwrap();
        cache.put_at("recent", &sample_result(110.0), six_days_ago).unwrap();

        assert!(cache.get("old").is_none());
        assert!(cache.get("recent").is_some());
        // Reads never delete
        assert!(cache.entry("old").is_some());
        assert_eq!(cache.stats(), CacheStats { entries: 2, expired: 1 });

        assert_eq!(cache.sweep_expired().unwrap(), 1);
        assert!(cache.entry("old").is_none());
        assert!(!cache.directory().join("old.json").exists());
        assert_eq!(cache.sweep_expired().unwrap(), 0);
    }

    #[test]
    fn test_entry_one_second_past_ttl_is_expired() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));

        let created = Utc::now() - cache.ttl() - chrono::Duration::seconds(1);
        cache.put_at("boundary", &sample_result(100.0), created).unwrap();

        assert!(cache.get("boundary").is_none());
        assert_eq!(cache.sweep_expired().unwrap(), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_entry_just_inside_ttl_is_a_hit() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));

        let created = Utc::now() - cache.ttl() + chrono::Duration::seconds(10);
        cache.put_at("boundary", &sample_result(100.0), created).unwrap();

        assert_eq!(cache.get("boundary"), Some(sample_result(100.0)));
        assert_eq!(cache.sweep_expired().unwrap(), 0);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_corrupt_payload_is_a_miss() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));
        cache.put("broken", &sample_result(120.0)).unwrap();

        std::fs::write(cache.directory().join("broken.json"), b"{ not json").unwrap();
        assert!(cache.get("broken").is_none());

        cache.put("broken", &sample_result(120.0)).unwrap();
        assert!(cache.get("broken").is_some());
    }

    #[test]
    fn test_missing_payload_is_a_miss() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));
        cache.put("gone", &sample_result(120.0)).unwrap();

        std::fs::remove_file(cache.directory().join("gone.json")).unwrap();
        assert!(cache.get("gone").is_none());
    }

    #[test]
    fn test_corrupt_index_is_recovered() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));
        cache.put("first", &sample_result(120.0)).unwrap();

        std::fs::write(cache.directory().join(INDEX_FILE), b"garbage").unwrap();
        assert!(cache.get("first").is_none());

        cache.put("second", &sample_result(121.0)).unwrap();
        assert!(cache.get("second").is_some());
    }

    #[test]
    fn test_clear_all_removes_orphans() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));
        cache.put("one", &sample_result(120.0)).unwrap();
        cache.put("two", &sample_result(121.0)).unwrap();
        // A payload whose index entry was lost, and a writer's leftover temporary
        let orphan = Payload {
            format_version: FORMAT_VERSION,
            key: "orphan".to_string(),
            result: sample_result(122.0),
        };
        std::fs::write(
            cache.directory().join("orphan.json"),
            serde_json::to_vec(&orphan).unwrap(),
        )
        .unwrap();
        let tmp_name = format!(".one.json.{}.tmp", uuid::Uuid::new_v4());
        std::fs::write(cache.directory().join(&tmp_name), b"partial").unwrap();

        assert_eq!(cache.clear_all().unwrap(), 2);
        assert_eq!(cache.stats().entries, 0);
        assert!(!cache.directory().join("orphan.json").exists());
        assert!(!cache.directory().join(&tmp_name).exists());
        assert!(cache.directory().join(INDEX_FILE).exists());
    }

    #[test]
    fn test_clear_all_keeps_foreign_files() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));
        cache.put("abc", &sample_result(120.0)).unwrap();

        let dir = cache.directory();
        std::fs::write(dir.join("settings.json"), br#"{"theme": "dark"}"#).unwrap();
        std::fs::write(dir.join("notes.txt"), b"keep me").unwrap();
        std::fs::write(dir.join(".editor.swp.tmp"), b"keep me too").unwrap();
        // Valid key name, but not something this cache wrote
        std::fs::write(dir.join("playlist.json"), br#"["a", "b"]"#).unwrap();

        assert_eq!(cache.clear_all().unwrap(), 1);
        assert!(!dir.join("abc.json").exists());
        assert!(dir.join("settings.json").exists());
        assert!(dir.join("notes.txt").exists());
        assert!(dir.join(".editor.swp.tmp").exists());
        assert!(dir.join("playlist.json").exists());
    }

    #[test]
    fn test_cache_file_name_patterns() {
        let id = uuid::Uuid::new_v4();
        assert!(is_cache_temporary(&format!(".{}.{}.tmp", INDEX_FILE, id)));
        assert!(is_cache_temporary(&format!(".abc123.json.{}.tmp", id)));
        assert!(!is_cache_temporary(".abc123.json.not-a-uuid.tmp"));
        assert!(!is_cache_temporary(&format!(".notes.txt.{}.tmp", id)));
        assert!(!is_cache_temporary(&format!("abc123.json.{}.tmp", id)));
    }

    #[test]
    fn test_lookup_uses_fingerprint() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));
        let path = temp_dir.path().join("track.wav");
        std::fs::write(&path, b"some audio").unwrap();

        assert!(cache.lookup(&path).unwrap().is_none());
        let key = cache.fingerprint(&path).unwrap();
        cache.put_with_source(&key, &sample_result(99.0), &path).unwrap();

        assert_eq!(cache.lookup(&path).unwrap(), Some(sample_result(99.0)));
        assert_eq!(cache.entry(&key).unwrap().source, Some(path));
    }

    #[test]
    fn test_invalid_keys_are_rejected() {
        let temp_dir = tempdir().unwrap();
        let cache = ResultsCache::in_directory(temp_dir.path().join("cache"));
        assert!(cache.put("../escape", &sample_result(120.0)).is_err());
        assert!(cache.get("../escape").is_none());
    }

    #[test]
    fn test_concurrent_writers_keep_every_entry() {
        let temp_dir = tempdir().unwrap();
        let cache = Arc::new(ResultsCache::in_directory(temp_dir.path().join("cache")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache
                        .put(&format!("track{}", i), &sample_result(100.0 + i as f64))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.stats().entries, 8);
        for i in 0..8 {
            assert!(cache.get(&format!("track{}", i)).is_some());
        }
    }
}
