use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::error::Result;
use crate::humanize::ByteSize;
use crate::observability::Metrics;

/// Placeholder served at `/`, never tracked
pub const INDEX_FILE: &str = "index.html";
/// Prefix of the in-flight download files, never tracked
pub const TEMP_FILE_PREFIX: &str = "_tempVideo";

/// One file under the cache root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub file_name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// On-disk asset index with capacity and idle eviction
///
/// The map is rebuilt from the cache root on open. Every `track` runs a
/// capacity pass synchronously, so a freshly written file can itself be
/// evicted when it alone exceeds the limit.
pub struct CacheStore {
    root: PathBuf,
    max_size: ByteSize,
    entries: RwLock<HashMap<String, CacheEntry>>,
    metrics: Arc<Metrics>,
}

impl CacheStore {
    /// Create the root if needed, index every file in it, then run one capacity pass
    pub fn open(root: impl Into<PathBuf>, max_size: ByteSize, metrics: Arc<Metrics>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let store = Self {
            root,
            max_size,
            entries: RwLock::new(HashMap::new()),
            metrics,
        };

        let mut scanned = 0usize;
        for item in fs::read_dir(&store.root)? {
            let item = item?;
            if !item.file_type()?.is_file() {
                continue;
            }
            let Some(file_name) = item.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if is_untracked(&file_name) {
                continue;
            }
            if let Some(entry) = store.stat(&file_name)? {
                store.entries.write().insert(file_name, entry);
                scanned += 1;
            }
        }

        info!(
            root = %store.root.display(),
            entries = scanned,
            size = %ByteSize(store.total_size()),
            "Cache index built"
        );

        store.enforce_capacity();
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Whether the file is present on disk (the index may lag external changes)
    pub fn exists(&self, file_name: &str) -> bool {
        self.path_for(file_name).is_file()
    }

    pub fn get(&self, file_name: &str) -> Option<CacheEntry> {
        self.entries.read().get(file_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.read().values().map(|entry| entry.size).sum()
    }

    /// Snapshot of all entries, oldest first
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.entries.read().values().cloned().collect();
        entries.sort_by_key(|entry| entry.last_modified);
        entries
    }

    /// Stat `file_name`, insert or refresh its entry, then run a capacity pass
    ///
    /// Returns `false` when the file is not on disk; any stale entry is dropped.
    pub fn track(&self, file_name: &str) -> Result<bool> {
        let Some(entry) = self.stat(file_name)? else {
            self.entries.write().remove(file_name);
            return Ok(false);
        };

        debug!(file_name, size = entry.size, "Tracking cache entry");
        self.entries.write().insert(file_name.to_string(), entry);
        self.enforce_capacity();
        Ok(true)
    }

    /// Reset the idle clock of a cache hit (file mtime and entry)
    pub fn touch(&self, file_name: &str) -> Result<bool> {
        let path = self.path_for(file_name);
        match fs::File::options().write(true).open(&path) {
            Ok(file) => file.set_modified(SystemTime::now())?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.entries.write().remove(file_name);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }
        self.track(file_name)
    }

    /// Delete oldest entries until the total is below the limit or nothing is left
    ///
    /// Returns the number of entries removed. Disabled when the limit is 0.
    pub fn enforce_capacity(&self) -> usize {
        let max = self.max_size.as_u64();
        if max == 0 {
            return 0;
        }

        let mut entries = self.entries.write();
        let mut total: u64 = entries.values().map(|entry| entry.size).sum();
        if total < max {
            return 0;
        }

        let mut oldest: Vec<(String, DateTime<Utc>, u64)> = entries
            .values()
            .map(|entry| (entry.file_name.clone(), entry.last_modified, entry.size))
            .collect();
        oldest.sort_by_key(|(_, last_modified, _)| *last_modified);

        let mut removed = 0usize;
        for (file_name, _, size) in oldest {
            if total < max {
                break;
            }
            self.delete_file(&file_name);
            entries.remove(&file_name);
            total = total.saturating_sub(size);
            removed += 1;
        }

        info!(
            removed,
            size = %ByteSize(total),
            limit = %self.max_size,
            "Capacity eviction pass complete"
        );
        self.metrics.evicted(removed);
        removed
    }

    /// Delete every entry whose last modification is older than `max_idle`
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let cutoff = Utc::now() - max_idle;

        let mut entries = self.entries.write();
        let stale: Vec<String> = entries
            .values()
            .filter(|entry| entry.last_modified < cutoff)
            .map(|entry| entry.file_name.clone())
            .collect();

        for file_name in &stale {
            self.delete_file(file_name);
            entries.remove(file_name);
        }

        if !stale.is_empty() {
            info!(removed = stale.len(), "Idle eviction pass complete");
        }
        self.metrics.evicted(stale.len());
        stale.len()
    }

    fn stat(&self, file_name: &str) -> Result<Option<CacheEntry>> {
        let metadata = match fs::metadata(self.path_for(file_name)) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(CacheEntry {
            file_name: file_name.to_string(),
            size: metadata.len(),
            last_modified: DateTime::<Utc>::from(metadata.modified()?),
        }))
    }

    fn delete_file(&self, file_name: &str) {
        match fs::remove_file(self.path_for(file_name)) {
            Ok(()) => debug!(file_name, "Evicted cache file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(file_name, error = %e, "Failed to delete cache file"),
        }
    }
}

fn is_untracked(file_name: &str) -> bool {
    file_name == INDEX_FILE || file_name.starts_with(TEMP_FILE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_aged(root: &Path, name: &str, size: usize, age: Duration) {
        let path = root.join(name);
        fs::write(&path, vec![0u8; size]).unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn hours(n: u64) -> Duration {
        Duration::from_secs(n * 3600)
    }

    fn open(root: &Path, max: u64) -> CacheStore {
        CacheStore::open(root, ByteSize(max), Arc::new(Metrics::new())).unwrap()
    }

    #[test]
    fn test_open_scans_and_skips_untracked() {
        let temp_dir = TempDir::new().unwrap();
        write_aged(temp_dir.path(), "a.mp4", 10, hours(1));
        write_aged(temp_dir.path(), "b.webm", 20, hours(2));
        write_aged(temp_dir.path(), INDEX_FILE, 5, hours(1));
        write_aged(temp_dir.path(), "_tempVideo.mp4", 5, hours(1));
        fs::create_dir(temp_dir.path().join("nested")).unwrap();

        let store = open(temp_dir.path(), 0);

        assert_eq!(store.len(), 2);
        assert_eq!(store.total_size(), 30);
        assert_eq!(store.entries()[0].file_name, "b.webm");
    }

    #[test]
    fn test_track_missing_file_drops_entry() {
        let temp_dir = TempDir::new().unwrap();
        write_aged(temp_dir.path(), "a.mp4", 10, hours(1));
        let store = open(temp_dir.path(), 0);

        fs::remove_file(temp_dir.path().join("a.mp4")).unwrap();
        assert!(!store.track("a.mp4").unwrap());
        assert!(store.get("a.mp4").is_none());
    }

    #[test]
    fn test_track_evicts_oldest_until_under_limit() {
        let temp_dir = TempDir::new().unwrap();
        write_aged(temp_dir.path(), "old.mp4", 100, hours(3));
        write_aged(temp_dir.path(), "mid.mp4", 100, hours(2));
        let store = open(temp_dir.path(), 250);
        assert_eq!(store.len(), 2);

        write_aged(temp_dir.path(), "new.mp4", 100, Duration::ZERO);
        assert!(store.track("new.mp4").unwrap());

        assert!(store.total_size() < 250);
        assert!(store.get("old.mp4").is_none());
        assert!(!temp_dir.path().join("old.mp4").exists());
        assert!(store.get("mid.mp4").is_some());
        assert!(store.get("new.mp4").is_some());
    }

    #[test]
    fn test_capacity_limit_is_inclusive() {
        let temp_dir = TempDir::new().unwrap();
        write_aged(temp_dir.path(), "a.mp4", 100, hours(2));
        write_aged(temp_dir.path(), "b.mp4", 100, hours(1));

        // total == max must still evict
        let store = open(temp_dir.path(), 200);
        assert_eq!(store.len(), 1);
        assert!(store.get("b.mp4").is_some());
    }

    #[test]
    fn test_oversized_write_evicts_itself() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(temp_dir.path(), 50);

        write_aged(temp_dir.path(), "huge.mp4", 100, Duration::ZERO);
        assert!(store.track("huge.mp4").unwrap());

        assert!(store.is_empty());
        assert!(!temp_dir.path().join("huge.mp4").exists());
    }

    #[test]
    fn test_zero_limit_disables_capacity_eviction() {
        let temp_dir = TempDir::new().unwrap();
        write_aged(temp_dir.path(), "a.mp4", 1000, hours(1));
        let store = open(temp_dir.path(), 0);

        assert_eq!(store.enforce_capacity(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evict_idle_respects_touch() {
        let temp_dir = TempDir::new().unwrap();
        write_aged(temp_dir.path(), "stale.mp4", 10, hours(5));
        write_aged(temp_dir.path(), "hot.mp4", 10, hours(5));
        write_aged(temp_dir.path(), "fresh.mp4", 10, Duration::from_secs(60));
        let store = open(temp_dir.path(), 0);

        assert!(store.touch("hot.mp4").unwrap());
        let removed = store.evict_idle(hours(1));

        assert_eq!(removed, 1);
        assert!(store.get("stale.mp4").is_none());
        assert!(!temp_dir.path().join("stale.mp4").exists());
        assert!(store.get("hot.mp4").is_some());
        assert!(store.get("fresh.mp4").is_some());
    }

    #[test]
    fn test_touch_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(temp_dir.path(), 0);
        assert!(!store.touch("nope.mp4").unwrap());
    }
}
