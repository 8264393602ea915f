//! On-disk cache of raw event batches, one file per (season, week).
//!
//! Filenames are content-addressed: the first 8 bytes of
//! SHA-256("espn-events-{season}-{week}") in lowercase hex, suffixed
//! `.json`. Writes are plain last-write-wins; keys are single-writer
//! within a process.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::wire::Event;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode cached events: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    /// Negative: entries never expire. Zero: entries are always stale.
    /// Positive: maximum age in seconds, measured against file mtime.
    expiry_secs: i64,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, expiry_secs: i64) -> Self {
        Self {
            dir: dir.into(),
            expiry_secs,
        }
    }

    fn cache_path(&self, season: i32, week: i32) -> PathBuf {
        let digest = Sha256::digest(format!("espn-events-{season}-{week}").as_bytes());
        let mut name = String::with_capacity(21);
        for byte in &digest[..8] {
            name.push_str(&format!("{byte:02x}"));
        }
        name.push_str(".json");
        self.dir.join(name)
    }

    fn is_expired(&self, mtime: SystemTime) -> bool {
        if self.expiry_secs < 0 {
            return false;
        }
        if self.expiry_secs == 0 {
            return true;
        }
        let age = SystemTime::now()
            .duration_since(mtime)
            .unwrap_or(Duration::ZERO);
        age > Duration::from_secs(self.expiry_secs as u64)
    }

    /// Look up the cached batch for a week. Misses on absence, on expiry
    /// (deleting the stale file) and on decode failure (leaving the file for
    /// the next write to overwrite).
    pub fn get(&self, season: i32, week: i32) -> Option<Vec<Event>> {
        let path = self.cache_path(season, week);
        let metadata = fs::metadata(&path).ok()?;
        let mtime = metadata.modified().ok()?;

        if self.is_expired(mtime) {
            log::debug!("cache entry {} expired, removing", path.display());
            let _ = fs::remove_file(&path);
            return None;
        }

        let body = fs::read(&path).ok()?;
        match serde_json::from_slice(&body) {
            Ok(events) => Some(events),
            Err(e) => {
                log::warn!("failed to decode cache entry {}: {e}", path.display());
                None
            }
        }
    }

    pub fn set(&self, season: i32, week: i32, events: &[Event]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;
        let path = self.cache_path(season, week);
        let body = serde_json::to_vec(events)?;
        fs::write(&path, body).map_err(|source| CacheError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Sweep expired entries out of the cache directory. Subdirectories are
    /// skipped; a missing directory is a no-op.
    pub fn clear_expired(&self) -> Result<(), CacheError> {
        self.sweep(|cache, path| {
            let Ok(metadata) = fs::metadata(path) else {
                return false;
            };
            let Ok(mtime) = metadata.modified() else {
                return false;
            };
            cache.is_expired(mtime)
        })
    }

    /// Remove every file in the cache directory, leaving subdirectories.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        self.sweep(|_, _| true)
    }

    fn sweep(&self, should_remove: impl Fn(&Self, &Path) -> bool) -> Result<(), CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.display().to_string(),
                    source,
                });
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if should_remove(self, &path) {
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("failed to remove cache entry {}: {e}", path.display());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pickem-cache-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn sample_events() -> Vec<Event> {
        vec![Event {
            id: Some("401".to_string()),
            name: Some("Dallas Cowboys at Philadelphia Eagles".to_string()),
            date: Some("2025-09-04T17:00Z".to_string()),
            competitions: None,
        }]
    }

    #[test]
    fn set_then_get_within_expiry_hits() {
        let dir = temp_dir("hit");
        let cache = FileCache::new(&dir, 300);
        let events = sample_events();

        cache.set(2025, 1, &events).unwrap();
        let cached = cache.get(2025, 1).expect("fresh entry should hit");
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id.as_deref(), Some("401"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn distinct_weeks_use_distinct_files() {
        let dir = temp_dir("keys");
        let cache = FileCache::new(&dir, -1);
        cache.set(2025, 1, &sample_events()).unwrap();
        cache.set(2025, 2, &[]).unwrap();

        assert_eq!(cache.get(2025, 1).unwrap().len(), 1);
        assert_eq!(cache.get(2025, 2).unwrap().len(), 0);
        assert_ne!(cache.cache_path(2025, 1), cache.cache_path(2025, 2));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_expiry_is_always_stale_and_deletes_the_file() {
        let dir = temp_dir("stale");
        let cache = FileCache::new(&dir, 0);
        cache.set(2025, 1, &sample_events()).unwrap();

        assert!(cache.get(2025, 1).is_none());
        assert!(!cache.cache_path(2025, 1).exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn negative_expiry_never_expires() {
        let dir = temp_dir("never");
        let cache = FileCache::new(&dir, -1);
        cache.set(2025, 1, &sample_events()).unwrap();
        assert!(cache.get(2025, 1).is_some());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn decode_failure_misses_but_leaves_the_file() {
        let dir = temp_dir("decode");
        let cache = FileCache::new(&dir, 300);
        fs::create_dir_all(&dir).unwrap();
        let path = cache.cache_path(2025, 1);
        fs::write(&path, b"{corrupt").unwrap();

        assert!(cache.get(2025, 1).is_none());
        assert!(path.exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn clear_all_removes_files_but_skips_subdirectories() {
        let dir = temp_dir("clear");
        let cache = FileCache::new(&dir, -1);
        cache.set(2025, 1, &sample_events()).unwrap();
        let subdir = dir.join("keep");
        fs::create_dir_all(&subdir).unwrap();

        cache.clear_all().unwrap();
        assert!(cache.get(2025, 1).is_none());
        assert!(subdir.exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn clear_expired_on_missing_directory_is_a_noop() {
        let cache = FileCache::new(temp_dir("missing"), 300);
        assert!(cache.clear_expired().is_ok());
    }

    #[test]
    fn clear_expired_keeps_fresh_entries() {
        let dir = temp_dir("fresh");
        let cache = FileCache::new(&dir, 300);
        cache.set(2025, 1, &sample_events()).unwrap();

        cache.clear_expired().unwrap();
        assert!(cache.get(2025, 1).is_some());

        let _ = fs::remove_dir_all(&dir);
    }
}
