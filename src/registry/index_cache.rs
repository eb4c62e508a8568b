//! On-disk cache for a registry's full package-name index.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Source of the current time, so expiry can be tested.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedIndex {
    ts: u64,
    names: Vec<String>,
}

pub struct IndexCache {
    path: PathBuf,
    ttl: Duration,
    clock: Box<dyn Clock>,
}

impl IndexCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            ttl,
            clock,
        }
    }

    /// `~/.cache/depdeck/<file_name>` (platform cache dir), if one exists.
    pub fn in_user_cache(file_name: &str, ttl: Duration) -> Option<Self> {
        let dir = dirs::cache_dir()?.join("depdeck");
        Some(Self::new(dir.join(file_name), ttl, Box::new(SystemClock)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached names, or `None` when missing, unreadable or older than the TTL.
    pub fn load(&self) -> Option<Vec<String>> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let cached: CachedIndex = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("Ignoring corrupt index cache {}: {e}", self.path.display());
                return None;
            }
        };
        let age = self.clock.now().saturating_sub(cached.ts);
        if age < self.ttl.as_secs() {
            Some(cached.names)
        } else {
            None
        }
    }

    pub fn store(&self, names: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let cached = CachedIndex {
            ts: self.clock.now(),
            names: names.to_vec(),
        };
        std::fs::write(&self.path, serde_json::to_string(&cached)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct FakeClock(Arc<AtomicU64>);

    impl Clock for FakeClock {
        fn now(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let dir = tempfile::TempDir::new().unwrap();
        let time = Arc::new(AtomicU64::new(1_000));
        let cache = IndexCache::new(
            dir.path().join("nested").join("index.json"),
            Duration::from_secs(60),
            Box::new(FakeClock(time.clone())),
        );

        assert_eq!(cache.load(), None);
        cache.store(&["flask".to_string(), "django".to_string()]).unwrap();
        assert_eq!(
            cache.load(),
            Some(vec!["flask".to_string(), "django".to_string()])
        );

        time.store(1_059, Ordering::SeqCst);
        assert!(cache.load().is_some());
        time.store(1_060, Ordering::SeqCst);
        assert_eq!(cache.load(), None);
    }

    #[test]
    fn test_corrupt_cache_is_a_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{ nope").unwrap();
        let cache = IndexCache::new(&path, Duration::from_secs(60), Box::new(SystemClock));
        assert_eq!(cache.load(), None);
    }
}
