use hashbrown::HashMap;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Instant, SystemTime},
};

/// One cached file.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub(crate) data: Arc<[u8]>,
    pub(crate) content_type: String,
    pub(crate) etag: String,
    pub(crate) last_modified: SystemTime,
    pub(crate) expires: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    pub(crate) fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<PathBuf, CacheEntry>,
    total_bytes: u64,
}

/// The in-memory file and directory-listing cache.
///
/// Eviction is best-effort: expired entries go first, then arbitrary
/// ones, until the total byte budget and entry count both fit. A
/// single lock guards each map and is held only for lookup and
/// eviction math, never across file I/O.
#[derive(Debug, Default)]
pub(crate) struct FileCache {
    files: Mutex<CacheInner>,
    listings: Mutex<HashMap<PathBuf, (String, Option<Instant>)>>,
}

impl FileCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, path: &Path) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut inner = self.files.lock().ok()?;

        if inner.entries.get(path).is_some_and(|e| e.is_expired(now)) {
            if let Some(removed) = inner.entries.remove(path) {
                inner.total_bytes -= removed.len();
            }
            return None;
        }

        inner.entries.get(path).cloned()
    }

    pub(crate) fn insert(
        &self,
        path: PathBuf,
        entry: CacheEntry,
        max_total_bytes: u64,
        max_entries: usize,
    ) {
        if entry.len() > max_total_bytes || max_entries == 0 {
            return;
        }

        let Ok(mut inner) = self.files.lock() else {
            return;
        };

        if let Some(previous) = inner.entries.remove(&path) {
            inner.total_bytes -= previous.len();
        }

        let now = Instant::now();
        while inner.entries.len() + 1 > max_entries
            || inner.total_bytes + entry.len() > max_total_bytes
        {
            let victim = inner
                .entries
                .iter()
                .find(|(_, e)| e.is_expired(now))
                .or_else(|| inner.entries.iter().next())
                .map(|(path, _)| path.clone());

            match victim {
                Some(victim) => {
                    if let Some(removed) = inner.entries.remove(&victim) {
                        inner.total_bytes -= removed.len();
                    }
                }
                None => break,
            }
        }

        inner.total_bytes += entry.len();
        inner.entries.insert(path, entry);
    }

    pub(crate) fn get_listing(&self, path: &Path) -> Option<String> {
        let now = Instant::now();
        let mut listings = self.listings.lock().ok()?;

        match listings.get(path) {
            Some((_, Some(expires))) if *expires <= now => {
                listings.remove(path);
                None
            }
            Some((listing, _)) => Some(listing.clone()),
            None => None,
        }
    }

    pub(crate) fn insert_listing(&self, path: PathBuf, listing: String, expires: Option<Instant>) {
        if let Ok(mut listings) = self.listings.lock() {
            listings.insert(path, (listing, expires));
        }
    }

    /// Drop the entry for this path and the auto-index listing of its
    /// parent directory.
    pub(crate) fn invalidate(&self, path: &Path) {
        if let Ok(mut inner) = self.files.lock() {
            if let Some(removed) = inner.entries.remove(path) {
                inner.total_bytes -= removed.len();
            }
        }

        if let Ok(mut listings) = self.listings.lock() {
            listings.remove(path);
            if let Some(parent) = path.parent() {
                listings.remove(parent);
            }
        }
    }

    /// Drop everything. Used when the filesystem watcher reports an
    /// error, at which point nothing cached can be trusted.
    pub(crate) fn clear(&self) {
        if let Ok(mut inner) = self.files.lock() {
            inner.entries.clear();
            inner.total_bytes = 0;
        }
        if let Ok(mut listings) = self.listings.lock() {
            listings.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.files.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn total_bytes(&self) -> u64 {
        self.files.lock().map(|inner| inner.total_bytes).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bytes: &[u8]) -> CacheEntry {
        CacheEntry {
            data: bytes.to_vec().into(),
            content_type: "text/plain".into(),
            etag: "W/\"x\"".into(),
            last_modified: SystemTime::now(),
            expires: None,
        }
    }

    #[test]
    fn byte_budget_evicts() {
        let cache = FileCache::new();
        cache.insert("/a".into(), entry(&[0; 60]), 100, 10);
        cache.insert("/b".into(), entry(&[0; 60]), 100, 10);
        assert_eq!(cache.len(), 1);
        assert!(cache.total_bytes() <= 100);
    }

    #[test]
    fn entry_count_evicts() {
        let cache = FileCache::new();
        cache.insert("/a".into(), entry(b"a"), 1024, 2);
        cache.insert("/b".into(), entry(b"b"), 1024, 2);
        cache.insert("/c".into(), entry(b"c"), 1024, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_entries_miss() {
        let cache = FileCache::new();
        let mut e = entry(b"stale");
        e.expires = Some(Instant::now() - std::time::Duration::from_secs(1));
        cache.insert("/a".into(), e, 1024, 10);
        assert!(cache.get(Path::new("/a")).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn invalidate_removes_entry_and_parent_listing() {
        let cache = FileCache::new();
        cache.insert("/dir/file".into(), entry(b"data"), 1024, 10);
        cache.insert_listing("/dir".into(), "<html></html>".into(), None);
        cache.invalidate(Path::new("/dir/file"));
        assert!(cache.get(Path::new("/dir/file")).is_none());
        assert!(cache.get_listing(Path::new("/dir")).is_none());
    }

    #[test]
    fn replacing_an_entry_keeps_the_byte_count_straight() {
        let cache = FileCache::new();
        cache.insert("/a".into(), entry(&[0; 50]), 1024, 10);
        cache.insert("/a".into(), entry(&[0; 10]), 1024, 10);
        assert_eq!(cache.total_bytes(), 10);
    }
}
