use std::time::Duration;

/// Behavior knobs for a [`StaticFileHandler`][crate::StaticFileHandler].
#[derive(Debug, Clone)]
pub struct StaticOptions {
    pub(crate) index_file: Option<String>,
    pub(crate) auto_index: bool,
    pub(crate) cache_ttl: Option<Duration>,
    pub(crate) max_cached_file_bytes: u64,
    pub(crate) max_cache_bytes: u64,
    pub(crate) max_cache_entries: usize,
    pub(crate) etag: bool,
    pub(crate) modified: bool,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            index_file: None,
            auto_index: false,
            cache_ttl: Some(Duration::from_secs(60)),
            max_cached_file_bytes: 1024 * 1024,
            max_cache_bytes: 64 * 1024 * 1024,
            max_cache_entries: 1024,
            etag: true,
            modified: true,
        }
    }
}

impl StaticOptions {
    /// the default document served for a directory url
    pub fn with_index_file(mut self, index_file: &str) -> Self {
        self.index_file = Some(index_file.to_string());
        self
    }

    /// render an html listing for directories with no default
    /// document
    pub fn with_auto_index(mut self) -> Self {
        self.auto_index = true;
        self
    }

    /// How long a cached entry stays fresh. `None` disables the
    /// cache entirely; the watcher usually invalidates sooner.
    pub fn with_cache_ttl(mut self, cache_ttl: Option<Duration>) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Files larger than this are streamed from disk and never
    /// cached.
    pub fn with_max_cached_file_bytes(mut self, max_cached_file_bytes: u64) -> Self {
        self.max_cached_file_bytes = max_cached_file_bytes;
        self
    }

    /// total byte budget for the cache
    pub fn with_max_cache_bytes(mut self, max_cache_bytes: u64) -> Self {
        self.max_cache_bytes = max_cache_bytes;
        self
    }

    /// maximum number of cached entries
    pub fn with_max_cache_entries(mut self, max_cache_entries: usize) -> Self {
        self.max_cache_entries = max_cache_entries;
        self
    }

    /// do not emit an ETag header
    pub fn without_etag_header(mut self) -> Self {
        self.etag = false;
        self
    }

    /// do not emit a Last-Modified header
    pub fn without_modified_header(mut self) -> Self {
        self.modified = false;
        self
    }
}
