use crate::{cache::CacheEntry, FileCache, StaticOptions};
use futures_lite::StreamExt;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use sorrel::{async_trait, conn_unwrap, Body, Conn, Handler, Info, KnownHeaderName, Method, Status};
use sorrel_http::forms::percent_decode;
use std::{
    fmt::{self, Debug, Formatter},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Serves a filesystem subtree under a url prefix. See the crate docs
/// for an overview.
pub struct StaticFileHandler {
    fs_root: PathBuf,
    url_prefix: String,
    options: StaticOptions,
    cache: Arc<FileCache>,
    watcher: Option<RecommendedWatcher>,
}

impl Debug for StaticFileHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticFileHandler")
            .field("fs_root", &self.fs_root)
            .field("url_prefix", &self.url_prefix)
            .field("options", &self.options)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}

enum Resolved {
    File(PathBuf, std::fs::Metadata),
    Dir(PathBuf),
}

impl StaticFileHandler {
    /// Serve `fs_root` under `url_prefix` with default options. The
    /// root is canonicalized at [`init`][Handler::init]; requests
    /// before that resolve against the path as given.
    pub fn new(fs_root: impl AsRef<Path>, url_prefix: &str) -> Self {
        Self {
            fs_root: fs_root.as_ref().to_path_buf(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            options: StaticOptions::default(),
            cache: Arc::new(FileCache::new()),
            watcher: None,
        }
    }

    /// replace the options
    pub fn with_options(mut self, options: StaticOptions) -> Self {
        self.options = options;
        self
    }

    fn prefix_stripped<'path>(&self, path: &'path str) -> Option<&'path str> {
        let rest = path.strip_prefix(self.url_prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    async fn resolve(&self, decoded: &str) -> Option<Resolved> {
        let mut file_path = self.fs_root.clone();
        for segment in Path::new(decoded) {
            match segment.to_str()? {
                "/" | "." => {}
                ".." => {
                    file_path.pop();
                }
                other => file_path.push(other),
            }
        }

        let canonical = async_fs::canonicalize(&file_path).await.ok()?;
        if !path_within_root(&canonical, &self.fs_root) {
            log::debug!("{} resolved outside the root; rejecting", decoded);
            return None;
        }

        let metadata = async_fs::metadata(&canonical).await.ok()?;
        if metadata.is_dir() {
            Some(Resolved::Dir(canonical))
        } else if metadata.is_file() {
            Some(Resolved::File(canonical, metadata))
        } else {
            None
        }
    }

    async fn serve_file(
        &self,
        mut conn: Conn,
        fs_path: PathBuf,
        metadata: std::fs::Metadata,
    ) -> Conn {
        let len = metadata.len();
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        let etag = weak_etag(len, modified);

        if self.options.etag {
            if let Some(if_none_match) = conn.request_headers().get(KnownHeaderName::IfNoneMatch)
            {
                if etag_matches(if_none_match, &etag) {
                    return conn
                        .with_header(KnownHeaderName::Etag, etag)
                        .with_status(Status::NotModified)
                        .halt();
                }
            }
        }

        if self.options.modified {
            if let Some(since) = conn
                .request_headers()
                .get(KnownHeaderName::IfModifiedSince)
                .and_then(|value| httpdate::parse_http_date(value).ok())
            {
                // second precision: truncate the file mtime before
                // comparing
                if truncate_to_seconds(modified) <= since {
                    return conn.with_status(Status::NotModified).halt();
                }
            }
        }

        let content_type = content_type_for(&fs_path);

        let cacheable =
            self.options.cache_ttl.is_some() && len <= self.options.max_cached_file_bytes;

        let body = if cacheable {
            match self.cached_body(&fs_path, &etag, &content_type, modified).await {
                Some(body) => body,
                None => return not_found(conn),
            }
        } else {
            match async_fs::File::open(&fs_path).await {
                Ok(file) => Body::new_file(file, len),
                Err(error) => {
                    log::debug!("could not open {}: {error}", fs_path.display());
                    return not_found(conn);
                }
            }
        };

        conn.response_headers_mut()
            .try_insert(KnownHeaderName::ContentType, content_type);
        if self.options.etag {
            conn.response_headers_mut()
                .try_insert(KnownHeaderName::Etag, etag);
        }
        if self.options.modified {
            conn.response_headers_mut().try_insert(
                KnownHeaderName::LastModified,
                httpdate::fmt_http_date(modified),
            );
        }

        conn.with_status(Status::Ok).with_body(body).halt()
    }

    async fn cached_body(
        &self,
        fs_path: &Path,
        etag: &str,
        content_type: &str,
        modified: SystemTime,
    ) -> Option<Body> {
        if let Some(entry) = self.cache.get(fs_path) {
            // the etag double-checks that the entry still describes
            // the file on disk, in case a watcher event was missed
            if entry.etag == etag {
                return Some(Body::new_shared(entry.data.clone()));
            }
            self.cache.invalidate(fs_path);
        }

        let data: Arc<[u8]> = async_fs::read(fs_path).await.ok()?.into();
        let entry = CacheEntry {
            data: data.clone(),
            content_type: content_type.to_string(),
            etag: etag.to_string(),
            last_modified: modified,
            expires: self.options.cache_ttl.map(|ttl| Instant::now() + ttl),
        };
        self.cache.insert(
            fs_path.to_path_buf(),
            entry,
            self.options.max_cache_bytes,
            self.options.max_cache_entries,
        );

        Some(Body::new_shared(data))
    }

    async fn serve_dir(&self, conn: Conn, dir: PathBuf) -> Conn {
        if let Some(index) = self.options.index_file.clone() {
            let index_path = dir.join(index);
            if let Ok(metadata) = async_fs::metadata(&index_path).await {
                if metadata.is_file() {
                    return self.serve_file(conn, index_path, metadata).await;
                }
            }
        }

        if !self.options.auto_index {
            return not_found(conn);
        }

        let listing = match self.cache.get_listing(&dir) {
            Some(listing) => listing,
            None => {
                let Some(listing) = render_listing(&dir, conn.path()).await else {
                    return not_found(conn);
                };
                self.cache.insert_listing(
                    dir.clone(),
                    listing.clone(),
                    self.options.cache_ttl.map(|ttl| Instant::now() + ttl),
                );
                listing
            }
        };

        conn.with_header(KnownHeaderName::ContentType, "text/html; charset=utf-8")
            .with_status(Status::Ok)
            .with_body(listing)
            .halt()
    }
}

#[async_trait]
impl Handler for StaticFileHandler {
    async fn init(&mut self, _info: &mut Info) {
        match self.fs_root.canonicalize() {
            Ok(canonical) => self.fs_root = canonical,
            Err(error) => {
                log::error!(
                    "could not canonicalize {}: {error}; continuing anyway",
                    self.fs_root.display()
                );
                return;
            }
        }
        log::info!("serving files within {:?}", self.fs_root);

        let cache = self.cache.clone();
        let watcher = notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for path in &event.paths {
                        cache.invalidate(path);
                    }
                }
                Err(error) => {
                    // a watcher that errors may have dropped events;
                    // nothing cached can be trusted anymore
                    log::warn!("filesystem watcher error: {error}; clearing cache");
                    cache.clear();
                }
            },
        );

        match watcher {
            Ok(mut watcher) => match watcher.watch(&self.fs_root, RecursiveMode::Recursive) {
                Ok(()) => self.watcher = Some(watcher),
                Err(error) => log::warn!("could not watch {:?}: {error}", self.fs_root),
            },
            Err(error) => log::warn!("could not start filesystem watcher: {error}"),
        }
    }

    async fn run(&self, conn: Conn) -> Conn {
        if !matches!(conn.method(), Method::Get | Method::Head) {
            return conn;
        }

        let rel = conn_unwrap!(self.prefix_stripped(conn.path()), conn);
        let decoded = percent_decode(rel, false);

        match self.resolve(&decoded).await {
            Some(Resolved::File(path, metadata)) => self.serve_file(conn, path, metadata).await,
            Some(Resolved::Dir(path)) => self.serve_dir(conn, path).await,
            None => not_found(conn),
        }
    }
}

fn not_found(conn: Conn) -> Conn {
    conn.with_status(Status::NotFound)
        .with_body(Status::NotFound.canonical_reason())
        .halt()
}

// .net-style 100ns ticks keep the validator stable across processes
// while staying cheap to compute
fn weak_etag(len: u64, modified: SystemTime) -> String {
    let ticks = modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() / 100)
        .unwrap_or_default();
    format!("W/\"{len}-{ticks}\"")
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.trim() == "*"
        || if_none_match
            .split(',')
            .any(|candidate| candidate.trim() == etag)
}

fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => UNIX_EPOCH + Duration::from_secs(elapsed.as_secs()),
        Err(_) => time,
    }
}

fn content_type_for(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

async fn render_listing(dir: &Path, url_path: &str) -> Option<String> {
    let mut entries = async_fs::read_dir(dir).await.ok()?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next().await {
        let entry = entry.ok()?;
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.ok()?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    let mut html = String::with_capacity(256 + names.len() * 64);
    html.push_str("<!doctype html>\n<html><head><title>Index of ");
    html.push_str(url_path);
    html.push_str("</title></head>\n<body><h1>Index of ");
    html.push_str(url_path);
    html.push_str("</h1>\n<ul>\n");
    for name in names {
        html.push_str("<li><a href=\"");
        html.push_str(&name);
        html.push_str("\">");
        html.push_str(&name);
        html.push_str("</a></li>\n");
    }
    html.push_str("</ul>\n</body></html>\n");
    Some(html)
}

#[cfg(unix)]
fn path_within_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

#[cfg(not(unix))]
fn path_within_root(path: &Path, root: &Path) -> bool {
    let path = path.to_string_lossy().to_lowercase();
    let root = root.to_string_lossy().to_lowercase();
    path.starts_with(&root)
}
