#![forbid(unsafe_code)]
#![deny(
    clippy::dbg_macro,
    rustdoc::missing_crate_level_docs,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    unused_qualifications
)]

/*!
# Static file serving for sorrel.

[`StaticFileHandler`] serves a filesystem subtree under a url prefix,
with an in-memory cache, weak-etag and last-modified conditionals,
optional directory auto-indexing, and a filesystem watcher that
invalidates cache entries when files change underneath it.

```rust,no_run
use sorrel_static::{StaticFileHandler, StaticOptions};

let handler = StaticFileHandler::new("./public", "/assets").with_options(
    StaticOptions::default()
        .with_index_file("index.html")
        .with_auto_index(),
);
# let _ = handler;
```

Every decoded url is resolved against the canonical root; a resolved
path that escapes the root is a 404, never an error page that leaks
the filesystem layout.
*/

mod cache;
use cache::FileCache;

mod options;
pub use options::StaticOptions;

mod handler;
pub use handler::StaticFileHandler;
