#![forbid(unsafe_code)]
#![deny(
    clippy::dbg_macro,
    missing_copy_implementations,
    rustdoc::missing_crate_level_docs,
    missing_docs,
    nonstandard_style,
    unused_qualifications
)]

/*!
# Routing for sorrel.

A [`Router`] dispatches each conn to the most specific registered
route for its method and path:

1. an exact-path table is consulted first,
2. then pattern routes, ranked by specificity (the summed character
   count of their literal segments), first-registered winning ties,
3. then the fallback handler, if one is registered,
4. and an unmatched conn passes through untouched, which the server
   finalizes as a plain-text 404.

Patterns are slash-delimited segments: a literal, `:name` capturing
one segment, `:name*` capturing the decoded remainder (slashes
included), or `*` matching any one segment without capturing.

```rust
use sorrel_router::{Router, RouterConnExt};

let router = Router::new()
    .get("/", |conn: sorrel::Conn| async move { conn.ok("index") })
    .get("/pages/:name", |conn: sorrel::Conn| async move {
        let name = conn.route_param("name").unwrap_or_default().to_string();
        conn.ok(format!("page {name}"))
    })
    .fallback(|conn: sorrel::Conn| async move {
        conn.with_status(404).with_body("custom not found").halt()
    });
# let _ = router;
```
*/

mod route_spec;
pub use route_spec::{RouteSpec, RouteValues};

mod router;
pub use router::Router;

mod router_conn_ext;
pub use router_conn_ext::RouterConnExt;
