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
# Welcome to sorrel!

sorrel is an embeddable http/1.1 server core. An application is a
[`Handler`]; handlers receive a [`Conn`] representing one
request-response cycle, mutate its response side, and return it.
Middleware and endpoints are the same thing: an ordered [`Stack`] of
handlers, each of which may short-circuit the remainder by halting.

```rust,no_run
fn main() {
    sorrel::config()
        .with_port(8080)
        .run(|conn: sorrel::Conn| async move {
            conn.ok("hello from sorrel")
        });
}
```

Routing, typed parameter binding, jwt resolution, static file
serving, and websocket handoff are layered on this crate by its
sibling crates; everything here is deliberately protocol-shaped
rather than application-shaped.
*/

mod conn;
pub use conn::Conn;

mod handler;
pub use handler::{Handler, Stack};

mod info;
pub use info::Info;

#[macro_use]
mod macros;

mod server;
pub use server::{config, handle_transport, ServerHandle, ServerOptions, TcpKeepaliveOptions};

pub use async_trait::async_trait;
pub use sorrel_http::{
    transport::BoxedTransport, Body, Error, HeaderName, Headers, HttpConfig, KnownHeaderName,
    Method, ResponseHeaders, Result, ServerConfig, StateSet, Status, Swansong, Version,
};

/// A transport-erased protocol upgrade, as handed to
/// [`Handler::upgrade`].
pub type Upgrade = sorrel_http::Upgrade<BoxedTransport>;
