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
# Test utilities for sorrel.

Two levels of testing are supported:

* handler level: [`TestConn`] builds a synthetic request, runs it
  through any [`Handler`][sorrel::Handler], and exposes the response
  side for assertions — no sockets, no executor beyond `block_on`;
* wire level: [`TestTransport`] is an in-memory duplex pair, and
  [`test_transport_session`] drives a real session loop over it, so
  pipelining, keep-alive, and upgrade behavior are observable as raw
  bytes.

```rust
use sorrel_testing::{assert_ok, TestConn};

let handler = |conn: sorrel::Conn| async move { conn.ok("hello") };
assert_ok!(TestConn::get("/").on(&handler), "hello");
```
*/

mod test_transport;
pub use test_transport::TestTransport;

mod test_conn;
pub use test_conn::TestConn;

mod session;
pub use session::{test_transport_session, SessionTask};

mod assertions;

pub use futures_lite::future::block_on;

/// Spawn a future on the shared test executor.
pub fn spawn<F>(future: F) -> async_global_executor::Task<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    async_global_executor::spawn(future)
}
