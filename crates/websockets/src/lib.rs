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
# Websocket handshakes for sorrel.

This crate performs the rfc 6455 server handshake and hands the raw
transport to the embedding application; it deliberately does not speak
the frame protocol. The [`WebSocket`] handler answers a well-formed
upgrade request with `101 Switching Protocols`, after which the
session loop stops parsing http and surrenders the transport as a
[`sorrel::Upgrade`] — any bytes the client sent early ride along in
its buffer.

```rust
use sorrel_websockets::websocket;

let handler = websocket(|upgrade: sorrel::Upgrade| async move {
    // the raw transport is yours now; speak rfc 6455 frames over
    // upgrade.transport, seeded with upgrade.buffer
    let _ = upgrade;
});
# let _ = handler;
```
*/

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha1::{Digest, Sha1};
use sorrel::{
    async_trait, Conn, Handler,
    KnownHeaderName::{
        Connection, SecWebsocketAccept, SecWebsocketKey, SecWebsocketProtocol,
        SecWebsocketVersion, Upgrade as UpgradeHeader,
    },
    Status, Upgrade,
};
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
};

const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Receives the transport after a successful handshake. Blanket
/// implemented for async closures.
#[async_trait]
pub trait UpgradeHandler: Send + Sync + 'static {
    /// Take ownership of the upgraded transport. Dropping it
    /// disconnects the client.
    async fn handle(&self, upgrade: Upgrade);
}

#[async_trait]
impl<Fun, Fut> UpgradeHandler for Fun
where
    Fun: Fn(Upgrade) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, upgrade: Upgrade) {
        (self)(upgrade).await;
    }
}

/// Builds a [`WebSocket`] handler from the provided upgrade handler.
pub fn websocket<H: UpgradeHandler>(handler: H) -> WebSocket<H> {
    WebSocket::new(handler)
}

/**
The websocket handshake handler.

On a request carrying `Connection: upgrade`, `Upgrade: websocket`, a
`Sec-WebSocket-Key`, and version 13, it answers 101 with the computed
`Sec-WebSocket-Accept` and claims the transport; anything else passes
through untouched (or is answered `426 Upgrade Required` when
[`WebSocket::required`] is set).
*/
pub struct WebSocket<H> {
    handler: H,
    protocols: Vec<String>,
    required: bool,
}

impl<H> Debug for WebSocket<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("protocols", &self.protocols)
            .field("required", &self.required)
            .finish()
    }
}

struct IsWebsocket;

impl<H: UpgradeHandler> WebSocket<H> {
    /// build a handshake handler that hands transports to `handler`
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            protocols: Vec::new(),
            required: false,
        }
    }

    /// `protocols` is the set of subprotocols this server speaks; on
    /// handshake, the first client-offered protocol in this set is
    /// echoed back
    pub fn with_protocols(mut self, protocols: &[&str]) -> Self {
        self.protocols = protocols.iter().map(ToString::to_string).collect();
        self
    }

    /// answer `426 Upgrade Required` instead of passing through when
    /// a request is not a websocket handshake
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn negotiated_protocol(&self, conn: &Conn) -> Option<String> {
        conn.request_headers()
            .get(SecWebsocketProtocol)
            .and_then(|offered| {
                offered
                    .split(',')
                    .map(str::trim)
                    .find(|offered| self.protocols.iter().any(|known| known == offered))
                    .map(String::from)
            })
    }
}

#[async_trait]
impl<H: UpgradeHandler> Handler for WebSocket<H> {
    async fn run(&self, mut conn: Conn) -> Conn {
        if !upgrade_requested(&conn) {
            if self.required {
                return conn.with_status(Status::UpgradeRequired).halt();
            }
            return conn;
        }

        if !conn
            .request_headers()
            .eq_ignore_ascii_case(SecWebsocketVersion, "13")
        {
            return conn
                .with_header(SecWebsocketVersion, "13")
                .with_status(Status::BadRequest)
                .halt();
        }

        let Some(key) = conn.request_headers().get(SecWebsocketKey) else {
            return conn.with_status(Status::BadRequest).halt();
        };
        let accept = websocket_accept_hash(key);

        let protocol = self.negotiated_protocol(&conn);

        let headers = conn.response_headers_mut();
        headers.insert(UpgradeHeader, "websocket");
        headers.insert(Connection, "Upgrade");
        headers.insert(SecWebsocketAccept, accept);
        if let Some(protocol) = protocol {
            headers.insert(SecWebsocketProtocol, protocol);
        }

        conn.with_state(IsWebsocket)
            .with_status(Status::SwitchingProtocols)
            .halt()
    }

    fn has_upgrade(&self, upgrade: &Upgrade) -> bool {
        upgrade.state().contains::<IsWebsocket>()
    }

    async fn upgrade(&self, upgrade: Upgrade) {
        log::debug!("websocket transport handed off for {}", upgrade.path());
        self.handler.handle(upgrade).await;
    }
}

fn connection_is_upgrade(conn: &Conn) -> bool {
    conn.request_headers().contains_token(Connection, "upgrade")
}

fn upgrade_to_websocket(conn: &Conn) -> bool {
    conn.request_headers()
        .eq_ignore_ascii_case(UpgradeHeader, "websocket")
}

fn upgrade_requested(conn: &Conn) -> bool {
    connection_is_upgrade(conn) && upgrade_to_websocket(conn)
}

/// The `Sec-WebSocket-Accept` hash for a `Sec-WebSocket-Key`: the
/// base64 of the sha-1 of the key concatenated with the rfc 6455
/// guid.
pub fn websocket_accept_hash(websocket_key: &str) -> String {
    let hash = Sha1::new()
        .chain_update(websocket_key)
        .chain_update(WEBSOCKET_GUID)
        .finalize();
    BASE64.encode(&hash[..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;
    use pretty_assertions::assert_eq;
    use sorrel::{BoxedTransport, Method};
    use sorrel_http::Synthetic;

    const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
    const SAMPLE_ACCEPT: &str = "s3pLPLOaEZzKYpkterzC1AeSseVM0o4=";

    fn handshake_conn() -> sorrel_http::Conn<Synthetic> {
        sorrel_http::Conn::new_synthetic(Method::Get, "/ws", "")
            .with_request_header(Connection, "keep-alive, Upgrade")
            .with_request_header(UpgradeHeader, "websocket")
            .with_request_header(SecWebsocketVersion, "13")
            .with_request_header(SecWebsocketKey, SAMPLE_KEY)
    }

    fn run(handler: &WebSocket<impl UpgradeHandler>, conn: sorrel_http::Conn<Synthetic>) -> Conn {
        block_on(handler.run(conn.map_transport(|t| Box::new(t) as BoxedTransport).into()))
    }

    fn noop() -> WebSocket<impl UpgradeHandler> {
        websocket(|_upgrade: Upgrade| async move {})
    }

    #[test]
    fn rfc_6455_sample_accept_key() {
        assert_eq!(websocket_accept_hash(SAMPLE_KEY), SAMPLE_ACCEPT);
    }

    #[test]
    fn successful_handshake_answers_101() {
        let handler = noop();
        let conn = run(&handler, handshake_conn());

        assert_eq!(conn.status(), Some(Status::SwitchingProtocols));
        assert_eq!(
            conn.response_headers().get(SecWebsocketAccept),
            Some(SAMPLE_ACCEPT)
        );
        assert_eq!(conn.response_headers().get(UpgradeHeader), Some("websocket"));
        assert_eq!(conn.response_headers().get(Connection), Some("Upgrade"));
        assert!(conn.is_halted());
    }

    #[test]
    fn non_upgrade_requests_pass_through() {
        let handler = noop();
        let conn = run(
            &handler,
            sorrel_http::Conn::new_synthetic(Method::Get, "/ws", ""),
        );
        assert!(conn.status().is_none());
        assert!(!conn.is_halted());
    }

    #[test]
    fn required_mode_answers_426() {
        let handler = noop().required();
        let conn = run(
            &handler,
            sorrel_http::Conn::new_synthetic(Method::Get, "/ws", ""),
        );
        assert_eq!(conn.status(), Some(Status::UpgradeRequired));
    }

    #[test]
    fn missing_key_is_bad_request() {
        let handler = noop();
        let conn = run(
            &handler,
            sorrel_http::Conn::new_synthetic(Method::Get, "/ws", "")
                .with_request_header(Connection, "Upgrade")
                .with_request_header(UpgradeHeader, "websocket")
                .with_request_header(SecWebsocketVersion, "13"),
        );
        assert_eq!(conn.status(), Some(Status::BadRequest));
    }

    #[test]
    fn wrong_version_is_rejected_with_the_supported_version() {
        let handler = noop();
        let conn = run(
            &handler,
            sorrel_http::Conn::new_synthetic(Method::Get, "/ws", "")
                .with_request_header(Connection, "Upgrade")
                .with_request_header(UpgradeHeader, "websocket")
                .with_request_header(SecWebsocketVersion, "8")
                .with_request_header(SecWebsocketKey, SAMPLE_KEY),
        );
        assert_eq!(conn.status(), Some(Status::BadRequest));
        assert_eq!(conn.response_headers().get(SecWebsocketVersion), Some("13"));
    }

    #[test]
    fn subprotocol_negotiation_picks_the_first_known() {
        let handler = noop().with_protocols(&["chat.v2", "chat.v1"]);
        let conn = run(
            &handler,
            handshake_conn().with_request_header(SecWebsocketProtocol, "chat.v1, chat.v2"),
        );
        assert_eq!(
            conn.response_headers().get(SecWebsocketProtocol),
            Some("chat.v1")
        );
    }

    #[test]
    fn upgrade_ownership_is_claimed_via_state_marker() {
        let handler = noop();
        let conn = run(&handler, handshake_conn());
        assert!(conn.state().get::<IsWebsocket>().is_some());
    }
}
