use crate::{Conn, Headers, Method, StateSet};
use futures_lite::{AsyncRead, AsyncWrite};
use std::fmt::{self, Debug, Formatter};

/// The result of a transport ownership handoff.
///
/// Once a handler answers `101 Switching Protocols`, the session loop
/// stops parsing http and surrenders the raw transport here, along
/// with any bytes that had already been read past the end of the
/// upgrading request. The protocol layer that requested the upgrade
/// (for sorrel, the websocket handshake) owns the stream from now on.
pub struct Upgrade<Transport> {
    /// the headers of the request that upgraded
    pub request_headers: Headers,
    /// the path of the request that upgraded
    pub path: String,
    /// the method of the request that upgraded
    pub method: Method,
    /// per-request state carried across the handoff
    pub state: StateSet,
    /// the raw transport
    pub transport: Transport,
    /// bytes read from the transport but never parsed
    pub buffer: Option<Vec<u8>>,
}

impl<Transport> Upgrade<Transport> {
    /// the request headers
    pub fn headers(&self) -> &Headers {
        &self.request_headers
    }

    /// the request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// the request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// the per-request state
    pub fn state(&self) -> &StateSet {
        &self.state
    }

    /// apply a transport mapping function, usually for boxing
    pub fn map_transport<T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static>(
        self,
        f: impl Fn(Transport) -> T,
    ) -> Upgrade<T> {
        Upgrade {
            request_headers: self.request_headers,
            path: self.path,
            method: self.method,
            state: self.state,
            transport: f(self.transport),
            buffer: self.buffer,
        }
    }
}

impl<Transport> Debug for Upgrade<Transport> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgrade")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("request_headers", &self.request_headers)
            .field(
                "buffer",
                &self.buffer.as_deref().map(String::from_utf8_lossy),
            )
            .finish()
    }
}

impl<Transport> From<Conn<Transport>> for Upgrade<Transport>
where
    Transport: crate::transport::Transport,
{
    fn from(conn: Conn<Transport>) -> Self {
        conn.into_upgrade()
    }
}
