use crate::{Buffer, Conn, Headers, Method, ResponseHeaders, ServerConfig, StateSet, Version};
use futures_lite::{AsyncRead, AsyncWrite};
use std::{
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Instant,
};
use swansong::Swansong;

/// An in-memory transport for tests and synthetic conns.
///
/// Reads drain a fixed input script and then signal end-of-stream;
/// writes accumulate into a shared capture that the test inspects
/// afterwards. Clones share both sides.
#[derive(Clone, Debug, Default)]
pub struct Synthetic(Arc<Mutex<SyntheticInner>>);

#[derive(Debug, Default)]
struct SyntheticInner {
    input: Vec<u8>,
    read_position: usize,
    written: Vec<u8>,
}

impl Synthetic {
    /// a transport that will replay `input` and then report eof
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self(Arc::new(Mutex::new(SyntheticInner {
            input: input.into(),
            read_position: 0,
            written: Vec::new(),
        })))
    }

    /// snapshot of everything written to this transport so far
    pub fn written(&self) -> Vec<u8> {
        self.0.lock().map(|inner| inner.written.clone()).unwrap_or_default()
    }

    /// snapshot of the written bytes, lossily decoded for assertions
    pub fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }
}

impl AsyncRead for Synthetic {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let mut inner = self.0.lock().map_err(|_| io::ErrorKind::Other)?;
        let available = inner.input.len() - inner.read_position;
        let bytes = available.min(buf.len());
        let start = inner.read_position;
        buf[..bytes].copy_from_slice(&inner.input[start..start + bytes]);
        inner.read_position += bytes;
        Poll::Ready(Ok(bytes))
    }
}

impl AsyncWrite for Synthetic {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut inner = self.0.lock().map_err(|_| io::ErrorKind::Other)?;
        inner.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Conn<Synthetic> {
    /// Construct a conn without any transport I/O, for testing
    /// handlers in isolation. The target may include a query string.
    pub fn new_synthetic(
        method: Method,
        target: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        let raw_target = target.into();
        let (path, query) = match raw_target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (raw_target.clone(), String::new()),
        };

        let mut response_headers = ResponseHeaders::new();
        response_headers.append(crate::KnownHeaderName::Server, crate::SERVER);

        Self {
            method,
            path,
            query,
            raw_target,
            version: Version::Http1_1,
            request_headers: Headers::new(),
            request_body: body.into(),
            status: None,
            reason: None,
            response_headers,
            response_body: None,
            sent: false,
            bytes_sent: 0,
            state: StateSet::new(),
            transport: Synthetic::default(),
            buffer: Buffer::new(),
            server_config: Arc::new(ServerConfig::new()),
            swansong: Swansong::new(),
            peer_ip: None,
            secure: false,
            start_time: Instant::now(),
        }
    }

    /// append a request header to a synthetic conn
    pub fn with_request_header(
        mut self,
        name: impl Into<crate::HeaderName>,
        value: impl Into<String>,
    ) -> Self {
        self.request_headers.append(name, value);
        self
    }
}
