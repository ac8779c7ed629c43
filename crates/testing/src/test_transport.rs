use futures_lite::{AsyncRead, AsyncWrite};
use std::{
    fmt::{self, Debug, Formatter},
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll, Waker},
};

/// One end of an in-memory duplex connection.
///
/// [`TestTransport::new`] returns both ends; bytes written to either
/// become readable from the other, and closing one end is observed as
/// end-of-stream by its peer. The server end is handed to a session
/// loop while the test drives the client end.
#[derive(Clone, Default)]
pub struct TestTransport {
    read: Arc<CloseableCursor>,
    write: Arc<CloseableCursor>,
}

impl Debug for TestTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestTransport")
            .field("read", &*self.read)
            .field("write", &*self.write)
            .finish()
    }
}

impl TestTransport {
    /// construct a connected pair
    pub fn new() -> (TestTransport, TestTransport) {
        let a = Arc::new(CloseableCursor::default());
        let b = Arc::new(CloseableCursor::default());

        (
            TestTransport {
                read: a.clone(),
                write: b.clone(),
            },
            TestTransport { read: b, write: a },
        )
    }

    /// synchronously write bytes, waking the peer
    pub fn write_all(&self, bytes: impl AsRef<[u8]>) {
        self.write.append(bytes.as_ref());
    }

    /// close this end; the peer reads end-of-stream once it drains
    pub fn close(&self) {
        self.write.close();
    }

    /// wait until content is available, then take everything
    /// currently readable
    pub async fn read_available(&self) -> Vec<u8> {
        self.read.read_available().await
    }

    /// [`TestTransport::read_available`], lossily decoded
    pub async fn read_available_string(&self) -> String {
        String::from_utf8_lossy(&self.read_available().await).into_owned()
    }

    /// everything ever written by the peer, without consuming it
    pub fn snapshot(&self) -> Vec<u8> {
        self.read.snapshot()
    }
}

impl AsyncRead for TestTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        self.read.poll_read(cx, buf)
    }
}

impl AsyncWrite for TestTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(self.write.append(buf)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.write.close();
        Poll::Ready(Ok(()))
    }
}

#[derive(Default)]
struct CursorInner {
    data: Vec<u8>,
    cursor: usize,
    waker: Option<Waker>,
    closed: bool,
}

#[derive(Default)]
struct CloseableCursor(Mutex<CursorInner>);

impl Debug for CloseableCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.lock() {
            Ok(inner) => f
                .debug_struct("CloseableCursor")
                .field("len", &inner.data.len())
                .field("cursor", &inner.cursor)
                .field("closed", &inner.closed)
                .finish(),
            Err(_) => f.write_str("CloseableCursor(poisoned)"),
        }
    }
}

impl CloseableCursor {
    fn append(&self, bytes: &[u8]) -> usize {
        let Ok(mut inner) = self.0.lock() else {
            return 0;
        };
        if inner.closed {
            return 0;
        }
        inner.data.extend_from_slice(bytes);
        if let Some(waker) = inner.waker.take() {
            waker.wake();
        }
        bytes.len()
    }

    fn close(&self) {
        if let Ok(mut inner) = self.0.lock() {
            inner.closed = true;
            if let Some(waker) = inner.waker.take() {
                waker.wake();
            }
        }
    }

    fn snapshot(&self) -> Vec<u8> {
        self.0.lock().map(|inner| inner.data.clone()).unwrap_or_default()
    }

    fn poll_read(&self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        let mut inner = self.0.lock().map_err(|_| io::ErrorKind::Other)?;
        if inner.cursor < inner.data.len() {
            let bytes = buf.len().min(inner.data.len() - inner.cursor);
            let start = inner.cursor;
            buf[..bytes].copy_from_slice(&inner.data[start..start + bytes]);
            inner.cursor += bytes;
            Poll::Ready(Ok(bytes))
        } else if inner.closed {
            Poll::Ready(Ok(0))
        } else {
            inner.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }

    async fn read_available(&self) -> Vec<u8> {
        std::future::poll_fn(|cx| {
            let mut inner = match self.0.lock() {
                Ok(inner) => inner,
                Err(_) => return Poll::Ready(Vec::new()),
            };

            if inner.cursor < inner.data.len() {
                let available = inner.data[inner.cursor..].to_vec();
                inner.cursor = inner.data.len();
                Poll::Ready(available)
            } else if inner.closed {
                Poll::Ready(Vec::new())
            } else {
                inner.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;

    #[test]
    fn round_trip() {
        let (client, server) = TestTransport::new();
        client.write_all(b"ping");
        assert_eq!(block_on(server.read_available()), b"ping");
        server.write_all(b"pong");
        assert_eq!(block_on(client.read_available_string()), "pong");
    }

    #[test]
    fn close_is_observed_as_eof() {
        use futures_lite::AsyncReadExt;
        let (client, mut server) = TestTransport::new();
        client.close();
        let mut buf = [0u8; 8];
        assert_eq!(block_on(server.read(&mut buf)).unwrap(), 0);
    }
}
