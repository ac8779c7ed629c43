use super::registry::ActivityTracker;
use futures_lite::{AsyncRead, AsyncWrite};
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

/// Wraps a session's transport, ticking its registry activity cell
/// whenever bytes actually move, so the idle sweeper measures real
/// transport idleness rather than wall time since accept.
#[derive(Debug)]
pub(crate) struct TrackedTransport<T> {
    transport: T,
    activity: ActivityTracker,
}

impl<T> TrackedTransport<T> {
    pub(crate) fn new(transport: T, activity: ActivityTracker) -> Self {
        Self { transport, activity }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for TrackedTransport<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.transport).poll_read(cx, buf);
        if let Poll::Ready(Ok(bytes)) = &poll {
            if *bytes > 0 {
                self.activity.touch();
            }
        }
        poll
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for TrackedTransport<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.transport).poll_write(cx, buf);
        if let Poll::Ready(Ok(bytes)) = &poll {
            if *bytes > 0 {
                self.activity.touch();
            }
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.transport).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.transport).poll_close(cx)
    }
}
