use super::registry::SessionRegistry;
use sorrel_http::Swansong;
use std::sync::Arc;

/// A handle for observing and stopping a running server from
/// elsewhere: another task, a signal handler, a test.
///
/// Obtained from [`ServerOptions::handle`][crate::ServerOptions::handle]
/// before the server runs; cheap to clone.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    swansong: Swansong,
    registry: Arc<SessionRegistry>,
}

impl ServerHandle {
    pub(crate) fn new(swansong: Swansong, registry: Arc<SessionRegistry>) -> Self {
        Self { swansong, registry }
    }

    /// Gracefully stop the server: the listener closes immediately,
    /// no new connections are accepted, every registered session is
    /// told to finish its in-flight request, and this future resolves
    /// once the last one has drained.
    pub async fn stop(&self) {
        log::info!("shutting down");
        let completion = self.swansong.shut_down();
        self.registry.shut_down_all();
        completion.await;
    }

    /// Blocking variant of [`ServerHandle::stop`], for synchronous
    /// embedders.
    pub fn stop_blocking(&self) {
        log::info!("shutting down");
        let completion = self.swansong.shut_down();
        self.registry.shut_down_all();
        completion.block();
    }

    /// the number of live sessions
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// a clone of the server-wide shutdown handle
    pub fn swansong(&self) -> Swansong {
        self.swansong.clone()
    }
}
