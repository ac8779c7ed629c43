use crate::{BufferPool, Conn, ConnectionStatus, HttpConfig, Result, Upgrade};
use std::{future::Future, sync::Arc};
use swansong::{ShutdownCompletion, Swansong};

/// Shared configuration and context for an http server: the tunable
/// [`HttpConfig`], the server-wide [`Swansong`] used for graceful
/// shutdown, and the [`BufferPool`] sessions rent their parse buffers
/// from.
#[derive(Default, Debug)]
pub struct ServerConfig {
    http_config: HttpConfig,
    swansong: Swansong,
    buffer_pool: BufferPool,
}

impl ServerConfig {
    /// construct a default `ServerConfig`
    pub fn new() -> Self {
        Self::default()
    }

    /// construct a `ServerConfig` with the provided [`HttpConfig`]
    pub fn with_http_config(http_config: HttpConfig) -> Self {
        Self {
            http_config,
            ..Self::default()
        }
    }

    /// use the provided [`Swansong`] for server-wide shutdown instead
    /// of a fresh one
    pub fn with_swansong(mut self, swansong: Swansong) -> Self {
        self.swansong = swansong;
        self
    }

    /// the tunable http parameters
    pub fn http_config(&self) -> &HttpConfig {
        &self.http_config
    }

    /// mutate the tunable http parameters; only meaningful before any
    /// sessions are running
    pub fn http_config_mut(&mut self) -> &mut HttpConfig {
        &mut self.http_config
    }

    /// the server-wide graceful shutdown handle
    pub fn swansong(&self) -> &Swansong {
        &self.swansong
    }

    /// the shared parse buffer pool
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Begin graceful shutdown. Acceptors observe this immediately;
    /// sessions finish their in-flight request and then close. The
    /// returned [`ShutdownCompletion`] resolves when every session
    /// guard has dropped.
    pub fn shut_down(&self) -> ShutdownCompletion {
        self.swansong.shut_down()
    }

    /// Perform http on the provided transport, applying the handler
    /// function to every request parsed from it, until the client
    /// goes away, an error terminates the connection, or an upgrade
    /// takes the transport.
    ///
    /// The per-session `swansong` interrupts transport reads: the
    /// idle-timeout sweeper and server shutdown both act on a session
    /// by shutting it down, which lets an in-flight request finish
    /// while preventing any follow-up pipelined request.
    ///
    /// # Errors
    ///
    /// Returns an error when a request is irrecoverably malformed or
    /// the transport fails; the caller maps parse errors to their
    /// final status response.
    pub async fn run<Transport, Handler, Fut>(
        self: Arc<Self>,
        session_swansong: Swansong,
        transport: Transport,
        mut handler: Handler,
    ) -> Result<Option<Upgrade<Transport>>>
    where
        Transport: crate::transport::Transport,
        Handler: FnMut(Conn<Transport>) -> Fut,
        Fut: Future<Output = Conn<Transport>>,
    {
        let _guard = self.swansong.guard();
        let buffer = self
            .buffer_pool
            .check_out(self.http_config.request_buffer_initial_len);

        let mut conn =
            Conn::new_internal(self.clone(), session_swansong, transport, buffer).await?;

        loop {
            conn = match handler(conn).await.send().await? {
                ConnectionStatus::Upgrade(upgrade) => return Ok(Some(upgrade)),
                ConnectionStatus::Close => return Ok(None),
                ConnectionStatus::Conn(next) => next,
            }
        }
    }
}
