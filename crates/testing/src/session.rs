use crate::TestTransport;
use sorrel::{Handler, ServerConfig, Swansong, Upgrade};
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// A session loop running in the background over the server end of a
/// [`TestTransport`] pair. Await it (after closing the client end or
/// expecting an upgrade) to observe how the session ended.
pub struct SessionTask {
    task: async_global_executor::Task<sorrel::Result<Option<Upgrade>>>,
    swansong: Swansong,
}

impl Debug for SessionTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTask").finish_non_exhaustive()
    }
}

impl SessionTask {
    /// wait for the session loop to end
    pub async fn join(self) -> sorrel::Result<Option<Upgrade>> {
        self.task.await
    }

    /// the session's shutdown handle, as the idle sweeper or server
    /// stop would use it
    pub fn swansong(&self) -> Swansong {
        self.swansong.clone()
    }
}

/// Run a real session loop against `handler`, returning the client
/// end of the transport pair and the background session task.
///
/// Everything the server would put on the wire is readable from the
/// client end; pipelining, keep-alive, parse-error responses, and
/// upgrade handoffs all behave exactly as in production, minus the
/// sockets.
pub fn test_transport_session<H: Handler>(
    server_config: ServerConfig,
    handler: H,
) -> (TestTransport, SessionTask) {
    let (client, server) = TestTransport::new();
    let server_config = Arc::new(server_config);
    let swansong = Swansong::new();
    let session_swansong = swansong.clone();
    let handler = Arc::new(handler);

    let task = async_global_executor::spawn(async move {
        sorrel::handle_transport(server_config, session_swansong, server, &*handler).await
    });

    (client, SessionTask { task, swansong })
}
