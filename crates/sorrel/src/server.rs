mod handle;
mod registry;
mod tracked_transport;

pub use handle::ServerHandle;

use crate::{conn::finalize_unhandled, Conn, Handler, HttpConfig, Info};
use async_net::{TcpListener, TcpStream};
use registry::SessionRegistry;
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use sorrel_http::{transport::BoxedTransport, Error, ServerConfig, Swansong, SERVER};
use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};
use tracked_transport::TrackedTransport;

/// Entrypoint for configuring and running a sorrel server.
///
/// ```rust,no_run
/// sorrel::config()
///     .with_port(8080)
///     .with_nodelay()
///     .run(|conn: sorrel::Conn| async move { conn.ok("hello") });
/// ```
pub fn config() -> ServerOptions {
    ServerOptions::new()
}

/// TCP keepalive probing parameters, applied to the listener socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpKeepaliveOptions {
    /// idle time before the first probe
    pub time: Option<Duration>,
    /// interval between probes
    pub interval: Option<Duration>,
    /// probes before the connection is presumed dead
    pub retries: Option<u32>,
}

/**
Configuration for a sorrel server: socket binding and options,
acceptor fan-out, the idle-session timeout, and the http limits.

Host and port default from the `HOST` and `PORT` environment
variables, then to `localhost:8080`. Configuration problems (an
unresolvable host, mutually exclusive socket options, a failing bind)
surface synchronously from [`ServerOptions::run_async`]; the server
refuses to start rather than limping.
*/
#[derive(Debug, Clone)]
pub struct ServerOptions {
    host: Option<String>,
    port: Option<u16>,
    listen_backlog: i32,
    reuse_address: bool,
    exclusive_address_use: bool,
    reuse_port: bool,
    dual_mode: bool,
    tcp_nodelay: bool,
    tcp_keepalive: Option<TcpKeepaliveOptions>,
    accept_per_core: bool,
    session_timeout: Option<Duration>,
    http_config: HttpConfig,
    swansong: Swansong,
    registry: Arc<SessionRegistry>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            listen_backlog: 1024,
            reuse_address: true,
            exclusive_address_use: false,
            reuse_port: false,
            dual_mode: false,
            tcp_nodelay: false,
            tcp_keepalive: None,
            accept_per_core: false,
            session_timeout: None,
            http_config: HttpConfig::default(),
            swansong: Swansong::new(),
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}

impl ServerOptions {
    /// build a default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// listen on this host or ip address. default: the `HOST`
    /// environment variable, or `localhost`
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.into());
        self
    }

    /// listen on this port. default: the `PORT` environment variable,
    /// or 8080
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// the listen(2) backlog. default 1024
    pub fn with_listen_backlog(mut self, listen_backlog: i32) -> Self {
        self.listen_backlog = listen_backlog;
        self
    }

    /// disable SO_REUSEADDR, which is set by default
    pub fn without_reuse_address(mut self) -> Self {
        self.reuse_address = false;
        self
    }

    /// request exclusive use of the bound address (windows only, and
    /// mutually exclusive with address reuse)
    pub fn with_exclusive_address_use(mut self) -> Self {
        self.exclusive_address_use = true;
        self
    }

    /// set SO_REUSEPORT so per-core acceptors can each bind their own
    /// listener (linux only; a no-op elsewhere)
    pub fn with_reuse_port(mut self) -> Self {
        self.reuse_port = true;
        self
    }

    /// accept both ipv6 and ipv4 on an ipv6 listener
    pub fn with_dual_mode(mut self) -> Self {
        self.dual_mode = true;
        self
    }

    /// set TCP_NODELAY on accepted connections
    pub fn with_nodelay(mut self) -> Self {
        self.tcp_nodelay = true;
        self
    }

    /// enable tcp keepalive probing with the provided parameters
    pub fn with_tcp_keepalive(mut self, keepalive: TcpKeepaliveOptions) -> Self {
        self.tcp_keepalive = Some(keepalive);
        self
    }

    /// spawn one acceptor task per logical cpu instead of a single
    /// one; combined with [`ServerOptions::with_reuse_port`] on
    /// linux, each acceptor gets its own listener socket
    pub fn with_accept_per_core(mut self) -> Self {
        self.accept_per_core = true;
        self
    }

    /// Close sessions with no transport activity for this long. The
    /// sweeper lets an in-flight request finish; it only prevents the
    /// session from parsing another. Disabled by default.
    pub fn with_session_timeout(mut self, session_timeout: Duration) -> Self {
        self.session_timeout = Some(session_timeout);
        self
    }

    /// use the provided http limits
    pub fn with_http_config(mut self, http_config: HttpConfig) -> Self {
        self.http_config = http_config;
        self
    }

    /// use the provided [`Swansong`] for shutdown control
    pub fn with_swansong(mut self, swansong: Swansong) -> Self {
        self.swansong = swansong;
        self
    }

    /// A handle that can stop this server from elsewhere: another
    /// task, a signal handler, a test.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(self.swansong.clone(), self.registry.clone())
    }

    /// Run the server on the current thread, blocking for its
    /// lifetime. Panics on configuration errors; use
    /// [`ServerOptions::run_async`] to handle them.
    pub fn run<H: Handler>(self, handler: H) {
        async_global_executor::block_on(async move {
            if let Err(error) = self.run_async(handler).await {
                panic!("sorrel server failed to start: {error}");
            }
        });
    }

    /// Bind, accept, and dispatch until stopped. Returns once
    /// graceful shutdown has drained every session.
    pub async fn run_async<H: Handler>(self, mut handler: H) -> io::Result<()> {
        self.validate()?;
        let addr = self.local_addr()?;

        let acceptor_count = if self.accept_per_core {
            std::thread::available_parallelism().map_or(1, usize::from)
        } else {
            1
        };
        let listener_per_acceptor =
            self.accept_per_core && self.reuse_port && cfg!(target_os = "linux");

        let mut listeners = Vec::with_capacity(acceptor_count);
        if listener_per_acceptor {
            for _ in 0..acceptor_count {
                listeners.push(TcpListener::try_from(self.build_listener(addr)?)?);
            }
        } else {
            let listener = TcpListener::try_from(self.build_listener(addr)?)?;
            listeners.extend((0..acceptor_count).map(|_| listener.clone()));
        }

        let local_addr = listeners[0].local_addr().ok();
        let mut info = Info::new(SERVER.into(), local_addr);
        handler.init(&mut info).await;
        log::info!("{info}");

        let server_config = Arc::new(
            ServerConfig::with_http_config(self.http_config).with_swansong(self.swansong.clone()),
        );
        let handler = Arc::new(handler);

        if let Some(timeout) = self.session_timeout {
            async_global_executor::spawn(sweep(
                self.swansong.clone(),
                self.registry.clone(),
                timeout,
            ))
            .detach();
        }

        let mut acceptors = Vec::with_capacity(acceptor_count);
        for listener in listeners {
            acceptors.push(async_global_executor::spawn(accept_loop(
                listener,
                self.clone(),
                server_config.clone(),
                handler.clone(),
            )));
        }

        for acceptor in acceptors {
            acceptor.await;
        }

        // listener closed; close remaining sessions and drain
        self.registry.shut_down_all();
        self.swansong.shut_down().await;
        Ok(())
    }

    fn validate(&self) -> io::Result<()> {
        if self.reuse_address && self.exclusive_address_use {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "reuse_address and exclusive_address_use are mutually exclusive",
            ));
        }
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        let host = self
            .host
            .clone()
            .or_else(|| std::env::var("HOST").ok())
            .unwrap_or_else(|| "localhost".into());

        let port = self
            .port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(8080);

        (host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("could not resolve {host}:{port}"),
                )
            })
    }

    fn build_listener(&self, addr: SocketAddr) -> io::Result<std::net::TcpListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

        if self.dual_mode && addr.is_ipv6() {
            socket.set_only_v6(false)?;
        }
        if self.reuse_address {
            socket.set_reuse_address(true)?;
        }
        #[cfg(windows)]
        if self.exclusive_address_use {
            socket.set_exclusiveaddruse(true)?;
        }
        #[cfg(target_os = "linux")]
        if self.reuse_port {
            socket.set_reuse_port(true)?;
        }

        if let Some(keepalive) = &self.tcp_keepalive {
            let mut params = TcpKeepalive::new();
            if let Some(time) = keepalive.time {
                params = params.with_time(time);
            }
            if let Some(interval) = keepalive.interval {
                params = params.with_interval(interval);
            }
            #[cfg(not(windows))]
            if let Some(retries) = keepalive.retries {
                params = params.with_retries(retries);
            }
            socket.set_tcp_keepalive(&params)?;
        }

        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(self.listen_backlog)?;
        Ok(socket.into())
    }
}

/// Perform http on one transport with this handler, exactly as the
/// server's session loop does: wrap each parsed request in a
/// [`Conn`], run the handler pipeline and its `before_send` pass,
/// finalize unhandled conns as 404s, and send. Returns when the
/// connection closes, fails, or upgrades.
///
/// This is the seam the server, tests, and custom embedders share.
///
/// # Errors
///
/// Propagates [`sorrel_http::Error`] from parsing or transport I/O;
/// parse errors have already been answered on the wire by the time
/// this returns.
pub async fn handle_transport<H: Handler>(
    server_config: Arc<ServerConfig>,
    session_swansong: Swansong,
    transport: impl sorrel_http::transport::Transport,
    handler: &H,
) -> sorrel_http::Result<Option<crate::Upgrade>> {
    let transport: BoxedTransport = Box::new(transport);
    server_config
        .run(session_swansong, transport, move |conn| async move {
            let conn = Conn::from(conn);
            let conn = handler.run(conn).await;
            let conn = handler.before_send(conn).await;
            finalize_unhandled(conn).into_inner()
        })
        .await
}

async fn sweep(swansong: Swansong, registry: Arc<SessionRegistry>, timeout: Duration) {
    let tick = timeout.min(Duration::from_secs(5)).max(Duration::from_millis(50));
    loop {
        if swansong
            .interrupt(async_io::Timer::after(tick))
            .await
            .is_none()
        {
            break;
        }

        let closed = registry.close_idle(timeout);
        if closed > 0 {
            log::debug!("idle sweeper closed {closed} sessions");
        }
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    options: ServerOptions,
    server_config: Arc<ServerConfig>,
    handler: Arc<H>,
) {
    loop {
        match options.swansong.interrupt(listener.accept()).await {
            None => break,
            Some(Ok((stream, peer_addr))) => {
                spawn_session(stream, peer_addr, &options, &server_config, &handler);
            }
            Some(Err(error)) => {
                log::warn!("accept error: {error}");
            }
        }
    }
}

fn spawn_session<H: Handler>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    options: &ServerOptions,
    server_config: &Arc<ServerConfig>,
    handler: &Arc<H>,
) {
    if options.tcp_nodelay {
        if let Err(error) = stream.set_nodelay(true) {
            log::warn!("could not set nodelay: {error}");
        }
    }

    let session_swansong = Swansong::new();
    let guard = options.registry.register(session_swansong.clone());
    let transport: BoxedTransport = Box::new(TrackedTransport::new(stream, guard.activity()));
    let server_config = server_config.clone();
    let handler = handler.clone();

    async_global_executor::spawn(async move {
        let peer_ip = peer_addr.ip();
        let run_handler = handler.clone();
        let result = server_config
            .run(session_swansong, transport, move |conn| {
                let handler = run_handler.clone();
                async move {
                    let mut conn = Conn::from(conn);
                    conn.inner_mut().set_peer_ip(Some(peer_ip));
                    let conn = handler.run(conn).await;
                    let conn = handler.before_send(conn).await;
                    finalize_unhandled(conn).into_inner()
                }
            })
            .await;
        drop(guard);

        match result {
            Ok(None) => {}
            Ok(Some(upgrade)) => {
                if handler.has_upgrade(&upgrade) {
                    handler.upgrade(upgrade).await;
                } else {
                    log::debug!("101 response with no upgrade handler; closing");
                }
            }
            Err(Error::Closed) => {}
            Err(Error::Io(error)) => log::debug!("session i/o error: {error}"),
            Err(error) => log::warn!("session ended: {error}"),
        }
    })
    .detach();
}
