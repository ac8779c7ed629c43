use futures_lite::future::block_on;
use sorrel::{BoxedTransport, Conn, Handler, Method, Status};
use sorrel_http::Synthetic;
use std::fmt::{self, Debug, Formatter};

/// A synthetic request, run through a handler without any transport
/// I/O, wrapping the resulting [`Conn`] for assertions.
///
/// Build with [`TestConn::get`] and friends, add request headers,
/// then [`TestConn::on`] a handler. The response accessors panic if
/// the conn has not been run yet; this is a testing crate, and a
/// panic is the assertion failing.
pub struct TestConn(State);

enum State {
    Pending(sorrel_http::Conn<Synthetic>),
    Ran(Conn),
}

impl Debug for TestConn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            State::Pending(conn) => f.debug_tuple("TestConn::Pending").field(conn).finish(),
            State::Ran(conn) => f.debug_tuple("TestConn::Ran").field(conn).finish(),
        }
    }
}

macro_rules! test_conn_method {
    ($fn_name:ident, $method:ident) => {
        #[doc = concat!("build a ", stringify!($method), " test conn")]
        pub fn $fn_name(target: &str) -> Self {
            Self::build(Method::$method, target, "")
        }
    };
}

impl TestConn {
    /// build a test conn with an arbitrary method and body; the
    /// target may include a query string
    pub fn build(method: Method, target: &str, body: impl Into<Vec<u8>>) -> Self {
        Self(State::Pending(sorrel_http::Conn::new_synthetic(
            method, target, body,
        )))
    }

    test_conn_method!(get, Get);
    test_conn_method!(post, Post);
    test_conn_method!(put, Put);
    test_conn_method!(delete, Delete);
    test_conn_method!(patch, Patch);

    /// append a request header; only callable before the conn runs
    #[must_use]
    pub fn with_request_header(
        self,
        name: impl Into<sorrel::HeaderName>,
        value: impl Into<String>,
    ) -> Self {
        match self.0 {
            State::Pending(conn) => {
                Self(State::Pending(conn.with_request_header(name, value)))
            }
            State::Ran(_) => panic!("request headers are immutable once the conn has run"),
        }
    }

    /// run this conn through the handler, synchronously
    pub fn on(self, handler: &impl Handler) -> Self {
        block_on(self.run_async(handler))
    }

    /// run this conn through the handler, including its
    /// `before_send` pass
    pub async fn run_async(self, handler: &impl Handler) -> Self {
        let conn: Conn = match self.0 {
            State::Pending(conn) => conn
                .map_transport(|t| Box::new(t) as BoxedTransport)
                .into(),
            State::Ran(conn) => conn,
        };

        let conn = handler.run(conn).await;
        let conn = handler.before_send(conn).await;
        Self(State::Ran(conn))
    }

    fn conn(&self) -> &Conn {
        match &self.0 {
            State::Ran(conn) => conn,
            State::Pending(_) => panic!("run the test conn through a handler first"),
        }
    }

    /// the response status, if the handler set one
    pub fn status(&self) -> Option<Status> {
        self.conn().status()
    }

    /// was this conn halted by some handler?
    pub fn is_halted(&self) -> bool {
        self.conn().is_halted()
    }

    /// the in-memory response body, lossily decoded; empty when no
    /// body was set
    pub fn body_string(&self) -> String {
        self.conn()
            .inner()
            .response_body()
            .and_then(|body| body.static_bytes())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    /// a response header value
    pub fn response_header(&self, name: impl Into<sorrel::HeaderName>) -> Option<&str> {
        self.conn().response_headers().get(name)
    }

    /// unwrap into the facade conn; only callable after the conn has
    /// run
    pub fn into_conn(self) -> Conn {
        match self.0 {
            State::Ran(conn) => conn,
            State::Pending(_) => panic!("run the test conn through a handler first"),
        }
    }
}

impl From<Conn> for TestConn {
    fn from(conn: Conn) -> Self {
        Self(State::Ran(conn))
    }
}
