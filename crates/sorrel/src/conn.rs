use crate::{BoxedTransport, Body, Method, StateSet, Status, Version};
use sorrel_http::{forms::QueryParams, Headers, KnownHeaderName, ResponseHeaders};
use std::fmt::{self, Debug, Formatter};

/// A single request-response cycle, as seen by handlers.
///
/// `Conn` wraps the core [`sorrel_http::Conn`] over a type-erased
/// transport and adds the one piece of bookkeeping the handler
/// pipeline needs: a halted flag that short-circuits the remaining
/// handlers.
pub struct Conn {
    inner: sorrel_http::Conn<BoxedTransport>,
    halted: bool,
}

impl Debug for Conn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("inner", &self.inner)
            .field("halted", &self.halted)
            .finish()
    }
}

impl From<sorrel_http::Conn<BoxedTransport>> for Conn {
    fn from(inner: sorrel_http::Conn<BoxedTransport>) -> Self {
        Self {
            inner,
            halted: false,
        }
    }
}

impl Conn {
    /// the request path, up to and excluding any query
    pub fn path(&self) -> &str {
        self.inner.path()
    }

    /// the request method
    pub fn method(&self) -> Method {
        self.inner.method()
    }

    /// the http version of the request
    pub fn http_version(&self) -> Version {
        self.inner.http_version()
    }

    /// the raw query string, without the leading `?`
    pub fn querystring(&self) -> &str {
        self.inner.querystring()
    }

    /// decoded query parameters, parsed on first use
    pub fn queries(&mut self) -> &QueryParams {
        if self.inner.state().get::<QueryParams>().is_none() {
            let params = QueryParams::parse(self.inner.querystring());
            self.inner.state_mut().insert(params);
        }
        self.inner
            .state()
            .get::<QueryParams>()
            .unwrap_or_else(|| unreachable!("query params were just inserted"))
    }

    /// the request headers
    pub fn request_headers(&self) -> &Headers {
        self.inner.request_headers()
    }

    /// the fully buffered request body
    pub fn request_body(&self) -> &[u8] {
        self.inner.request_body()
    }

    /// decoded cookie pairs from the Cookie header
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.inner.cookies()
    }

    /// the response status, if set
    pub fn status(&self) -> Option<Status> {
        self.inner.status()
    }

    /// set the response status
    pub fn set_status(&mut self, status: impl TryInto<Status>) {
        self.inner.set_status(status);
    }

    /// chainable [`Conn::set_status`]
    #[must_use]
    pub fn with_status(mut self, status: impl TryInto<Status>) -> Self {
        self.set_status(status);
        self
    }

    /// override the response reason phrase
    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.inner.set_reason(reason);
    }

    /// the response headers
    pub fn response_headers(&self) -> &ResponseHeaders {
        self.inner.response_headers()
    }

    /// mutable access to the response headers
    pub fn response_headers_mut(&mut self) -> &mut ResponseHeaders {
        self.inner.response_headers_mut()
    }

    /// chainable response header append
    #[must_use]
    pub fn with_header(
        mut self,
        name: impl Into<crate::HeaderName>,
        value: impl Into<String>,
    ) -> Self {
        self.inner.response_headers_mut().append(name, value);
        self
    }

    /// set the response body
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.inner.set_response_body(body);
    }

    /// chainable [`Conn::set_body`]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.set_body(body);
        self
    }

    /// remove and return the response body
    pub fn take_response_body(&mut self) -> Option<Body> {
        self.inner.take_response_body()
    }

    /// Halt with a 200 and the provided body. The most common way for
    /// a terminal handler to answer.
    #[must_use]
    pub fn ok(self, body: impl Into<Body>) -> Self {
        self.with_status(Status::Ok).with_body(body).halt()
    }

    /// Mark this conn halted: no subsequent handler in the pipeline
    /// will run for it.
    #[must_use]
    pub fn halt(mut self) -> Self {
        self.set_halted(true);
        self
    }

    /// set the halted flag
    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    /// has this conn been halted?
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// borrow the per-request state typemap
    pub fn state(&self) -> &StateSet {
        self.inner.state()
    }

    /// mutably borrow the per-request state typemap
    pub fn state_mut(&mut self) -> &mut StateSet {
        self.inner.state_mut()
    }

    /// chainable typed state insertion
    #[must_use]
    pub fn with_state<T: Send + Sync + 'static>(mut self, state: T) -> Self {
        self.state_mut().insert(state);
        self
    }

    /// remove and return typed state
    pub fn take_state<T: 'static>(&mut self) -> Option<T> {
        self.state_mut().take()
    }

    /// the remote ip address, if known
    pub fn peer_ip(&self) -> Option<std::net::IpAddr> {
        self.inner.peer_ip()
    }

    /// whether the transport is tls-protected (or trusted as such)
    pub fn is_secure(&self) -> bool {
        self.inner.is_secure()
    }

    /// a reference to the wrapped protocol-level conn
    pub fn inner(&self) -> &sorrel_http::Conn<BoxedTransport> {
        &self.inner
    }

    /// a mutable reference to the wrapped protocol-level conn
    pub fn inner_mut(&mut self) -> &mut sorrel_http::Conn<BoxedTransport> {
        &mut self.inner
    }

    /// unwrap into the protocol-level conn
    pub fn into_inner(self) -> sorrel_http::Conn<BoxedTransport> {
        self.inner
    }

    /// Is this request asking to switch protocols? True when the
    /// Connection header contains `upgrade` and an Upgrade header is
    /// present.
    pub fn upgrade_requested(&self) -> bool {
        self.request_headers()
            .contains_token(KnownHeaderName::Connection, "upgrade")
            && self.request_headers().has_header(KnownHeaderName::Upgrade)
    }
}

/// used by the server loop to finalize conns no handler answered
pub(crate) fn finalize_unhandled(mut conn: Conn) -> Conn {
    if conn.status().is_none() {
        conn.set_status(Status::NotFound);
        if conn.inner().response_body().is_none() {
            conn.response_headers_mut().try_insert(
                KnownHeaderName::ContentType,
                "text/plain; charset=utf-8",
            );
            conn.set_body(Status::NotFound.canonical_reason());
        }
    }
    conn
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorrel_http::{Conn as HttpConn, Method};

    fn synthetic(target: &str) -> Conn {
        HttpConn::new_synthetic(Method::Get, target, "")
            .map_transport(|t| Box::new(t) as BoxedTransport)
            .into()
    }

    #[test]
    fn path_excludes_the_query() {
        let conn = synthetic("/api/users/7?full=1");
        assert_eq!(conn.path(), "/api/users/7");
        assert_eq!(conn.querystring(), "full=1");
    }

    #[test]
    fn queries_are_parsed_lazily_and_cached() {
        let mut conn = synthetic("/search?Q=rust&page=2");
        assert_eq!(conn.queries().get("q"), Some("rust"));
        assert_eq!(conn.queries().get("PAGE"), Some("2"));
    }

    #[test]
    fn ok_halts_with_status_and_body() {
        let conn = synthetic("/").ok("hello");
        assert!(conn.is_halted());
        assert_eq!(conn.status(), Some(Status::Ok));
        assert_eq!(
            conn.inner().response_body().and_then(|b| b.static_bytes()),
            Some(&b"hello"[..])
        );
    }
}
