use crate::{
    copy,
    parser::{self, ParsedRequest},
    Body, Buffer, ConnectionStatus, Error, Headers, HttpConfig,
    KnownHeaderName::{Connection, ContentLength, Date, Server, SetCookie},
    Method, ResponseHeaders, Result, ServerConfig, StateSet, Status, Upgrade, Version,
};
use futures_lite::io::{AsyncReadExt, AsyncWriteExt};
use std::{
    fmt::{self, Debug, Formatter},
    io::Write,
    net::IpAddr,
    sync::Arc,
    time::{Instant, SystemTime},
};
use swansong::Swansong;

/// Default Server header
pub const SERVER: &str = concat!("sorrel/", env!("CARGO_PKG_VERSION"));

/// A single request-response cycle on a connection.
///
/// This struct unifies the parsed request record, the response under
/// construction, and the transport the response will be written to.
/// The request side (method, path, headers, body) is fully populated
/// before a `Conn` exists and is immutable from then on; the response
/// side is freely composable until the send, which happens at most
/// once. Pipelining hands the transport and the parse buffer from one
/// `Conn` to the next.
pub struct Conn<Transport> {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) raw_target: String,
    pub(crate) version: Version,
    pub(crate) request_headers: Headers,
    pub(crate) request_body: Vec<u8>,
    pub(crate) status: Option<Status>,
    pub(crate) reason: Option<String>,
    pub(crate) response_headers: ResponseHeaders,
    pub(crate) response_body: Option<Body>,
    pub(crate) sent: bool,
    pub(crate) bytes_sent: u64,
    pub(crate) state: StateSet,
    pub(crate) transport: Transport,
    pub(crate) buffer: Buffer,
    pub(crate) server_config: Arc<ServerConfig>,
    pub(crate) swansong: Swansong,
    pub(crate) peer_ip: Option<IpAddr>,
    pub(crate) secure: bool,
    pub(crate) start_time: Instant,
}

impl<Transport> Debug for Conn<Transport> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("method", &self.method)
            .field("raw_target", &self.raw_target)
            .field("version", &self.version)
            .field("request_headers", &self.request_headers)
            .field("status", &self.status)
            .field("response_headers", &self.response_headers)
            .field("response_body", &self.response_body)
            .field("sent", &self.sent)
            .field("peer_ip", &self.peer_ip)
            .field("secure", &self.secure)
            .finish()
    }
}

impl<Transport> Conn<Transport>
where
    Transport: crate::transport::Transport,
{
    pub(crate) async fn new_internal(
        server_config: Arc<ServerConfig>,
        swansong: Swansong,
        mut transport: Transport,
        mut buffer: Buffer,
    ) -> Result<Self> {
        let config = *server_config.http_config();

        let request = match Self::read_one_request(&config, &swansong, &mut transport, &mut buffer)
            .await
        {
            Ok(request) => request,
            Err(error) => {
                Self::answer_parse_error(&mut transport, &error).await;
                return Err(error);
            }
        };
        let start_time = Instant::now();

        let ParsedRequest {
            method,
            path,
            query,
            raw_target,
            version,
            headers: request_headers,
            body: request_body,
            ..
        } = request;

        let mut response_headers = ResponseHeaders::new();
        response_headers.append(Server, SERVER);

        Ok(Self {
            method,
            path,
            query,
            raw_target,
            version,
            request_headers,
            request_body,
            status: None,
            reason: None,
            response_headers,
            response_body: None,
            sent: false,
            bytes_sent: 0,
            state: StateSet::new(),
            transport,
            buffer,
            server_config,
            swansong,
            peer_ip: None,
            secure: false,
            start_time,
        })
    }

    async fn read_one_request(
        config: &HttpConfig,
        swansong: &Swansong,
        transport: &mut Transport,
        buffer: &mut Buffer,
    ) -> Result<ParsedRequest> {
        loop {
            if let Some(request) = parser::try_parse(buffer, config)? {
                buffer.ignore_front(request.consumed);
                return Ok(request);
            }

            let spare = buffer
                .spare_mut(config.receive_buffer_len, config.buffer_ceiling())
                .ok_or(Error::BadRequest("request larger than buffer ceiling"))?;

            let bytes = swansong
                .interrupt(transport.read(spare))
                .await
                .ok_or(Error::Closed)??;

            if bytes == 0 {
                return if buffer.is_empty() {
                    Err(Error::Closed)
                } else {
                    Err(Error::BadRequest("connection closed mid-request"))
                };
            }

            buffer.commit(bytes);
        }
    }

    /// Parse errors are answered with a short plain-text response
    /// before the connection closes; transport failures during the
    /// answer are irrelevant because the connection is closing either
    /// way.
    async fn answer_parse_error(transport: &mut Transport, error: &Error) {
        let Some(status) = error.response_status() else {
            return;
        };

        let reason = status.canonical_reason();
        let response = format!(
            "HTTP/1.1 {} {reason}\r\nServer: {SERVER}\r\nContent-Type: text/plain; \
             charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reason}",
            status as u16,
            reason.len(),
        );

        let _ = transport.write_all(response.as_bytes()).await;
        let _ = transport.flush().await;
    }

    /// Write the response to the transport and decide what happens to
    /// the connection next.
    ///
    /// A response is sent at most once; a second call on the same
    /// request cycle fails with [`Error::ResponseAlreadySent`] without
    /// touching the transport, so two competing senders cannot
    /// interleave bytes on the wire.
    pub async fn send(mut self) -> Result<ConnectionStatus<Transport>> {
        if self.sent {
            return Err(Error::ResponseAlreadySent);
        }
        self.sent = true;

        let status = self.status.unwrap_or(Status::NotFound);
        let mut head = Vec::with_capacity(self.server_config.http_config().response_buffer_len);

        write!(
            head,
            "{} {} {}\r\n",
            self.version,
            status as u16,
            self.reason.as_deref().unwrap_or(status.canonical_reason())
        )?;

        self.finalize_headers();

        log::trace!(
            "sending:\n{} {}\n{:?}",
            self.version,
            status,
            &self.response_headers
        );

        for (name, value) in self.response_headers.iter() {
            write!(head, "{name}: {value}\r\n")?;
        }
        write!(head, "\r\n")?;

        let head_len = head.len() as u64;
        self.transport.write_all(&head).await?;

        let mut body_len = 0;
        if self.method != Method::Head
            && !matches!(
                self.status,
                Some(Status::NotModified | Status::NoContent | Status::SwitchingProtocols)
            )
        {
            if let Some(body) = self.response_body.take() {
                let loops_per_yield = self.server_config.http_config().copy_loops_per_yield;
                body_len = match body.static_bytes() {
                    Some(bytes) => {
                        self.transport.write_all(bytes).await?;
                        bytes.len() as u64
                    }
                    None => {
                        copy(body.into_reader(), &mut self.transport, loops_per_yield).await?
                    }
                };
            }
        }

        self.transport.flush().await?;
        self.bytes_sent = head_len + body_len;
        self.finish().await
    }

    fn finalize_headers(&mut self) {
        if self.status == Some(Status::SwitchingProtocols) {
            return;
        }

        self.response_headers
            .try_insert_with(Date, || httpdate::fmt_http_date(SystemTime::now()));
        self.response_headers.try_insert(Server, SERVER);

        if !matches!(self.status, Some(Status::NotModified | Status::NoContent)) {
            let body_len = self.response_body.as_ref().map_or(0, Body::len);
            self.response_headers
                .try_insert_with(ContentLength, || body_len.to_string());
        }

        if self.swansong.state().is_shutting_down()
            || self.server_config.swansong().state().is_shutting_down()
        {
            self.response_headers.insert(Connection, "close");
        }
    }

    /// Keep-alive policy: http/1.1 stays open unless the request's
    /// Connection contains `close`; http/1.0 closes unless it contains
    /// `keep-alive`; a response Connection containing `close` always
    /// closes.
    fn should_close(&self) -> bool {
        if self.response_headers.contains_token(Connection, "close") {
            return true;
        }

        match self.version {
            Version::Http1_1 => self.request_headers.contains_token(Connection, "close"),
            Version::Http1_0 => !self.request_headers.contains_token(Connection, "keep-alive"),
        }
    }

    fn should_upgrade(&self) -> bool {
        self.status == Some(Status::SwitchingProtocols)
    }

    async fn finish(self) -> Result<ConnectionStatus<Transport>> {
        if self.should_close() {
            Ok(ConnectionStatus::Close)
        } else if self.should_upgrade() {
            Ok(ConnectionStatus::Upgrade(self.into()))
        } else {
            let Self {
                transport,
                buffer,
                server_config,
                swansong,
                ..
            } = self;

            match Conn::new_internal(server_config, swansong, transport, buffer).await {
                Err(Error::Closed) => {
                    log::trace!("connection closed by client");
                    Ok(ConnectionStatus::Close)
                }
                Err(e) => Err(e),
                Ok(conn) => Ok(ConnectionStatus::Conn(conn)),
            }
        }
    }

    pub(crate) fn into_upgrade(mut self) -> Upgrade<Transport> {
        let buffer = if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.take_residual())
        };

        Upgrade {
            request_headers: self.request_headers,
            path: self.raw_target,
            method: self.method,
            state: self.state,
            transport: self.transport,
            buffer,
        }
    }

    /// applies a mapping function from one transport to another,
    /// usually to box it
    pub fn map_transport<T: crate::transport::Transport>(
        self,
        f: impl Fn(Transport) -> T,
    ) -> Conn<T> {
        Conn {
            method: self.method,
            path: self.path,
            query: self.query,
            raw_target: self.raw_target,
            version: self.version,
            request_headers: self.request_headers,
            request_body: self.request_body,
            status: self.status,
            reason: self.reason,
            response_headers: self.response_headers,
            response_body: self.response_body,
            sent: self.sent,
            bytes_sent: self.bytes_sent,
            state: self.state,
            transport: f(self.transport),
            buffer: self.buffer,
            server_config: self.server_config,
            swansong: self.swansong,
            peer_ip: self.peer_ip,
            secure: self.secure,
            start_time: self.start_time,
        }
    }
}

impl<Transport> Conn<Transport> {
    /// the request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// the request path, up to and excluding any query
    pub fn path(&self) -> &str {
        &self.path
    }

    /// the raw query string, without the leading `?`
    pub fn querystring(&self) -> &str {
        &self.query
    }

    /// the request target exactly as transmitted
    pub fn raw_target(&self) -> &str {
        &self.raw_target
    }

    /// the http version of the request
    pub fn http_version(&self) -> Version {
        self.version
    }

    /// the request headers. these are immutable for the lifetime of
    /// the request.
    pub fn request_headers(&self) -> &Headers {
        &self.request_headers
    }

    /// the fully buffered (and chunk-decoded, if applicable) request
    /// body
    pub fn request_body(&self) -> &[u8] {
        &self.request_body
    }

    /// the request's Content-Type header value, if any
    pub fn request_content_type(&self) -> Option<&str> {
        self.request_headers.get(crate::KnownHeaderName::ContentType)
    }

    /// decoded cookie pairs from the Cookie header
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.request_headers.cookies()
    }

    /// the response status, if one has been set
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// set the response status
    pub fn set_status(&mut self, status: impl TryInto<Status>) {
        self.status = Some(status.try_into().unwrap_or_else(|_| {
            log::error!("attempted to set an invalid status code");
            Status::InternalServerError
        }));
    }

    /// override the reason phrase; the status's canonical phrase is
    /// used otherwise
    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = Some(reason.into());
    }

    /// the response headers
    pub fn response_headers(&self) -> &ResponseHeaders {
        &self.response_headers
    }

    /// mutable access to the response headers
    pub fn response_headers_mut(&mut self) -> &mut ResponseHeaders {
        &mut self.response_headers
    }

    /// append a Set-Cookie header to the response
    pub fn set_cookie(&mut self, cookie: &cookie::Cookie<'_>) {
        self.response_headers
            .append(SetCookie, cookie.encoded().to_string());
    }

    /// set the response body
    pub fn set_response_body(&mut self, body: impl Into<Body>) {
        self.response_body = Some(body.into());
    }

    /// borrow the response body, if one has been set
    pub fn response_body(&self) -> Option<&Body> {
        self.response_body.as_ref()
    }

    /// remove and return the response body
    pub fn take_response_body(&mut self) -> Option<Body> {
        self.response_body.take()
    }

    /// has the response already been written to the transport?
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// number of bytes written for this response, head included.
    /// zero before the send.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// a read-only reference to the per-request state typemap
    pub fn state(&self) -> &StateSet {
        &self.state
    }

    /// a mutable reference to the per-request state typemap
    pub fn state_mut(&mut self) -> &mut StateSet {
        &mut self.state
    }

    /// a clone of the session's graceful shutdown handle
    pub fn swansong(&self) -> Swansong {
        self.swansong.clone()
    }

    /// the shared server configuration
    pub fn server_config(&self) -> &Arc<ServerConfig> {
        &self.server_config
    }

    /// the remote ip address, if known
    pub fn peer_ip(&self) -> Option<IpAddr> {
        self.peer_ip
    }

    /// record the remote ip address
    pub fn set_peer_ip(&mut self, peer_ip: Option<IpAddr>) {
        self.peer_ip = peer_ip;
    }

    /// whether the transport is (or is trusted to be) tls-protected
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// mark the transport as tls-protected
    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    /// the instant the request head had been read
    pub fn start_time(&self) -> Instant {
        self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Synthetic;

    fn synthetic_with_connection_header(
        version: Version,
        request_value: Option<&str>,
        response_value: Option<&str>,
    ) -> Conn<Synthetic> {
        let mut conn = Conn::new_synthetic(Method::Get, "/", "");
        conn.version = version;
        if let Some(value) = request_value {
            conn.request_headers.append(Connection, value);
        }
        if let Some(value) = response_value {
            conn.response_headers.append(Connection, value);
        }
        conn
    }

    #[test]
    fn keep_alive_policy() {
        use Version::{Http1_0, Http1_1};

        assert!(!synthetic_with_connection_header(Http1_1, None, None).should_close());
        assert!(synthetic_with_connection_header(Http1_1, Some("close"), None).should_close());
        assert!(
            synthetic_with_connection_header(Http1_1, Some("Keep-Alive, Close"), None)
                .should_close()
        );
        assert!(synthetic_with_connection_header(Http1_0, None, None).should_close());
        assert!(
            !synthetic_with_connection_header(Http1_0, Some("keep-alive"), None).should_close()
        );
        assert!(synthetic_with_connection_header(Http1_1, None, Some("close")).should_close());
        assert!(
            synthetic_with_connection_header(Http1_0, Some("keep-alive"), Some("close"))
                .should_close()
        );
    }

    #[test]
    fn default_headers_are_not_overridden() {
        let mut conn = Conn::new_synthetic(Method::Get, "/", "");
        conn.set_status(Status::Ok);
        conn.set_response_body("hello");
        conn.response_headers_mut().insert(ContentLength, "999");
        conn.finalize_headers();
        assert_eq!(conn.response_headers().get(ContentLength), Some("999"));
        assert!(conn.response_headers().has_header(Date));
        assert_eq!(conn.response_headers().get(Server), Some(SERVER));
    }

    #[test]
    fn content_length_is_computed_from_the_body() {
        let mut conn = Conn::new_synthetic(Method::Get, "/", "");
        conn.set_status(Status::Ok);
        conn.set_response_body("hello");
        conn.finalize_headers();
        assert_eq!(conn.response_headers().get(ContentLength), Some("5"));
    }
}
