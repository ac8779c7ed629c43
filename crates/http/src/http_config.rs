/// Tunable parameters for http parsing and response buffering.
///
/// The parsing limits map onto the error taxonomy: an overlong header
/// section is answered 400, an overlong body 413.
#[derive(Clone, Copy, Debug)]
pub struct HttpConfig {
    pub(crate) max_request_header_len: usize,
    pub(crate) max_request_body_len: u64,
    pub(crate) max_headers: usize,
    pub(crate) receive_buffer_len: usize,
    pub(crate) request_buffer_initial_len: usize,
    pub(crate) response_buffer_len: usize,
    pub(crate) copy_loops_per_yield: usize,
}

impl HttpConfig {
    /// maximum byte length of the request line plus header section
    pub fn with_max_request_header_len(mut self, max_request_header_len: usize) -> Self {
        self.max_request_header_len = max_request_header_len;
        self
    }

    /// maximum declared or chunk-decoded request body length
    pub fn with_max_request_body_len(mut self, max_request_body_len: u64) -> Self {
        self.max_request_body_len = max_request_body_len;
        self
    }

    /// maximum number of distinct header lines
    pub fn with_max_headers(mut self, max_headers: usize) -> Self {
        self.max_headers = max_headers;
        self
    }

    /// how many bytes each transport read asks for
    pub fn with_receive_buffer_len(mut self, receive_buffer_len: usize) -> Self {
        self.receive_buffer_len = receive_buffer_len;
        self
    }

    /// initial capacity of the pooled parse buffer
    pub fn with_request_buffer_initial_len(mut self, request_buffer_initial_len: usize) -> Self {
        self.request_buffer_initial_len = request_buffer_initial_len;
        self
    }

    /// initial capacity of the response head buffer
    pub fn with_response_buffer_len(mut self, response_buffer_len: usize) -> Self {
        self.response_buffer_len = response_buffer_len;
        self
    }

    /// how many copy loops to perform between cooperative yields when
    /// streaming a file body
    pub fn with_copy_loops_per_yield(mut self, copy_loops_per_yield: usize) -> Self {
        self.copy_loops_per_yield = copy_loops_per_yield;
        self
    }

    /// the parse buffer hard ceiling: a full head plus a full body
    pub(crate) fn buffer_ceiling(&self) -> usize {
        self.max_request_header_len
            .saturating_add(usize::try_from(self.max_request_body_len).unwrap_or(usize::MAX))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

pub(crate) const DEFAULT_CONFIG: HttpConfig = HttpConfig {
    max_request_header_len: 8 * 1024,
    max_request_body_len: 524_288_000,
    max_headers: 128,
    receive_buffer_len: 8 * 1024,
    request_buffer_initial_len: 512,
    response_buffer_len: 512,
    copy_loops_per_yield: 16,
};
