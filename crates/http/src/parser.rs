use crate::{Error, Headers, HttpConfig, KnownHeaderName, Method, Result, Version};
use memchr::{memchr, memchr2, memchr_iter, memmem::Finder};
use std::str;

/// One fully parsed request, as produced by [`try_parse`]. The
/// request line, headers, and body are all populated; `consumed` is
/// the exact number of wire bytes this request occupied, which the
/// caller uses to compact its parse buffer before attempting the next
/// pipelined request.
#[derive(Debug)]
pub struct ParsedRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) raw_target: String,
    pub(crate) version: Version,
    pub(crate) headers: Headers,
    pub(crate) body: Vec<u8>,
    pub(crate) consumed: usize,
}

impl ParsedRequest {
    /// the request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// the path component of the request target
    pub fn path(&self) -> &str {
        &self.path
    }

    /// the raw query string, without the leading `?`
    pub fn query(&self) -> &str {
        &self.query
    }

    /// the request target exactly as transmitted
    pub fn raw_target(&self) -> &str {
        &self.raw_target
    }

    /// the http version
    pub fn version(&self) -> Version {
        self.version
    }

    /// the parsed request headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// the request body, chunk-decoded if it arrived chunked
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// wire length of this request
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

fn is_tchar(c: u8) -> bool {
    matches!(
        c,
        b'a'..=b'z'
        | b'A'..=b'Z'
        | b'0'..=b'9'
        | b'!'
        | b'#'
        | b'$'
        | b'%'
        | b'&'
        | b'\''
        | b'*'
        | b'+'
        | b'-'
        | b'.'
        | b'^'
        | b'_'
        | b'`'
        | b'|'
        | b'~'
    )
}

/// Attempt to parse one complete request from the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are required; nothing is
/// consumed and no state is retained, so the caller may simply append
/// more bytes and retry. Returns `Ok(Some(request))` once the request
/// line, header section, and full body are available. Multiple
/// pipelined requests parse sequentially from one buffer by repeated
/// calls, compacting by [`ParsedRequest::consumed`] between them.
pub(crate) fn try_parse(buf: &[u8], config: &HttpConfig) -> Result<Option<ParsedRequest>> {
    let Some(head_end) = Finder::new(b"\r\n\r\n").find(buf) else {
        if buf.len() > config.max_request_header_len {
            return Err(Error::BadRequest("header section too long"));
        }
        return Ok(None);
    };
    let head_len = head_end + 4;

    if head_len > config.max_request_header_len {
        return Err(Error::BadRequest("header section too long"));
    }

    let line_end = Finder::new(b"\r\n")
        .find(&buf[..head_len])
        .ok_or(Error::BadRequest("malformed start line"))?;

    let mut spaces = memchr_iter(b' ', &buf[..line_end]);
    let first_space = spaces.next().ok_or(Error::BadRequest("malformed start line"))?;
    let second_space = spaces
        .next()
        .ok_or(Error::BadRequest("malformed start line"))?;

    let method = Method::parse(&buf[..first_space])?;
    let raw_target = str::from_utf8(&buf[first_space + 1..second_space])
        .map_err(|_| Error::BadRequest("request target not utf-8"))?;
    if raw_target.is_empty() {
        return Err(Error::BadRequest("empty request target"));
    }
    let version = Version::parse(&buf[second_space + 1..line_end])?;

    let (path, query) = match raw_target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (raw_target.to_string(), String::new()),
    };

    let headers = parse_headers(&buf[line_end + 2..head_end], config)?;

    let content_length = headers.get(KnownHeaderName::ContentLength);
    let transfer_encoding = headers.get(KnownHeaderName::TransferEncoding);

    if content_length.is_some() && transfer_encoding.is_some() {
        return Err(Error::BadRequest(
            "content-length with transfer-encoding",
        ));
    }

    let (body, consumed) = match transfer_encoding {
        Some(te) if te.eq_ignore_ascii_case("chunked") => {
            match decode_chunked(buf, head_len, config.max_request_body_len)? {
                Some(decoded) => decoded,
                None => return Ok(None),
            }
        }

        Some(_) => return Err(Error::BadRequest("unsupported transfer-encoding")),

        None => match content_length {
            Some(cl) => {
                let len = cl
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| Error::BadRequest("invalid content-length"))?;

                if len > config.max_request_body_len {
                    return Err(Error::PayloadTooLarge(config.max_request_body_len));
                }

                let len = usize::try_from(len)
                    .map_err(|_| Error::PayloadTooLarge(config.max_request_body_len))?;

                if buf.len() < head_len + len {
                    return Ok(None);
                }

                (buf[head_len..head_len + len].to_vec(), head_len + len)
            }

            None => (Vec::new(), head_len),
        },
    };

    log::trace!("parsed request:\n{method} {raw_target} {version}\n{headers}");

    Ok(Some(ParsedRequest {
        method,
        path,
        query,
        raw_target: raw_target.to_string(),
        version,
        headers,
        body,
        consumed,
    }))
}

fn parse_headers(mut bytes: &[u8], config: &HttpConfig) -> Result<Headers> {
    let mut headers = Headers::new();
    let mut count = 0;
    let finder = Finder::new(b"\r\n");

    while !bytes.is_empty() {
        let line_end = finder.find(bytes).unwrap_or(bytes.len());
        let line = &bytes[..line_end];
        bytes = &bytes[(line_end + 2).min(bytes.len())..];

        count += 1;
        if count > config.max_headers {
            return Err(Error::BadRequest("too many headers"));
        }

        let colon = memchr(b':', line).ok_or(Error::BadRequest("header line without colon"))?;
        let name = &line[..colon];

        if name.is_empty() || !name.iter().copied().all(is_tchar) {
            return Err(Error::BadRequest("invalid header name"));
        }

        let name = str::from_utf8(name).map_err(|_| Error::BadRequest("invalid header name"))?;
        let value = str::from_utf8(&line[colon + 1..])
            .map_err(|_| Error::BadRequest("header value not utf-8"))?
            .trim_matches(|c| c == ' ' || c == '\t');

        headers.append(name, value);
    }

    Ok(headers)
}

// A chunk-size line is at most 16 hex digits plus an optional
// extension; we give up if no delimiter appears within that window.
fn parse_chunk_size(buf: &[u8]) -> Result<Option<(usize, u64)>> {
    let window = &buf[..buf.len().min(18)];
    let Some(index) = memchr2(b';', b'\r', window) else {
        return if buf.len() < 18 {
            Ok(None)
        } else {
            Err(Error::BadRequest("invalid chunk size"))
        };
    };

    let src = str::from_utf8(&buf[..index]).map_err(|_| Error::BadRequest("invalid chunk size"))?;
    let chunk_size =
        u64::from_str_radix(src, 16).map_err(|_| Error::BadRequest("invalid chunk size"))?;

    Ok(Finder::new(b"\r\n")
        .find(&buf[index..])
        .map(|end| (index + end + 2, chunk_size)))
}

/// Decode a chunked body starting at `offset`. Returns the decoded
/// bytes and the total wire length through the end of the trailer
/// section, or `None` when the framing is not yet complete.
fn decode_chunked(buf: &[u8], offset: usize, max_len: u64) -> Result<Option<(Vec<u8>, usize)>> {
    let mut pos = offset;
    let mut body = Vec::new();

    loop {
        let Some((framing, chunk_size)) = parse_chunk_size(&buf[pos..])? else {
            return Ok(None);
        };
        pos += framing;

        if chunk_size == 0 {
            // discard trailers until the blank line
            loop {
                if buf.len() < pos + 2 {
                    return Ok(None);
                }
                if &buf[pos..pos + 2] == b"\r\n" {
                    return Ok(Some((body, pos + 2)));
                }
                match Finder::new(b"\r\n").find(&buf[pos..]) {
                    Some(line_end) => pos += line_end + 2,
                    None => return Ok(None),
                }
            }
        }

        let chunk_size_usize =
            usize::try_from(chunk_size).map_err(|_| Error::PayloadTooLarge(max_len))?;

        if body.len() as u64 + chunk_size > max_len {
            return Err(Error::PayloadTooLarge(max_len));
        }

        if buf.len() < pos + chunk_size_usize + 2 {
            return Ok(None);
        }

        body.extend_from_slice(&buf[pos..pos + chunk_size_usize]);
        if &buf[pos + chunk_size_usize..pos + chunk_size_usize + 2] != b"\r\n" {
            return Err(Error::BadRequest("chunk framing"));
        }
        pos += chunk_size_usize + 2;
    }
}
