/*!
`multipart/form-data` parsing per RFC 7578.

The parser works over the fully buffered request body, which the
session loop has already bounded by the configured body limit; the
limits here additionally bound part count and per-part size so a
well-framed body cannot fan out into pathological allocations.
*/

use crate::{Error, Result};
use memchr::memmem::Finder;
use std::str;

/// Bounds on multipart parsing. Exceeding either cancels the parse
/// with a `BadRequest`.
#[derive(Debug, Clone, Copy)]
pub struct MultipartLimits {
    /// maximum number of parts in one body
    pub max_parts: usize,
    /// maximum decoded byte length of any single part
    pub max_part_len: u64,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        Self {
            max_parts: 64,
            max_part_len: 10 * 1024 * 1024,
        }
    }
}

/// One decoded part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

impl Part {
    /// the `name` parameter of the Content-Disposition header
    pub fn name(&self) -> &str {
        &self.name
    }

    /// the `filename` parameter, present for file uploads
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// the part's own Content-Type, if one was declared
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// the part content
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// the part content length in bytes
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// is the part content empty?
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// the part content as utf-8, if it is valid utf-8
    pub fn text(&self) -> Option<&str> {
        str::from_utf8(&self.data).ok()
    }
}

/// Extract the boundary parameter from a `multipart/form-data`
/// content-type value.
pub fn boundary(content_type: &str) -> Option<String> {
    let mut parts = content_type.split(';');
    if !parts
        .next()?
        .trim()
        .eq_ignore_ascii_case("multipart/form-data")
    {
        return None;
    }

    parts.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Parse a multipart body. The `content_type` is the request's
/// Content-Type header value, from which the boundary is taken.
pub fn parse(body: &[u8], content_type: &str, limits: &MultipartLimits) -> Result<Vec<Part>> {
    let boundary = boundary(content_type)
        .ok_or(Error::BadRequest("missing multipart boundary"))?;

    let delimiter = format!("--{boundary}");
    let finder = Finder::new(delimiter.as_bytes());

    let mut position = finder
        .find(body)
        .ok_or(Error::BadRequest("multipart body without boundary"))?
        + delimiter.len();

    let mut parts = Vec::new();

    loop {
        if body[position..].starts_with(b"--") {
            return Ok(parts);
        }

        position = consume_crlf(body, position)?;

        let headers_end = Finder::new(b"\r\n\r\n")
            .find(&body[position..])
            .ok_or(Error::BadRequest("unterminated multipart part headers"))?;
        let headers = parse_part_headers(&body[position..position + headers_end])?;
        position += headers_end + 4;

        let data_len = finder
            .find(&body[position..])
            .ok_or(Error::BadRequest("unterminated multipart part"))?;

        // the CRLF before the delimiter belongs to the framing
        let data = body[position..position + data_len]
            .strip_suffix(b"\r\n")
            .ok_or(Error::BadRequest("malformed multipart framing"))?;

        if data.len() as u64 > limits.max_part_len {
            return Err(Error::BadRequest("multipart part too large"));
        }

        parts.push(Part {
            name: headers.name,
            file_name: headers.file_name,
            content_type: headers.content_type,
            data: data.to_vec(),
        });

        if parts.len() > limits.max_parts {
            return Err(Error::BadRequest("too many multipart parts"));
        }

        position += data_len + delimiter.len();
    }
}

fn consume_crlf(body: &[u8], position: usize) -> Result<usize> {
    if body[position..].starts_with(b"\r\n") {
        Ok(position + 2)
    } else {
        Err(Error::BadRequest("malformed multipart framing"))
    }
}

struct PartHeaders {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
}

fn parse_part_headers(bytes: &[u8]) -> Result<PartHeaders> {
    let text = str::from_utf8(bytes)
        .map_err(|_| Error::BadRequest("multipart part headers not utf-8"))?;

    let mut name = None;
    let mut file_name = None;
    let mut content_type = None;

    for line in text.split("\r\n").filter(|line| !line.is_empty()) {
        let (header, value) = line
            .split_once(':')
            .ok_or(Error::BadRequest("malformed multipart part header"))?;

        if header.trim().eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                let Some((key, value)) = param.split_once('=') else {
                    continue;
                };
                let value = value.trim().trim_matches('"').to_string();
                match key.trim() {
                    "name" => name = Some(value),
                    "filename" => file_name = Some(value),
                    _ => {}
                }
            }
        } else if header.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    Ok(PartHeaders {
        name: name.ok_or(Error::BadRequest("multipart part without a name"))?,
        file_name,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONTENT_TYPE: &str = "multipart/form-data; boundary=XBOUNDARY";

    fn fixture() -> Vec<u8> {
        [
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"field\"\r\n",
            "\r\n",
            "value\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"upload\"; filename=\"hello.txt\"\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Hello\n!\r\n",
            "--XBOUNDARY--\r\n",
        ]
        .concat()
        .into_bytes()
    }

    #[test]
    fn parses_fields_and_files() {
        let parts = parse(&fixture(), CONTENT_TYPE, &MultipartLimits::default()).unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].name(), "field");
        assert_eq!(parts[0].file_name(), None);
        assert_eq!(parts[0].text(), Some("value"));

        assert_eq!(parts[1].name(), "upload");
        assert_eq!(parts[1].file_name(), Some("hello.txt"));
        assert_eq!(parts[1].content_type(), Some("text/plain"));
        assert_eq!(parts[1].data(), b"Hello\n!");
        assert_eq!(parts[1].len(), 7);
    }

    #[test]
    fn quoted_boundary() {
        assert_eq!(
            boundary("multipart/form-data; boundary=\"quoted value\""),
            Some("quoted value".to_string())
        );
        assert_eq!(boundary("application/json"), None);
    }

    #[test]
    fn part_count_limit() {
        let limits = MultipartLimits {
            max_parts: 1,
            ..MultipartLimits::default()
        };
        assert!(matches!(
            parse(&fixture(), CONTENT_TYPE, &limits),
            Err(Error::BadRequest("too many multipart parts"))
        ));
    }

    #[test]
    fn part_size_limit() {
        let limits = MultipartLimits {
            max_part_len: 3,
            ..MultipartLimits::default()
        };
        assert!(matches!(
            parse(&fixture(), CONTENT_TYPE, &limits),
            Err(Error::BadRequest("multipart part too large"))
        ));
    }

    #[test]
    fn unterminated_body_is_rejected() {
        let mut body = fixture();
        body.truncate(body.len() - 20);
        assert!(parse(&body, CONTENT_TYPE, &MultipartLimits::default()).is_err());
    }
}
