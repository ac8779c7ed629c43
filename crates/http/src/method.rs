use crate::Error;
use std::{
    fmt::{self, Display},
    str::FromStr,
};

/// The request methods understood by this server core.
///
/// See [RFC7231, Section 4](https://tools.ietf.org/html/rfc7231#section-4)
/// and [RFC5789](https://tools.ietf.org/html/rfc5789) for PATCH.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Method {
    /// The CONNECT method, used to establish a tunnel
    Connect,
    /// The DELETE method
    Delete,
    /// The GET method
    Get,
    /// The HEAD method, identical to GET but without a response body
    Head,
    /// The OPTIONS method
    Options,
    /// The PATCH method
    Patch,
    /// The POST method
    Post,
    /// The PUT method
    Put,
    /// The TRACE method
    Trace,
}

impl Method {
    /// The wire representation of this method, exactly as transmitted.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Connect => "CONNECT",
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Trace => "TRACE",
        }
    }

    /// Parse a method from its exact wire bytes. Method tokens are
    /// case-sensitive, so `get` is not a recognized method.
    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        match bytes {
            b"CONNECT" => Ok(Method::Connect),
            b"DELETE" => Ok(Method::Delete),
            b"GET" => Ok(Method::Get),
            b"HEAD" => Ok(Method::Head),
            b"OPTIONS" => Ok(Method::Options),
            b"PATCH" => Ok(Method::Patch),
            b"POST" => Ok(Method::Post),
            b"PUT" => Ok(Method::Put),
            b"TRACE" => Ok(Method::Trace),
            other => Err(Error::UnrecognizedMethod(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_exact() {
        assert_eq!(Method::parse(b"GET").unwrap(), Method::Get);
        assert!(Method::parse(b"get").is_err());
        assert!(Method::parse(b"GETT").is_err());
        assert!(Method::parse(b"").is_err());
    }

    #[test]
    fn display_round_trips() {
        for method in [
            Method::Connect,
            Method::Delete,
            Method::Get,
            Method::Head,
            Method::Options,
            Method::Patch,
            Method::Post,
            Method::Put,
            Method::Trace,
        ] {
            assert_eq!(method.to_string().parse::<Method>().unwrap(), method);
        }
    }
}
