use crate::Error;
use std::fmt::{self, Display};

/// The http protocol version of a request.
///
/// Only 1.0 and 1.1 are representable, because the parser rejects
/// anything else before a [`Version`] is constructed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Version {
    /// HTTP/1.0
    Http1_0,
    /// HTTP/1.1
    Http1_1,
}

impl Version {
    /// the wire representation of this version
    pub const fn as_str(&self) -> &'static str {
        match self {
            Version::Http1_0 => "HTTP/1.0",
            Version::Http1_1 => "HTTP/1.1",
        }
    }

    pub(crate) fn parse(bytes: &[u8]) -> crate::Result<Self> {
        match bytes {
            b"HTTP/1.0" => Ok(Version::Http1_0),
            b"HTTP/1.1" => Ok(Version::Http1_1),
            b"HTTP/0.9" | b"HTTP/2" | b"HTTP/2.0" | b"HTTP/3" | b"HTTP/3.0" => {
                Err(Error::UnsupportedVersion)
            }
            _ => Err(Error::BadRequest("malformed http version")),
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(Version::parse(b"HTTP/1.1").unwrap(), Version::Http1_1);
        assert_eq!(Version::parse(b"HTTP/1.0").unwrap(), Version::Http1_0);
        assert!(matches!(
            Version::parse(b"HTTP/2"),
            Err(Error::UnsupportedVersion)
        ));
        assert!(matches!(
            Version::parse(b"HTP/1.1"),
            Err(Error::BadRequest(_))
        ));
    }
}
