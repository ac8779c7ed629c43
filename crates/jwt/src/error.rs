use thiserror::Error;

/// Why a request carries no valid token.
///
/// `None` is the quiescent value: either no token was presented, or
/// one was presented and validated. The core never answers a request
/// based on these; middlewares and handlers read the value and decide
/// policy.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum JwtError {
    /// the token does not have exactly three dot-separated segments
    #[error("malformed token")]
    InvalidFormat,

    /// a segment is not valid url-safe base64
    #[error("token segment is not valid base64url")]
    InvalidBase64,

    /// the header or payload is not valid json
    #[error("token segment is not valid json")]
    InvalidJson,

    /// the payload is json but not a json object
    #[error("token payload is not a json object")]
    InvalidJsonOptions,

    /// the token's `alg` is not HS256
    #[error("unsupported algorithm")]
    UnsupportedAlg,

    /// the signature does not verify against the configured secret
    #[error("bad signature")]
    BadSignature,

    /// `exp` lies in the past, beyond the allowed skew
    #[error("token expired")]
    Expired,

    /// `nbf` lies in the future, beyond the allowed skew
    #[error("token not yet valid")]
    NotYetValid,

    /// `iss` does not equal the configured issuer
    #[error("invalid issuer")]
    InvalidIssuer,

    /// no error: either no token was presented or it validated
    #[error("no error")]
    #[default]
    None,
}

/// A failure to issue a token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeError {
    /// a custom claim collides with a registered claim
    #[error("duplicate claim {0}")]
    DuplicateClaim(String),

    /// the claims did not serialize
    #[error("claims did not serialize: {0}")]
    Serialization(String),
}
