use crate::Status;
use std::str::Utf8Error;
use thiserror::Error;

/// Concrete errors that occur within sorrel's http implementation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// [`std::io::Error`]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// connection was closed
    #[error("connection closed by client")]
    Closed,

    /// the request could not be parsed as http/1.1. the `&str` names
    /// the specific framing rule that was violated
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    /// the declared or decoded request body exceeded the configured
    /// maximum
    #[error("request body larger than the configured maximum of {0} bytes")]
    PayloadTooLarge(u64),

    /// we were unable to recognize this method token
    #[error("unrecognized method {0}")]
    UnrecognizedMethod(String),

    /// we were able to parse this version, but do not speak it
    #[error("unsupported http version")]
    UnsupportedVersion,

    /// a response can be sent at most once per request
    #[error("response already sent")]
    ResponseAlreadySent,

    /// we expected utf8, but there was an encoding error
    #[error(transparent)]
    EncodingError(#[from] Utf8Error),
}

impl Error {
    /// The status that the session loop should answer with before
    /// closing the connection, if this error is answerable at all.
    /// I/O level errors return None and are not answered.
    pub fn response_status(&self) -> Option<Status> {
        match self {
            Error::BadRequest(_) | Error::UnrecognizedMethod(_) | Error::UnsupportedVersion => {
                Some(Status::BadRequest)
            }
            Error::PayloadTooLarge(_) => Some(Status::PayloadTooLarge),
            Error::Io(_) | Error::Closed | Error::EncodingError(_) => None,
            _ => Some(Status::InternalServerError),
        }
    }
}

/// this crate's result type
pub type Result<T> = std::result::Result<T, Error>;
