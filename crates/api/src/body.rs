use serde::{de::DeserializeOwned, Serialize};
use sorrel::{Conn, KnownHeaderName, Status};
use sorrel_http::{
    forms::FormData,
    multipart::{self, MultipartLimits, Part},
};
use thiserror::Error;

/// A failure to map a request body into a typed target.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BodyError {
    /// the request's content-type does not match the requested
    /// mapping
    #[error("unexpected content-type {0:?}")]
    WrongContentType(Option<String>),

    /// the body did not deserialize into the target type
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// the body violated its own framing (form or multipart)
    #[error(transparent)]
    Malformed(#[from] sorrel::Error),
}

impl BodyError {
    /// the status a handler would usually answer this error with
    pub fn status(&self) -> Status {
        match self {
            BodyError::WrongContentType(_) => Status::UnsupportedMediaType,
            BodyError::Json(_) | BodyError::Malformed(_) => Status::BadRequest,
        }
    }
}

/// Body-mapping extensions on [`Conn`].
pub trait ApiConnExt {
    /// Deserialize an `application/json` body into `T`. The request
    /// content-type must start with `application/json`.
    fn body_json<T: DeserializeOwned>(&self) -> Result<T, BodyError>;

    /// Decode an `application/x-www-form-urlencoded` body.
    fn body_form(&self) -> Result<FormData, BodyError>;

    /// Parse a `multipart/form-data` body with the provided limits.
    fn body_multipart(&self, limits: &MultipartLimits) -> Result<Vec<Part>, BodyError>;

    /// Serialize `value` as the JSON response body, setting the
    /// content-type and a 200 unless a status is already set.
    fn set_json(&mut self, value: &impl Serialize) -> Result<(), serde_json::Error>;
}

fn content_type(conn: &Conn) -> Option<&str> {
    conn.request_headers().get(KnownHeaderName::ContentType)
}

impl ApiConnExt for Conn {
    fn body_json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        match content_type(self) {
            Some(ct) if ct.trim_start().starts_with("application/json") => {
                Ok(serde_json::from_slice(self.request_body())?)
            }
            other => Err(BodyError::WrongContentType(other.map(String::from))),
        }
    }

    fn body_form(&self) -> Result<FormData, BodyError> {
        match content_type(self) {
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                Ok(FormData::parse(self.request_body())?)
            }
            other => Err(BodyError::WrongContentType(other.map(String::from))),
        }
    }

    fn body_multipart(&self, limits: &MultipartLimits) -> Result<Vec<Part>, BodyError> {
        match content_type(self) {
            Some(ct) if ct.starts_with("multipart/form-data") => {
                Ok(multipart::parse(self.request_body(), ct, limits)?)
            }
            other => Err(BodyError::WrongContentType(other.map(String::from))),
        }
    }

    fn set_json(&mut self, value: &impl Serialize) -> Result<(), serde_json::Error> {
        let body = serde_json::to_string(value)?;
        if self.status().is_none() {
            self.set_status(Status::Ok);
        }
        self.response_headers_mut().try_insert(
            KnownHeaderName::ContentType,
            "application/json; charset=utf-8",
        );
        self.set_body(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use sorrel::BoxedTransport;
    use sorrel_http::Method;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Login {
        user: String,
        remember: bool,
    }

    fn conn_with_body(content_type: &str, body: &str) -> Conn {
        sorrel_http::Conn::new_synthetic(Method::Post, "/", body.as_bytes().to_vec())
            .with_request_header(KnownHeaderName::ContentType, content_type)
            .map_transport(|t| Box::new(t) as BoxedTransport)
            .into()
    }

    #[test]
    fn json_mapping_requires_the_content_type() {
        let conn = conn_with_body("application/json", r#"{"user":"u","remember":true}"#);
        assert_eq!(
            conn.body_json::<Login>().unwrap(),
            Login {
                user: "u".into(),
                remember: true
            }
        );

        let conn = conn_with_body("text/plain", r#"{"user":"u","remember":true}"#);
        assert!(matches!(
            conn.body_json::<Login>(),
            Err(BodyError::WrongContentType(Some(_)))
        ));
    }

    #[test]
    fn json_mapping_tolerates_charset_suffixes() {
        let conn = conn_with_body(
            "application/json; charset=utf-8",
            r#"{"user":"u","remember":false}"#,
        );
        assert!(conn.body_json::<Login>().is_ok());
    }

    #[test]
    fn form_mapping() {
        let conn = conn_with_body(
            "application/x-www-form-urlencoded",
            "user=alice&tag[]=a&tag[]=b",
        );
        let form = conn.body_form().unwrap();
        assert_eq!(form.get("user"), Some("alice"));
        assert_eq!(form.get_all("tag").len(), 2);
    }
}
