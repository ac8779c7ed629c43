use crate::{ParamError, Params};
use serde::Serialize;
use sorrel::{async_trait, conn_try, Conn, Handler, KnownHeaderName, Status};
use std::{fmt::Debug, future::Future};

/// Wrap an async function into a [`Handler`] with typed parameter
/// binding and result handling.
///
/// The function receives the conn and a [`Params`] lookup and returns
/// the conn together with an [`ApiOutput`] describing the result. See
/// the crate docs for an example.
pub fn api<F, Fut, Output>(f: F) -> ApiHandler<F>
where
    F: Fn(Conn, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Conn, Output)> + Send + 'static,
    Output: ApiOutput,
{
    ApiHandler(f)
}

/// The handler returned by [`api`].
#[derive(Debug)]
pub struct ApiHandler<F>(F);

#[async_trait]
impl<F, Fut, Output> Handler for ApiHandler<F>
where
    F: Fn(Conn, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Conn, Output)> + Send + 'static,
    Output: ApiOutput,
{
    async fn run(&self, conn: Conn) -> Conn {
        let params = Params::from_conn(&conn);
        let (conn, output) = (self.0)(conn, params).await;
        output.apply(conn)
    }
}

/**
The result-handler hook: how a value returned from an api handler
becomes a response.

Provided implementations cover "nothing" (`()`, leaving the conn as
the handler set it), JSON serialization via [`Json`], a bare
[`Status`], and the `Result` shapes produced by parameter binding.
Implement this for an application type to install different result
handling.
*/
pub trait ApiOutput: Send + Sync + 'static {
    /// apply this output to the conn
    fn apply(self, conn: Conn) -> Conn;
}

impl ApiOutput for () {
    fn apply(self, conn: Conn) -> Conn {
        conn
    }
}

impl ApiOutput for Status {
    fn apply(self, conn: Conn) -> Conn {
        conn.with_status(self).halt()
    }
}

/// Serialize the wrapped value as the JSON response body. The status
/// defaults to 200 when the handler has not set one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize + Send + Sync + 'static> ApiOutput for Json<T> {
    fn apply(self, mut conn: Conn) -> Conn {
        let body = conn_try!(serde_json::to_string(&self.0), conn);
        if conn.status().is_none() {
            conn.set_status(Status::Ok);
        }
        conn.response_headers_mut().try_insert(
            KnownHeaderName::ContentType,
            "application/json; charset=utf-8",
        );
        conn.set_body(body);
        conn.halt()
    }
}

impl<T: ApiOutput> ApiOutput for Result<T, ParamError> {
    fn apply(self, conn: Conn) -> Conn {
        match self {
            Ok(output) => output.apply(conn),

            // absence means "this route does not actually match";
            // the conn stays unhandled so dispatch falls through
            Err(ParamError::Missing(name)) => {
                log::debug!("missing parameter {name}; declining the request");
                conn
            }

            Err(error @ ParamError::Invalid(_)) => conn
                .with_status(Status::InternalServerError)
                .with_body(error.to_string())
                .halt(),
        }
    }
}

impl<T: ApiOutput> ApiOutput for Option<T> {
    fn apply(self, conn: Conn) -> Conn {
        match self {
            Some(output) => output.apply(conn),
            None => conn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;
    use sorrel::BoxedTransport;
    use sorrel_http::Method;

    fn synthetic(target: &str) -> Conn {
        sorrel_http::Conn::new_synthetic(Method::Get, target, "")
            .map_transport(|t| Box::new(t) as BoxedTransport)
            .into()
    }

    fn body_of(conn: &Conn) -> String {
        conn.inner()
            .response_body()
            .and_then(|body| body.static_bytes())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn json_output_sets_status_content_type_and_body() {
        let handler = api(|conn: Conn, _params: Params| async move {
            (conn, Json(serde_json::json!({ "msg": "hi" })))
        });

        let conn = block_on(handler.run(synthetic("/")));
        assert_eq!(conn.status(), Some(Status::Ok));
        assert_eq!(
            conn.response_headers().get(KnownHeaderName::ContentType),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(body_of(&conn), r#"{"msg":"hi"}"#);
    }

    #[test]
    fn query_parameters_bind_with_coercion() {
        let handler = api(|conn: Conn, params: Params| async move {
            let output = params
                .required::<i64>("a")
                .and_then(|a| Ok(Json(a + params.required::<i64>("b")?)));
            (conn, output)
        });

        let conn = block_on(handler.run(synthetic("/add?a=2&b=3")));
        assert_eq!(body_of(&conn), "5");
    }

    #[test]
    fn missing_required_parameter_declines_the_conn() {
        let handler = api(|conn: Conn, params: Params| async move {
            let output = params.required::<i64>("absent").map(Json);
            (conn, output)
        });

        let conn = block_on(handler.run(synthetic("/")));
        assert!(conn.status().is_none());
        assert!(!conn.is_halted());
    }

    #[test]
    fn uncoercible_parameter_is_a_500() {
        let handler = api(|conn: Conn, params: Params| async move {
            let output = params.required::<i64>("n").map(Json);
            (conn, output)
        });

        let conn = block_on(handler.run(synthetic("/?n=twelve")));
        assert_eq!(conn.status(), Some(Status::InternalServerError));
        assert!(body_of(&conn).contains('n'));
    }
}
