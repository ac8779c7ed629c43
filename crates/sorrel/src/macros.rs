/// Unwraps an `Option`, returning the provided conn unchanged when it
/// is `None`. This is the "not my request, pass it along" early
/// return that most conditional handlers start with.
#[macro_export]
macro_rules! conn_unwrap {
    ($option:expr, $conn:expr) => {
        match $option {
            Some(value) => value,
            None => return $conn,
        }
    };
}

/// Unwraps a `Result`, logging the error and returning the conn
/// halted with a 500 when it is `Err`. The response body stays a
/// short generic message; the error detail goes to the log only.
#[macro_export]
macro_rules! conn_try {
    ($result:expr, $conn:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) => {
                log::error!("{}:{} {error:?}", file!(), line!());
                return $conn
                    .with_status($crate::Status::InternalServerError)
                    .with_body("internal server error")
                    .halt();
            }
        }
    };
}
