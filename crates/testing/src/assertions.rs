/// assert that a [`TestConn`][crate::TestConn] has the given status
#[macro_export]
macro_rules! assert_status {
    ($conn:expr, $status:expr) => {{
        let conn = &$conn;
        assert_eq!(
            conn.status().map(|s| s as u16),
            Some($status as u16),
            "expected status {}, conn: {conn:?}",
            $status
        );
    }};
}

/// assert that a [`TestConn`][crate::TestConn] has the given response
/// body
#[macro_export]
macro_rules! assert_body {
    ($conn:expr, $body:expr) => {{
        let conn = &$conn;
        assert_eq!(conn.body_string(), $body, "conn: {conn:?}");
    }};
}

/// assert a 200 response, optionally with a body and response headers
#[macro_export]
macro_rules! assert_ok {
    ($conn:expr) => {
        $crate::assert_status!($conn, 200);
    };

    ($conn:expr, $body:expr) => {{
        let conn = $conn;
        $crate::assert_status!(conn, 200);
        $crate::assert_body!(conn, $body);
    }};

    ($conn:expr, $body:expr, $($name:expr => $value:expr),+) => {{
        let conn = $conn;
        $crate::assert_status!(conn, 200);
        $crate::assert_body!(conn, $body);
        $(
            assert_eq!(conn.response_header($name), Some($value), "conn: {conn:?}");
        )+
    }};
}

/// assert that no handler answered this conn: no status, not halted
#[macro_export]
macro_rules! assert_not_handled {
    ($conn:expr) => {{
        let conn = &$conn;
        assert!(
            conn.status().is_none() && !conn.is_halted(),
            "expected the conn to pass through unhandled, conn: {conn:?}"
        );
    }};
}
