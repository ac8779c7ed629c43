use pretty_assertions::assert_eq;
use serde_json::json;
use sorrel::{Conn, HttpConfig, KnownHeaderName, ServerConfig, Status};
use sorrel_api::{api, Json, Params};
use sorrel_jwt::{encode, epoch_seconds, Claims, JwtConnExt, JwtError, JwtHandler, JwtOptions};
use sorrel_router::{Router, RouterConnExt};
use sorrel_testing::{
    assert_body, assert_not_handled, assert_ok, assert_status, block_on, test_transport_session,
    TestConn, TestTransport,
};
use sorrel_websockets::{websocket, websocket_accept_hash};

fn read_until(client: &TestTransport, complete: impl Fn(&str) -> bool) -> String {
    let mut received = String::new();
    while !complete(&received) {
        let chunk = block_on(client.read_available_string());
        if chunk.is_empty() {
            break;
        }
        received.push_str(&chunk);
    }
    received
}

fn echo_router() -> Router {
    Router::new().get(
        "/api/echo",
        api(|conn: Conn, _params: Params| async move { (conn, Json(json!({ "msg": "hi" }))) }),
    )
}

#[test]
fn exact_route_json_echo_over_the_wire() {
    let (client, session) = test_transport_session(ServerConfig::new(), echo_router());

    client.write_all("GET /api/echo HTTP/1.1\r\nHost: x\r\n\r\n");
    let response = read_until(&client, |r| r.ends_with(r#"{"msg":"hi"}"#));

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(
        response.contains("\r\nContent-Type: application/json; charset=utf-8\r\n"),
        "{response}"
    );
    assert!(
        response.contains(&format!("\r\nContent-Length: {}\r\n", r#"{"msg":"hi"}"#.len())),
        "{response}"
    );
    assert!(response.ends_with(r#"{"msg":"hi"}"#), "{response}");

    client.close();
    assert!(matches!(block_on(session.join()), Ok(None)));
}

#[test]
fn pattern_catch_all_captures_the_remainder() {
    let router = Router::new().get("/files/:name*", |conn: Conn| async move {
        let name = conn.route_param("name").unwrap_or_default().to_string();
        conn.ok(name)
    });

    assert_ok!(TestConn::get("/files/a/b/c").on(&router), "a/b/c");
}

#[test]
fn keep_alive_pipelining_answers_in_order() {
    let router = Router::new().get("/api/echo", |conn: Conn| async move { conn.ok("echo") });
    let (client, session) = test_transport_session(ServerConfig::new(), router);

    client.write_all(
        "GET /api/echo HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n\
         GET /api/echo HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n",
    );

    let mut received = String::new();
    while received.matches("HTTP/1.1 200 OK").count() < 2 {
        let chunk = block_on(client.read_available_string());
        assert!(!chunk.is_empty(), "connection closed early: {received}");
        received.push_str(&chunk);
    }

    assert_eq!(received.matches("HTTP/1.1 200 OK").count(), 2);
    assert_eq!(received.matches("echo").count(), 2);

    // the connection is still open; a third request still works
    client.write_all("GET /api/echo HTTP/1.1\r\nHost: x\r\n\r\n");
    let third = block_on(client.read_available_string());
    assert!(third.starts_with("HTTP/1.1 200 OK\r\n"), "{third}");

    client.close();
    assert!(matches!(block_on(session.join()), Ok(None)));
}

#[test]
fn oversized_body_is_answered_413_and_the_connection_closes() {
    let config =
        ServerConfig::with_http_config(HttpConfig::default().with_max_request_body_len(1024));
    let (client, session) = test_transport_session(config, echo_router());

    client.write_all(
        "POST /api/echo HTTP/1.1\r\nHost: x\r\nContent-Length: 2048\r\n\r\n",
    );
    let response = read_until(&client, |r| r.ends_with("Payload Too Large"));

    assert!(
        response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"),
        "{response}"
    );
    assert!(response.contains("\r\nConnection: close\r\n"), "{response}");
    assert!(matches!(
        block_on(session.join()),
        Err(sorrel::Error::PayloadTooLarge(1024))
    ));
}

#[test]
fn jwt_happy_path_resolves_token_and_claims() {
    let token = encode(
        b"k",
        Claims::new().with_sub("u").with_exp(epoch_seconds() + 60),
        &serde_json::Map::new(),
    )
    .unwrap();

    let handler = sorrel::Stack::new()
        .and(JwtHandler::new(JwtOptions::new(b"k".to_vec())))
        .and(|conn: Conn| async move { conn.ok("authed") });

    let conn = TestConn::get("/")
        .with_request_header(
            KnownHeaderName::Authorization,
            format!("Bearer {token}"),
        )
        .on(&handler)
        .into_conn();

    assert_eq!(conn.jwt_error(), JwtError::None);
    let decoded = conn.jwt_token().expect("token should have resolved");
    assert_eq!(decoded.sub(), Some("u"));
}

#[test]
fn websocket_handshake_hands_the_transport_off() {
    let key = "dGhlIHNhbXBsZSBub25jZQ==";
    let router = Router::new().get("/ws", websocket(|_upgrade: sorrel::Upgrade| async {}));

    let (client, session) = test_transport_session(ServerConfig::new(), router);
    client.write_all(format!(
        "GET /ws HTTP/1.1\r\nHost: x\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\nSec-WebSocket-Key: {key}\r\n\r\nearly-frame-bytes"
    ));

    let response = read_until(&client, |r| r.ends_with("\r\n\r\n"));
    assert!(
        response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"),
        "{response}"
    );
    assert!(
        response.contains(&format!(
            "\r\nSec-WebSocket-Accept: {}\r\n",
            websocket_accept_hash(key)
        )),
        "{response}"
    );

    let upgrade = block_on(session.join())
        .expect("session should succeed")
        .expect("the transport should have been handed off");
    assert_eq!(upgrade.path(), "/ws");
    assert_eq!(upgrade.buffer.as_deref(), Some(&b"early-frame-bytes"[..]));
}

#[test]
fn unmatched_routes_pass_through_handlers_and_404_on_the_wire() {
    let router = Router::new().get("/known", |conn: Conn| async move { conn.ok("known") });
    assert_not_handled!(TestConn::get("/unknown").on(&router));

    let (client, session) = test_transport_session(
        ServerConfig::new(),
        Router::new().get("/known", |conn: Conn| async move { conn.ok("known") }),
    );
    client.write_all("GET /unknown HTTP/1.1\r\nHost: x\r\n\r\n");
    let response = read_until(&client, |r| r.ends_with("Not Found"));
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
    assert!(response.ends_with("Not Found"), "{response}");

    client.close();
    assert!(matches!(block_on(session.join()), Ok(None)));
}

#[test]
fn query_beats_bearer_in_token_resolution() {
    let query_token = encode(
        b"k",
        Claims::new().with_sub("query").with_exp(epoch_seconds() + 60),
        &serde_json::Map::new(),
    )
    .unwrap();
    let header_token = encode(
        b"k",
        Claims::new().with_sub("header").with_exp(epoch_seconds() + 60),
        &serde_json::Map::new(),
    )
    .unwrap();

    let handler = JwtHandler::new(JwtOptions::new(b"k".to_vec()));
    let conn = TestConn::get(&format!("/?jwt={query_token}"))
        .with_request_header(
            KnownHeaderName::Authorization,
            format!("Bearer {header_token}"),
        )
        .on(&handler)
        .into_conn();

    assert_eq!(conn.jwt_token().and_then(|t| t.sub()), Some("query"));
}

#[test]
fn middleware_short_circuits_ahead_of_the_terminal_executor() {
    let handler = sorrel::Stack::new()
        .and(|conn: Conn| async move {
            if conn.request_headers().has_header("x-block") {
                conn.with_status(Status::Forbidden).with_body("blocked").halt()
            } else {
                conn
            }
        })
        .and(|conn: Conn| async move { conn.ok("through") });

    assert_ok!(TestConn::get("/").on(&handler), "through");

    let blocked = TestConn::get("/")
        .with_request_header("x-block", "1")
        .on(&handler);
    assert_status!(blocked, 403);
    assert_body!(blocked, "blocked");
}
