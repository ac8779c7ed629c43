use futures_lite::future::block_on;
use pretty_assertions::assert_eq;
use serde_json::Map;
use sorrel::{BoxedTransport, Conn, Handler, KnownHeaderName, Method};
use sorrel_http::Synthetic;
use sorrel_jwt::{
    encode, epoch_seconds, Claims, JwtConnExt, JwtError, JwtHandler, JwtOptions,
};

fn secret() -> &'static [u8] {
    b"k"
}

fn token_for(sub: &str) -> String {
    encode(
        secret(),
        Claims::new().with_sub(sub).with_exp(epoch_seconds() + 60),
        &Map::new(),
    )
    .unwrap()
}

fn handler() -> JwtHandler {
    JwtHandler::new(JwtOptions::new(secret().to_vec()))
}

fn resolve(conn: sorrel_http::Conn<Synthetic>) -> Conn {
    let conn = conn.map_transport(|t| Box::new(t) as BoxedTransport).into();
    block_on(handler().run(conn))
}

#[test]
fn bearer_header_resolves_and_validates() {
    let token = token_for("u");
    let conn = resolve(
        sorrel_http::Conn::new_synthetic(Method::Get, "/", "")
            .with_request_header(KnownHeaderName::Authorization, format!("Bearer {token}")),
    );

    assert_eq!(conn.jwt_error(), JwtError::None);
    assert_eq!(conn.jwt_token().and_then(|t| t.sub()), Some("u"));
    assert_eq!(conn.raw_jwt(), Some(&*token));
}

#[test]
fn query_parameter_wins_over_bearer_header() {
    let query_token = token_for("from-query");
    let header_token = token_for("from-header");

    let conn = resolve(
        sorrel_http::Conn::new_synthetic(Method::Get, &format!("/?jwt={query_token}"), "")
            .with_request_header(
                KnownHeaderName::Authorization,
                format!("Bearer {header_token}"),
            ),
    );

    assert_eq!(conn.raw_jwt(), Some(&*query_token));
    assert_eq!(conn.jwt_token().and_then(|t| t.sub()), Some("from-query"));
}

#[test]
fn websocket_subprotocol_resolves_on_upgrade_requests_only() {
    let token = token_for("ws-user");

    let upgrade = sorrel_http::Conn::new_synthetic(Method::Get, "/ws", "")
        .with_request_header(KnownHeaderName::Connection, "Upgrade")
        .with_request_header(KnownHeaderName::Upgrade, "websocket")
        .with_request_header(KnownHeaderName::SecWebsocketVersion, "13")
        .with_request_header(
            KnownHeaderName::SecWebsocketProtocol,
            format!("Bearer, {token}"),
        );
    let conn = resolve(upgrade);
    assert_eq!(conn.jwt_token().and_then(|t| t.sub()), Some("ws-user"));

    // same headers without the upgrade handshake: no resolution
    let plain = sorrel_http::Conn::new_synthetic(Method::Get, "/ws", "")
        .with_request_header(KnownHeaderName::SecWebsocketVersion, "13")
        .with_request_header(
            KnownHeaderName::SecWebsocketProtocol,
            format!("Bearer, {token}"),
        );
    let conn = resolve(plain);
    assert_eq!(conn.jwt_token(), None);
    assert_eq!(conn.jwt_error(), JwtError::None);
}

#[test]
fn non_ascii_authorization_values_do_not_panic() {
    // the scheme check must not assume byte 7 is a char boundary
    for value in ["€€€x", "Bearér token", "€", "Bearer €€€"] {
        let conn = resolve(
            sorrel_http::Conn::new_synthetic(Method::Get, "/", "")
                .with_request_header(KnownHeaderName::Authorization, value),
        );
        assert!(conn.jwt_token().is_none(), "{value}");
    }
}

#[test]
fn absent_token_is_not_an_error() {
    let conn = resolve(sorrel_http::Conn::new_synthetic(Method::Get, "/", ""));
    assert_eq!(conn.jwt_error(), JwtError::None);
    assert!(conn.jwt_token().is_none());
    assert!(conn.raw_jwt().is_none());
}

#[test]
fn invalid_token_surfaces_its_error_without_rejecting() {
    let mut conn = resolve(
        sorrel_http::Conn::new_synthetic(Method::Get, "/", "")
            .with_request_header(KnownHeaderName::Authorization, "Bearer !!!.###.$$$"),
    );

    assert_eq!(conn.jwt_error(), JwtError::InvalidBase64);
    assert!(conn.jwt_token().is_none());
    // the middleware takes no policy decision
    assert!(conn.status().is_none());
    assert!(conn.user().is_none());
}

#[test]
fn user_resolves_lazily_from_claims() {
    let mut custom = Map::new();
    custom.insert("login".into(), serde_json::json!("alice"));
    let token = encode(
        secret(),
        Claims::new().with_sub("u-1").with_exp(epoch_seconds() + 60),
        &custom,
    )
    .unwrap();

    let mut conn = resolve(
        sorrel_http::Conn::new_synthetic(Method::Get, "/", "")
            .with_request_header(KnownHeaderName::Authorization, format!("Bearer {token}")),
    );

    let user = conn.user().expect("user should resolve from claims");
    assert_eq!(user.id(), "u-1");
    assert_eq!(user.login(), "alice");
    assert_eq!(user.token(), Some(&*token));
}

#[test]
fn installed_user_overrides_claim_resolution() {
    use sorrel_jwt::WebUser;

    let token = token_for("claims-user");
    let mut conn = resolve(
        sorrel_http::Conn::new_synthetic(Method::Get, "/", "")
            .with_request_header(KnownHeaderName::Authorization, format!("Bearer {token}")),
    );

    conn.set_user(WebUser::new("override-id", "override-login"));
    let user = conn.user().unwrap();
    assert_eq!(user.id(), "override-id");
    assert_eq!(user.login(), "override-login");
}
