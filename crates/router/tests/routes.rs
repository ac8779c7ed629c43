use futures_lite::future::block_on;
use pretty_assertions::assert_eq;
use sorrel::{BoxedTransport, Conn, Handler, Method, Status};
use sorrel_router::{Router, RouterConnExt};

fn get(router: &Router, target: &str) -> Conn {
    on(router, Method::Get, target)
}

fn on(router: &Router, method: Method, target: &str) -> Conn {
    let conn = sorrel_http::Conn::new_synthetic(method, target, "")
        .map_transport(|t| Box::new(t) as BoxedTransport)
        .into();
    block_on(router.run(conn))
}

fn body_of(conn: &Conn) -> String {
    conn.inner()
        .response_body()
        .and_then(|body| body.static_bytes())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

#[test]
fn exact_routes_dispatch_by_method_and_path() {
    let router = Router::new()
        .get("/hello", |conn: Conn| async move { conn.ok("get hello") })
        .post("/hello", |conn: Conn| async move { conn.ok("post hello") });

    assert_eq!(body_of(&get(&router, "/hello")), "get hello");
    assert_eq!(body_of(&on(&router, Method::Post, "/hello")), "post hello");
    assert!(on(&router, Method::Delete, "/hello").status().is_none());
}

#[test]
fn exact_beats_any_matching_pattern() {
    let router = Router::new()
        .get("/users/:id", |conn: Conn| async move { conn.ok("pattern") })
        .get("/users/me", |conn: Conn| async move { conn.ok("exact") });

    assert_eq!(body_of(&get(&router, "/users/me")), "exact");
    assert_eq!(body_of(&get(&router, "/users/42")), "pattern");
}

#[test]
fn higher_specificity_wins() {
    let router = Router::new()
        .get("/:a/:b", |conn: Conn| async move { conn.ok("generic") })
        .get("/posts/:id", |conn: Conn| async move { conn.ok("posts") });

    assert_eq!(body_of(&get(&router, "/posts/7")), "posts");
    assert_eq!(body_of(&get(&router, "/other/7")), "generic");
}

#[test]
fn ties_go_to_the_first_registered() {
    let router = Router::new()
        .get("/x/:a", |conn: Conn| async move { conn.ok("first") })
        .get("/x/:b", |conn: Conn| async move { conn.ok("second") });

    assert_eq!(body_of(&get(&router, "/x/anything")), "first");
}

#[test]
fn duplicate_registration_overwrites() {
    let router = Router::new()
        .get("/dup", |conn: Conn| async move { conn.ok("old") })
        .get("/dup", |conn: Conn| async move { conn.ok("new") });

    assert_eq!(body_of(&get(&router, "/dup")), "new");
}

#[test]
fn route_params_are_available_to_handlers() {
    let router = Router::new().get("/users/:id/posts/:post", |conn: Conn| async move {
        let id = conn.route_param("id").unwrap_or_default().to_string();
        let post = conn.route_param("post").unwrap_or_default().to_string();
        conn.ok(format!("{id}/{post}"))
    });

    assert_eq!(body_of(&get(&router, "/users/3/posts/9")), "3/9");
}

#[test]
fn catch_all_captures_the_decoded_remainder() {
    let router = Router::new().get("/files/:name*", |conn: Conn| async move {
        let name = conn.route_param("name").unwrap_or_default().to_string();
        conn.ok(name)
    });

    assert_eq!(body_of(&get(&router, "/files/a/b/c")), "a/b/c");
    assert_eq!(body_of(&get(&router, "/files/a/b/c/")), "a/b/c");
    assert_eq!(body_of(&get(&router, "/files/with%20space")), "with space");
}

#[test]
fn fallback_runs_when_nothing_matches() {
    let router = Router::new()
        .get("/known", |conn: Conn| async move { conn.ok("known") })
        .fallback(|conn: Conn| async move {
            conn.with_status(Status::NotFound).with_body("fell back").halt()
        });

    assert_eq!(body_of(&get(&router, "/unknown")), "fell back");
    assert_eq!(body_of(&get(&router, "/known")), "known");
}

#[test]
fn declined_conns_fall_through_to_the_fallback() {
    let router = Router::new()
        .get("/maybe", |conn: Conn| async move { conn })
        .fallback(|conn: Conn| async move { conn.ok("fallback") });

    assert_eq!(body_of(&get(&router, "/maybe")), "fallback");
}

#[test]
fn unmatched_conns_pass_through_unhandled() {
    let router = Router::new().get("/known", |conn: Conn| async move { conn.ok("known") });
    let conn = get(&router, "/unknown");
    assert!(conn.status().is_none());
    assert!(!conn.is_halted());
}

#[test]
fn trailing_slashes_are_tolerated() {
    let router = Router::new().get("/exact/", |conn: Conn| async move { conn.ok("exact") });
    assert_eq!(body_of(&get(&router, "/exact")), "exact");
    assert_eq!(body_of(&get(&router, "/exact/")), "exact");
}
