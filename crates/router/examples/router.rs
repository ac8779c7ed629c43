use sorrel::Conn;
use sorrel_router::{Router, RouterConnExt};

fn main() {
    env_logger::init();

    sorrel::config().run(
        Router::new()
            .get("/", |conn: Conn| async move {
                conn.ok("you have reached the index")
            })
            .get("/pages/:name", |conn: Conn| async move {
                let name = conn.route_param("name").unwrap_or_default().to_string();
                conn.ok(format!("you have reached the page named {name}"))
            })
            .get("/files/:path*", |conn: Conn| async move {
                let path = conn.route_param("path").unwrap_or_default().to_string();
                conn.ok(format!("you asked for the file at {path}"))
            })
            .fallback(|conn: Conn| async move {
                conn.with_status(404).with_body("nothing routed here").halt()
            }),
    );
}
