use sorrel::{Handler, Method};
use sorrel_router::Router;
use std::sync::Arc;

/**
A group of routes sharing a path prefix, expanding to plain router
registrations.

Controllers are stateless: the handler receives its request context as
the conn on every call, so one registration serves every request.

```rust
use sorrel_api::{Controller, ControllerExt};
use sorrel_router::Router;

let users = Controller::new("/users")
    .get("/", |conn: sorrel::Conn| async move { conn.ok("list") })
    .get("/:id", |conn: sorrel::Conn| async move { conn.ok("show") })
    .get_absolute("/healthz", |conn: sorrel::Conn| async move { conn.ok("ok") });

let router = Router::new().controller(users);
# let _ = router;
```

`get_absolute` (and [`Controller::route_absolute`]) registers the
method path verbatim, bypassing the controller prefix.

A handler may be registered at several paths at once by passing a
slice, producing one registration per path:

```rust
# use sorrel_api::Controller;
let aliases = Controller::new("/docs")
    .routes(sorrel::Method::Get, &["/", "/index", "/start"],
        |conn: sorrel::Conn| async move { conn.ok("docs") });
# let _ = aliases;
```
*/
#[derive(Debug, Default)]
pub struct Controller {
    prefix: String,
    routes: Vec<(Method, String, Box<dyn Handler>)>,
}

macro_rules! controller_method {
    ($fn_name:ident, $absolute_name:ident, $method:ident) => {
        #[doc = concat!(
            "Register a ",
            stringify!($method),
            " route relative to the controller prefix."
        )]
        pub fn $fn_name(self, path: &str, handler: impl Handler) -> Self {
            self.route(Method::$method, path, handler)
        }

        #[doc = concat!(
            "Register a ",
            stringify!($method),
            " route at an absolute path, bypassing the prefix."
        )]
        pub fn $absolute_name(self, path: &str, handler: impl Handler) -> Self {
            self.route_absolute(Method::$method, path, handler)
        }
    };
}

impl Controller {
    /// a controller whose routes live under `prefix`
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            routes: Vec::new(),
        }
    }

    controller_method!(get, get_absolute, Get);
    controller_method!(post, post_absolute, Post);
    controller_method!(put, put_absolute, Put);
    controller_method!(delete, delete_absolute, Delete);
    controller_method!(patch, patch_absolute, Patch);

    /// register a route relative to the controller prefix
    pub fn route(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let path = self.prefixed(path);
        self.routes.push((method, path, Box::new(handler)));
        self
    }

    /// register a route at an absolute path, bypassing the prefix
    pub fn route_absolute(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes.push((method, path.to_string(), Box::new(handler)));
        self
    }

    /// register one handler at several prefixed paths, producing one
    /// registration per path
    pub fn routes(mut self, method: Method, paths: &[&str], handler: impl Handler) -> Self {
        let handler = Arc::new(handler);
        for path in paths {
            let path = self.prefixed(path);
            self.routes.push((method, path, Box::new(handler.clone())));
        }
        self
    }

    fn prefixed(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            if self.prefix.is_empty() {
                "/".to_string()
            } else {
                self.prefix.clone()
            }
        } else {
            format!("{}/{path}", self.prefix)
        }
    }
}

/// Registers [`Controller`]s on a [`Router`].
pub trait ControllerExt {
    /// expand the controller's routes into registrations
    fn controller(self, controller: Controller) -> Self;
}

impl ControllerExt for Router {
    fn controller(self, controller: Controller) -> Self {
        controller
            .routes
            .into_iter()
            .fold(self, |router, (method, path, handler)| {
                router.route(method, &path, handler)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;
    use sorrel::{BoxedTransport, Conn};
    use sorrel_http::Method;

    fn dispatch(router: &Router, target: &str) -> Conn {
        let conn = sorrel_http::Conn::new_synthetic(Method::Get, target, "")
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
    fn prefix_concatenation() {
        let controller = Controller::new("/users")
            .get("/", |conn: Conn| async move { conn.ok("index") })
            .get("/:id", |conn: Conn| async move { conn.ok("show") });
        let router = Router::new().controller(controller);

        assert_eq!(body_of(&dispatch(&router, "/users")), "index");
        assert_eq!(body_of(&dispatch(&router, "/users/9")), "show");
        assert!(dispatch(&router, "/").status().is_none());
    }

    #[test]
    fn absolute_paths_bypass_the_prefix() {
        let controller = Controller::new("/admin")
            .get("/panel", |conn: Conn| async move { conn.ok("panel") })
            .get_absolute("/healthz", |conn: Conn| async move { conn.ok("healthy") });
        let router = Router::new().controller(controller);

        assert_eq!(body_of(&dispatch(&router, "/admin/panel")), "panel");
        assert_eq!(body_of(&dispatch(&router, "/healthz")), "healthy");
        assert!(dispatch(&router, "/admin/healthz").status().is_none());
    }

    #[test]
    fn multiple_paths_for_one_handler() {
        let controller = Controller::new("/docs").routes(
            Method::Get,
            &["/", "/index", "/start"],
            |conn: Conn| async move { conn.ok("docs") },
        );
        let router = Router::new().controller(controller);

        for target in ["/docs", "/docs/index", "/docs/start"] {
            assert_eq!(body_of(&dispatch(&router, target)), "docs", "{target}");
        }
    }
}
