use crate::{RouteSpec, RouteValues};
use hashbrown::HashMap;
use sorrel::{async_trait, Conn, Handler, Info, Method, Upgrade};
use std::fmt::{self, Debug, Formatter};

macro_rules! method {
    ($fn_name:ident, $method:ident) => {
        #[doc = concat!(
            "Registers a handler for the ",
            stringify!($method),
            " http method at the provided path or pattern."
        )]
        pub fn $fn_name(mut self, path: &str, handler: impl Handler) -> Self {
            self.add(Method::$method, path, handler);
            self
        }
    };
}

/**
# The router handler.

Routes are registered before the server starts and are immutable
afterwards: the router moves into the server's handler slot at start,
so there is no way to add a route to a running server.

Exact paths win over patterns; patterns are ranked by
[specificity][RouteSpec::specificity], first registered winning ties.
Registering the same method and template twice replaces the earlier
handler. A handler that leaves its conn unhandled (no status, not
halted) falls through to the fallback.
*/
pub struct Router {
    exact: HashMap<Method, HashMap<String, Box<dyn Handler>>>,
    patterns: HashMap<Method, Vec<(RouteSpec, Box<dyn Handler>)>>,
    fallback: Option<Box<dyn Handler>>,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            patterns: HashMap::new(),
            fallback: None,
        }
    }
}

enum Selection<'router> {
    Exact(&'router Box<dyn Handler>),
    Pattern(&'router Box<dyn Handler>, RouteValues),
    None,
}

impl Router {
    /// constructs a new Router, usually followed by chained
    /// registration calls
    pub fn new() -> Self {
        Self::default()
    }

    method!(get, Get);
    method!(post, Post);
    method!(put, Put);
    method!(delete, Delete);
    method!(patch, Patch);

    /// Registers a handler for any method and path template.
    /// Duplicate registrations for the same (method, template)
    /// replace the earlier one.
    pub fn route(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler);
        self
    }

    /// Registers the last-resort handler, run when no route matches
    /// (or the matched route declined the conn).
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    pub(crate) fn add(&mut self, method: Method, path: &str, handler: impl Handler) {
        let spec = RouteSpec::new(path);
        if spec.is_pattern() {
            let patterns = self.patterns.entry(method).or_default();
            if let Some(existing) = patterns.iter_mut().find(|(s, _)| s.raw() == spec.raw()) {
                existing.1 = Box::new(handler);
            } else {
                patterns.push((spec, Box::new(handler)));
            }
        } else {
            self.exact
                .entry(method)
                .or_default()
                .insert(normalize(path), Box::new(handler));
        }
    }

    fn select(&self, method: Method, path: &str) -> Selection<'_> {
        if let Some(handler) = self
            .exact
            .get(&method)
            .and_then(|table| table.get(&normalize(path)))
        {
            return Selection::Exact(handler);
        }

        let mut best: Option<(usize, &Box<dyn Handler>, RouteValues)> = None;
        for (spec, handler) in self.patterns.get(&method).into_iter().flatten() {
            if let Some(values) = spec.matches(path) {
                // strictly-greater keeps the first registration on ties
                if best
                    .as_ref()
                    .is_none_or(|(specificity, ..)| spec.specificity() > *specificity)
                {
                    best = Some((spec.specificity(), handler, values));
                }
            }
        }

        match best {
            Some((_, handler, values)) => Selection::Pattern(handler, values),
            None => Selection::None,
        }
    }

    fn is_unhandled(conn: &Conn) -> bool {
        !conn.is_halted() && conn.status().is_none()
    }
}

#[async_trait]
impl Handler for Router {
    async fn run(&self, conn: Conn) -> Conn {
        let method = conn.method();
        let path = conn.path().to_string();

        let conn = match self.select(method, &path) {
            Selection::Exact(handler) => {
                log::debug!("routing {method} {path} to exact route");
                handler.run(conn).await
            }

            Selection::Pattern(handler, values) => {
                log::debug!("routing {method} {path} to pattern route");
                handler.run(conn.with_state(values)).await
            }

            Selection::None => conn,
        };

        if Self::is_unhandled(&conn) {
            if let Some(fallback) = &self.fallback {
                return fallback.run(conn).await;
            }
        }

        conn
    }

    async fn init(&mut self, info: &mut Info) {
        for table in self.exact.values_mut() {
            for handler in table.values_mut() {
                handler.init(info).await;
            }
        }
        for patterns in self.patterns.values_mut() {
            for (_, handler) in patterns {
                handler.init(info).await;
            }
        }
        if let Some(fallback) = &mut self.fallback {
            fallback.init(info).await;
        }
    }

    async fn before_send(&self, conn: Conn) -> Conn {
        let method = conn.method();
        let path = conn.path().to_string();

        match self.select(method, &path) {
            Selection::Exact(handler) => handler.before_send(conn).await,
            Selection::Pattern(handler, _) => handler.before_send(conn).await,
            Selection::None => match &self.fallback {
                Some(fallback) => fallback.before_send(conn).await,
                None => conn,
            },
        }
    }

    fn has_upgrade(&self, upgrade: &Upgrade) -> bool {
        match self.select(upgrade.method(), strip_query(upgrade.path())) {
            Selection::Exact(handler) => handler.has_upgrade(upgrade),
            Selection::Pattern(handler, _) => handler.has_upgrade(upgrade),
            Selection::None => false,
        }
    }

    async fn upgrade(&self, upgrade: Upgrade) {
        match self.select(upgrade.method(), strip_query(upgrade.path())) {
            Selection::Exact(handler) => handler.upgrade(upgrade).await,
            Selection::Pattern(handler, _) => handler.upgrade(upgrade).await,
            Selection::None => {}
        }
    }

    fn name(&self) -> std::borrow::Cow<'static, str> {
        format!("{self:#?}").into()
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(path, _)| path)
}

impl Debug for Router {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (method, table) in &self.exact {
            for path in table.keys() {
                set.entry(&format_args!("{method} {path}"));
            }
        }
        for (method, patterns) in &self.patterns {
            for (spec, _) in patterns {
                set.entry(&format_args!("{method} {spec}"));
            }
        }
        if self.fallback.is_some() {
            set.entry(&format_args!("* fallback"));
        }
        set.finish()
    }
}
