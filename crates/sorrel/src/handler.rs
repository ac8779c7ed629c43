use crate::{async_trait, Conn, Info, Upgrade};
use std::{borrow::Cow, fmt, future::Future, sync::Arc};

/**
# The building block for sorrel applications.

A handler is `async fn(Conn) -> Conn`. There is no separate middleware
concept: a handler that wants to wrap the rest of the pipeline does
its "pre" work in [`Handler::run`] and its "post" work in
[`Handler::before_send`], and short-circuits everything downstream by
[halting][Conn::halt] the conn instead of passing it along.

The simplest handler is an async closure:

```rust
let handler = |conn: sorrel::Conn| async move { conn.ok("hello") };
```

Named types implement the trait directly:

```rust
use sorrel::{async_trait, Conn, Handler};

struct RequireHost;

#[async_trait]
impl Handler for RequireHost {
    async fn run(&self, conn: Conn) -> Conn {
        if conn.request_headers().has_header("host") {
            conn
        } else {
            conn.with_status(400).halt()
        }
    }
}
```

An ordered pipeline of handlers is a [`Stack`].
*/
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Executes this handler, performing any modifications to the
    /// conn that are desired.
    async fn run(&self, conn: Conn) -> Conn;

    /// Performs one-time async setup on a mutable borrow of this
    /// handler before the server begins accepting. Route tables and
    /// caches are built here, which is why they are immutable
    /// afterwards.
    async fn init(&mut self, _info: &mut Info) {}

    /// Performs any final modification to the conn after the full
    /// pipeline has run, in reverse registration order. Runs whether
    /// or not the conn was halted before this handler's `run` was
    /// reached.
    async fn before_send(&self, conn: Conn) -> Conn {
        conn
    }

    /// Predicate answering whether this handler wants ownership of
    /// the negotiated protocol upgrade. The first handler answering
    /// true receives it in [`Handler::upgrade`].
    fn has_upgrade(&self, _upgrade: &Upgrade) -> bool {
        false
    }

    /// Called at most once per connection, only if
    /// [`Handler::has_upgrade`] answered true. Takes exclusive
    /// ownership of the transport; dropping it disconnects.
    async fn upgrade(&self, _upgrade: Upgrade) {
        unimplemented!("handlers that answer true to has_upgrade must implement upgrade")
    }

    /// The name of this handler, for debug output.
    fn name(&self) -> Cow<'static, str> {
        std::any::type_name::<Self>().into()
    }
}

#[async_trait]
impl<Fun, Fut> Handler for Fun
where
    Fun: Fn(Conn) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Conn> + Send + 'static,
{
    async fn run(&self, conn: Conn) -> Conn {
        (self)(conn).await
    }
}

// the two pointer shapes the workspace stores handlers behind: the
// router boxes them, the server and controllers share them
#[async_trait]
impl Handler for Box<dyn Handler> {
    async fn run(&self, conn: Conn) -> Conn {
        self.as_ref().run(conn).await
    }

    async fn init(&mut self, info: &mut Info) {
        self.as_mut().init(info).await;
    }

    async fn before_send(&self, conn: Conn) -> Conn {
        self.as_ref().before_send(conn).await
    }

    fn has_upgrade(&self, upgrade: &Upgrade) -> bool {
        self.as_ref().has_upgrade(upgrade)
    }

    async fn upgrade(&self, upgrade: Upgrade) {
        self.as_ref().upgrade(upgrade).await;
    }

    fn name(&self) -> Cow<'static, str> {
        self.as_ref().name()
    }
}

#[async_trait]
impl<H: Handler> Handler for Arc<H> {
    async fn run(&self, conn: Conn) -> Conn {
        self.as_ref().run(conn).await
    }

    /// Initialization requires exclusive access; a handler that has
    /// already been shared is left as it was registered.
    async fn init(&mut self, info: &mut Info) {
        match Self::get_mut(self) {
            Some(handler) => handler.init(info).await,
            None => log::error!("skipping init of {}: it is already shared", self.name()),
        }
    }

    async fn before_send(&self, conn: Conn) -> Conn {
        self.as_ref().before_send(conn).await
    }

    fn has_upgrade(&self, upgrade: &Upgrade) -> bool {
        self.as_ref().has_upgrade(upgrade)
    }

    async fn upgrade(&self, upgrade: Upgrade) {
        self.as_ref().upgrade(upgrade).await;
    }

    fn name(&self) -> Cow<'static, str> {
        self.as_ref().name()
    }
}

impl fmt::Debug for Box<dyn Handler> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().as_ref())
    }
}

/**
An ordered middleware pipeline.

Registration order determines wrapping order: for a stack of `H1 … Hn`
the effective call order is `H1 → H2 → … → Hn`, stopping at the first
handler that halts the conn; `before_send` then unwinds in the reverse
order. The stack is assembled before the server starts and dispatch
walks a plain slice, so composing the pipeline costs nothing per
request.

```rust
let app = sorrel::Stack::new()
    .and(|conn: sorrel::Conn| async move {
        if conn.request_headers().has_header("x-blocked") {
            conn.with_status(403).halt()
        } else {
            conn
        }
    })
    .and(|conn: sorrel::Conn| async move { conn.ok("made it through") });
# let _ = app;
```
*/
#[derive(Default)]
pub struct Stack {
    handlers: Vec<Box<dyn Handler>>,
}

impl Stack {
    /// an empty pipeline, which passes every conn through untouched
    pub fn new() -> Self {
        Self::default()
    }

    /// chainable registration of the next handler in the pipeline
    #[must_use]
    pub fn and(mut self, handler: impl Handler) -> Self {
        self.push(handler);
        self
    }

    /// append a handler to the pipeline
    pub fn push(&mut self, handler: impl Handler) {
        self.handlers.push(Box::new(handler));
    }

    /// how many handlers are registered
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// is the pipeline empty?
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.iter()).finish()
    }
}

#[async_trait]
impl Handler for Stack {
    async fn run(&self, mut conn: Conn) -> Conn {
        for handler in &self.handlers {
            log::debug!("running {}", handler.name());
            conn = handler.run(conn).await;
            if conn.is_halted() {
                break;
            }
        }
        conn
    }

    async fn init(&mut self, info: &mut Info) {
        for handler in &mut self.handlers {
            handler.init(info).await;
        }
    }

    async fn before_send(&self, mut conn: Conn) -> Conn {
        for handler in self.handlers.iter().rev() {
            conn = handler.before_send(conn).await;
        }
        conn
    }

    fn has_upgrade(&self, upgrade: &Upgrade) -> bool {
        self.handlers
            .iter()
            .any(|handler| handler.has_upgrade(upgrade))
    }

    async fn upgrade(&self, upgrade: Upgrade) {
        if let Some(handler) = self
            .handlers
            .iter()
            .find(|handler| handler.has_upgrade(&upgrade))
        {
            handler.upgrade(upgrade).await;
        }
    }

    fn name(&self) -> Cow<'static, str> {
        self.handlers
            .iter()
            .map(|handler| handler.name())
            .collect::<Vec<_>>()
            .join(" → ")
            .into()
    }
}
