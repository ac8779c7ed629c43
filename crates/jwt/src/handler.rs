use crate::{decode, JwtError, JwtOptions, JwtToken};
use sorrel::{async_trait, Conn, Handler, KnownHeaderName};

/// The per-request token resolution outcome, parked in conn state by
/// [`JwtHandler`].
#[derive(Debug, Clone, Default)]
pub struct JwtState {
    raw: Option<String>,
    token: Option<JwtToken>,
    error: JwtError,
}

impl JwtState {
    /// the raw token string, wherever it came from
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// the decoded token, when one was presented and validated
    pub fn token(&self) -> Option<&JwtToken> {
        self.token.as_ref()
    }

    /// why there is no valid token; [`JwtError::None`] otherwise
    pub fn error(&self) -> JwtError {
        self.error
    }
}

/// A request identity resolved from token claims, or installed
/// directly by an upstream middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebUser {
    id: String,
    login: String,
    token: Option<String>,
}

impl WebUser {
    /// construct a user directly, overriding claim-based resolution
    pub fn new(id: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            login: login.into(),
            token: None,
        }
    }

    /// the stable identifier (the `sub` claim, for token users)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// the display login
    pub fn login(&self) -> &str {
        &self.login
    }

    /// the raw token this user was resolved from, if any
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/**
Middleware that resolves a jwt for each request without enforcing
anything.

Resolution order, first non-empty source wins:

1. the `jwt` query parameter,
2. `Authorization: Bearer <token>`,
3. `Sec-WebSocket-Protocol: Bearer, <token>` on version-13 upgrade
   requests.

The outcome is always parked in state, valid or not; handlers and
downstream middlewares read [`JwtConnExt::jwt_error`] and decide
policy. If an upstream middleware already installed a [`JwtState`],
this handler leaves it alone.
*/
#[derive(Debug)]
pub struct JwtHandler {
    options: JwtOptions,
}

impl JwtHandler {
    /// build the middleware with the provided validation options
    pub fn new(options: JwtOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Handler for JwtHandler {
    async fn run(&self, mut conn: Conn) -> Conn {
        if conn.state().contains::<JwtState>() {
            return conn;
        }

        let state = match resolve_raw_token(&mut conn) {
            None => JwtState::default(),
            Some(raw) => match decode(&raw, &self.options) {
                Ok(token) => JwtState {
                    raw: Some(raw),
                    token: Some(token),
                    error: JwtError::None,
                },
                Err(error) => {
                    log::debug!("jwt did not validate: {error}");
                    JwtState {
                        raw: Some(raw),
                        token: None,
                        error,
                    }
                }
            },
        };

        conn.with_state(state)
    }
}

fn resolve_raw_token(conn: &mut Conn) -> Option<String> {
    if let Some(token) = conn.queries().get("jwt") {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(authorization) = conn
        .request_headers()
        .get(KnownHeaderName::Authorization)
    {
        if let Some(token) = strip_bearer(authorization) {
            return Some(token.to_string());
        }
    }

    if conn.upgrade_requested()
        && conn
            .request_headers()
            .eq_ignore_ascii_case(KnownHeaderName::SecWebsocketVersion, "13")
    {
        if let Some(protocols) = conn
            .request_headers()
            .get(KnownHeaderName::SecWebsocketProtocol)
        {
            let mut parts = protocols.split(',').map(str::trim);
            if parts.next().is_some_and(|p| p.eq_ignore_ascii_case("bearer")) {
                if let Some(token) = parts.next().filter(|token| !token.is_empty()) {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

// byte-wise comparison: indexing the &str would panic when a
// multi-byte character straddles the boundary, and header values are
// arbitrary utf-8
fn strip_bearer(authorization: &str) -> Option<&str> {
    let trimmed = authorization.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() > 7 && bytes[..7].eq_ignore_ascii_case(b"bearer ") {
        Some(trimmed[7..].trim())
    } else {
        None
    }
}

/// Token access on [`Conn`], populated by [`JwtHandler`].
pub trait JwtConnExt {
    /// the decoded token, when one was presented and validated
    fn jwt_token(&self) -> Option<&JwtToken>;

    /// the raw token string, valid or not
    fn raw_jwt(&self) -> Option<&str>;

    /// why there is no valid token; [`JwtError::None`] otherwise
    fn jwt_error(&self) -> JwtError;

    /// The request identity: an explicitly installed
    /// [`WebUser`] if an upstream middleware set one, otherwise one
    /// resolved lazily from the validated token's claims.
    fn user(&mut self) -> Option<WebUser>;

    /// install a [`WebUser`], overriding claim-based resolution
    fn set_user(&mut self, user: WebUser);
}

impl JwtConnExt for Conn {
    fn jwt_token(&self) -> Option<&JwtToken> {
        self.state().get::<JwtState>().and_then(JwtState::token)
    }

    fn raw_jwt(&self) -> Option<&str> {
        self.state().get::<JwtState>().and_then(JwtState::raw)
    }

    fn jwt_error(&self) -> JwtError {
        self.state().get::<JwtState>().map(JwtState::error).unwrap_or_default()
    }

    fn user(&mut self) -> Option<WebUser> {
        if let Some(user) = self.state().get::<WebUser>() {
            return Some(user.clone());
        }

        let state = self.state().get::<JwtState>()?;
        let token = state.token()?;
        let id = token.sub()?.to_string();
        let login = token
            .claim_str("login")
            .or_else(|| token.claim_str("name"))
            .unwrap_or(&id)
            .to_string();
        let user = WebUser {
            id,
            login,
            token: state.raw().map(String::from),
        };

        self.state_mut().insert(user.clone());
        Some(user)
    }

    fn set_user(&mut self, user: WebUser) {
        self.state_mut().insert(user);
    }
}
