#![forbid(unsafe_code)]
#![deny(
    clippy::dbg_macro,
    missing_copy_implementations,
    rustdoc::missing_crate_level_docs,
    missing_docs,
    nonstandard_style,
    unused_qualifications
)]

/*!
# HS256 json web tokens for sorrel.

[`encode`] issues tokens and [`decode`] validates them; only
HMAC-SHA-256 is spoken, and tokens claiming any other algorithm are
rejected outright. Signature comparison is constant-time.

The [`JwtHandler`] middleware resolves a token per request — from the
`jwt` query parameter, the `Authorization: Bearer` header, or the
websocket subprotocol on upgrade requests, in that order — and parks
the outcome in conn state without enforcing anything. Policy is the
application's job:

```rust
use sorrel_jwt::{JwtConnExt, JwtError, JwtHandler, JwtOptions};

let handler = sorrel::Stack::new()
    .and(JwtHandler::new(JwtOptions::new(b"secret".to_vec())))
    .and(|mut conn: sorrel::Conn| async move {
        match conn.jwt_error() {
            JwtError::None if conn.jwt_token().is_some() => {
                let user = conn.user().map(|u| u.login().to_string());
                conn.ok(format!("hello, {}", user.unwrap_or_default()))
            }
            JwtError::None => conn.with_status(401).halt(),
            error => conn.with_status(401).with_body(error.to_string()).halt(),
        }
    });
# let _ = handler;
```
*/

mod error;
pub use error::{EncodeError, JwtError};

mod options;
pub use options::JwtOptions;

mod token;
pub use token::{decode, encode, epoch_seconds, Claims, JwtToken};

mod handler;
pub use handler::{JwtConnExt, JwtHandler, JwtState, WebUser};
