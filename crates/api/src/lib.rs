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
# Typed handler binding for sorrel.

This crate turns loosely-typed conns into strongly-typed handler
invocations:

* [`api`] wraps an async function that receives the conn plus a
  [`Params`] lookup, binding named parameters from route values (which
  take precedence) and query parameters with primitive coercion,
* handler return values that are not the conn itself go through the
  [`ApiOutput`] result handler — the default serializes to JSON,
* [`ApiConnExt`] maps request bodies into typed targets (JSON, form,
  multipart),
* [`Controller`] groups routes under a shared path prefix and expands
  to plain router registrations.

```rust
use sorrel_api::{api, Json, Params, ParamError};
use sorrel_router::Router;

#[derive(serde::Serialize)]
struct Sum { value: i64 }

let router = Router::new().get(
    "/add/:a",
    api(|conn: sorrel::Conn, params: Params| async move {
        let output = (|| -> Result<Json<Sum>, ParamError> {
            let a: i64 = params.required("a")?;
            let b: i64 = params.required("b")?;
            Ok(Json(Sum { value: a + b }))
        })();
        (conn, output)
    }),
);
# let _ = router;
```

A missing required parameter leaves the conn unhandled so dispatch
falls through; a present but uncoercible parameter answers a 500 with
a short plain-text body.
*/

mod extract;
pub use extract::{FromParam, ParamError, Params};

mod api_handler;
pub use api_handler::{api, ApiHandler, ApiOutput, Json};

mod body;
pub use body::{ApiConnExt, BodyError};

mod controller;
pub use controller::{Controller, ControllerExt};
