#![forbid(unsafe_code)]
#![deny(
    clippy::dbg_macro,
    missing_copy_implementations,
    rustdoc::missing_crate_level_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications
)]

/*!
This crate represents the majority of the http logic for the sorrel
server core, and is intended to be independently useful for embedding
an http/1.1 server inside of another application.

The primary entrypoint is [`ServerConfig::run`], which performs http on
a duplex byte stream (the [`Transport`][transport::Transport]) by
repeatedly parsing requests from a reusable buffer, applying an async
`Conn -> Conn` handler function, and writing the response back, until
the connection closes or a protocol upgrade takes ownership of the
transport.
*/

mod error;
pub use error::{Error, Result};

mod method;
pub use method::Method;

mod status;
pub use status::Status;

mod version;
pub use version::Version;

mod buffer;
pub use buffer::{Buffer, BufferPool};

mod headers;
pub use headers::{HeaderName, Headers, KnownHeaderName, ResponseHeaders};

mod parser;
pub use parser::ParsedRequest;

mod body;
pub use body::Body;

mod copy;
pub(crate) use copy::copy;

mod http_config;
pub use http_config::HttpConfig;

mod conn;
pub use conn::{Conn, SERVER};

mod connection_status;
pub use connection_status::ConnectionStatus;

mod upgrade;
pub use upgrade::Upgrade;

mod server_config;
pub use server_config::ServerConfig;

mod state_set;
pub use state_set::StateSet;

pub mod forms;
pub mod multipart;

mod synthetic;
pub use synthetic::Synthetic;

pub mod transport;

pub use swansong::Swansong;
