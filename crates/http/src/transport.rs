/*!
The byte stream beneath a session.

Anything that is a duplex async byte stream can carry http: a tcp
stream, a tls-wrapped tcp stream, a unix socket, or an in-memory pair
in tests. Exactly one reader and exactly one writer exist per
transport at any time; the session loop upholds that invariant.
*/

use futures_lite::{AsyncRead, AsyncWrite};

/// A duplex byte stream that a session can own.
///
/// Blanket-implemented for every qualifying type, including
/// [`BoxedTransport`], so servers and tests never need to implement
/// it by hand.
pub trait Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static> Transport for T {}

/// A type-erased transport, used wherever handlers must be object
/// safe.
pub type BoxedTransport = Box<dyn Transport>;
