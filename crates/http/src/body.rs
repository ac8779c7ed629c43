use futures_lite::{io::Cursor, AsyncRead, AsyncReadExt};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    io::Result,
    pin::Pin,
    sync::Arc,
};

/// A response body: either bytes already in memory or an open file
/// that will be streamed from disk at send time.
///
/// Every body has a known length, because this core never emits
/// chunked responses; `Content-Length` is always computable. A file
/// body's length is the size observed when the file was opened, so
/// the file must not be mutated while a send is in flight.
#[derive(Default)]
pub struct Body(BodyInner);

#[derive(Default)]
enum BodyInner {
    #[default]
    Empty,
    Static(Cow<'static, [u8]>),
    Shared(Arc<[u8]>),
    File(async_fs::File, u64),
}

impl Body {
    /// a zero-length body
    pub fn empty() -> Self {
        Self(BodyInner::Empty)
    }

    /// a fixed body from bytes already in memory
    pub fn new_static(content: impl Into<Cow<'static, [u8]>>) -> Self {
        Self(BodyInner::Static(content.into()))
    }

    /// A body streamed from an open file. `len` is the file size at
    /// open.
    pub fn new_file(file: async_fs::File, len: u64) -> Self {
        Self(BodyInner::File(file, len))
    }

    /// A fixed body sharing refcounted bytes, so a cache can serve
    /// the same content to many conns without copying.
    pub fn new_shared(content: Arc<[u8]>) -> Self {
        Self(BodyInner::Shared(content))
    }

    /// the number of bytes this body will write
    pub fn len(&self) -> u64 {
        match &self.0 {
            BodyInner::Empty => 0,
            BodyInner::Static(content) => content.len() as u64,
            BodyInner::Shared(content) => content.len() as u64,
            BodyInner::File(_, len) => *len,
        }
    }

    /// does this body represent zero bytes?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// borrow the in-memory content, if this is not a file body
    pub fn static_bytes(&self) -> Option<&[u8]> {
        match &self.0 {
            BodyInner::Static(content) => Some(content.as_ref()),
            BodyInner::Shared(content) => Some(content),
            _ => None,
        }
    }

    /// is this body streamed from a file?
    pub fn is_file(&self) -> bool {
        matches!(self.0, BodyInner::File(..))
    }

    pub(crate) fn into_reader(self) -> Pin<Box<dyn AsyncRead + Send + Sync>> {
        match self.0 {
            BodyInner::Empty => Box::pin(Cursor::new("")),
            BodyInner::Static(content) => Box::pin(Cursor::new(content)),
            BodyInner::Shared(content) => Box::pin(Cursor::new(content)),
            BodyInner::File(file, _) => Box::pin(file),
        }
    }

    /// Consume this body, reading file content into memory if
    /// necessary.
    pub async fn into_bytes(self) -> Result<Cow<'static, [u8]>> {
        match self.0 {
            BodyInner::Empty => Ok(Cow::Borrowed(b"")),
            BodyInner::Static(content) => Ok(content),
            BodyInner::Shared(content) => Ok(Cow::Owned(content.to_vec())),
            BodyInner::File(mut file, len) => {
                let mut content = Vec::with_capacity(usize::try_from(len).unwrap_or_default());
                file.read_to_end(&mut content).await?;
                Ok(Cow::Owned(content))
            }
        }
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            BodyInner::Empty => f.write_str("Body::Empty"),
            BodyInner::Static(content) => f
                .debug_tuple("Body::Static")
                .field(&String::from_utf8_lossy(content))
                .finish(),
            BodyInner::Shared(content) => {
                f.debug_tuple("Body::Shared").field(&content.len()).finish()
            }
            BodyInner::File(_, len) => f.debug_tuple("Body::File").field(len).finish(),
        }
    }
}

impl From<&'static str> for Body {
    fn from(content: &'static str) -> Self {
        Self::new_static(content.as_bytes())
    }
}

impl From<String> for Body {
    fn from(content: String) -> Self {
        Self::new_static(content.into_bytes())
    }
}

impl From<Vec<u8>> for Body {
    fn from(content: Vec<u8>) -> Self {
        Self::new_static(content)
    }
}

impl From<&'static [u8]> for Body {
    fn from(content: &'static [u8]) -> Self {
        Self::new_static(content)
    }
}
