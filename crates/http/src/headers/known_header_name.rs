use std::fmt::{self, Display};

macro_rules! known_header_names {
    ($($variant:ident => $canonical:literal,)+) => {
        /// Header names that are common enough to deserve a fixed slot
        /// in the request [`Headers`][crate::Headers] store, making the
        /// hot-path lookups the session loop performs O(1).
        #[non_exhaustive]
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
        #[repr(usize)]
        pub enum KnownHeaderName {
            $(
                #[doc = $canonical]
                $variant,
            )+
        }

        impl KnownHeaderName {
            pub(crate) const COUNT: usize = [$(Self::$variant),+].len();
            pub(crate) const ALL: [Self; Self::COUNT] = [$(Self::$variant),+];

            /// the canonical capitalization of this header name
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $canonical,)+
                }
            }

            /// case-insensitive lookup of a wire header name
            pub fn parse(name: &str) -> Option<Self> {
                $(
                    if name.eq_ignore_ascii_case($canonical) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }
    };
}

known_header_names! {
    Accept => "Accept",
    AcceptEncoding => "Accept-Encoding",
    AcceptLanguage => "Accept-Language",
    Allow => "Allow",
    Authorization => "Authorization",
    Connection => "Connection",
    ContentLength => "Content-Length",
    ContentType => "Content-Type",
    Cookie => "Cookie",
    Date => "Date",
    Etag => "ETag",
    Expect => "Expect",
    Host => "Host",
    IfModifiedSince => "If-Modified-Since",
    IfNoneMatch => "If-None-Match",
    LastModified => "Last-Modified",
    Location => "Location",
    SecWebsocketAccept => "Sec-WebSocket-Accept",
    SecWebsocketKey => "Sec-WebSocket-Key",
    SecWebsocketProtocol => "Sec-WebSocket-Protocol",
    SecWebsocketVersion => "Sec-WebSocket-Version",
    Server => "Server",
    SetCookie => "Set-Cookie",
    TransferEncoding => "Transfer-Encoding",
    Upgrade => "Upgrade",
    UserAgent => "User-Agent",
    Vary => "Vary",
}

impl Display for KnownHeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
