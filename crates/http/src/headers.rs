mod known_header_name;
pub use known_header_name::KnownHeaderName;

use cookie::Cookie;
use smallvec::SmallVec;
use std::fmt::{self, Debug, Display, Formatter};

/// A header name: either one of the common names with a fixed slot in
/// the request store, or an arbitrary token compared
/// case-insensitively.
#[derive(Debug, Clone, Eq)]
pub enum HeaderName {
    /// one of the fixed-slot names
    Known(KnownHeaderName),
    /// any other header name, capitalization preserved as given
    Unknown(String),
}

impl HeaderName {
    /// the string representation of this header name
    pub fn as_str(&self) -> &str {
        match self {
            HeaderName::Known(known) => known.as_str(),
            HeaderName::Unknown(name) => name,
        }
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HeaderName::Known(a), HeaderName::Known(b)) => a == b,
            _ => self.as_str().eq_ignore_ascii_case(other.as_str()),
        }
    }
}

impl From<KnownHeaderName> for HeaderName {
    fn from(known: KnownHeaderName) -> Self {
        HeaderName::Known(known)
    }
}

impl From<&str> for HeaderName {
    fn from(name: &str) -> Self {
        match KnownHeaderName::parse(name) {
            Some(known) => HeaderName::Known(known),
            None => HeaderName::Unknown(name.to_string()),
        }
    }
}

impl From<String> for HeaderName {
    fn from(name: String) -> Self {
        match KnownHeaderName::parse(&name) {
            Some(known) => HeaderName::Known(known),
            None => HeaderName::Unknown(name),
        }
    }
}

impl Display for HeaderName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request header store.
///
/// Common names live in a fixed-shape array indexed by
/// [`KnownHeaderName`] discriminant; everything else goes into an
/// append-only list with case-insensitive lookup. Enumeration yields
/// the populated fixed slots first, then the list in insertion order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    known: [Option<String>; KnownHeaderName::COUNT],
    extra: SmallVec<[(String, String); 8]>,
}

impl Headers {
    /// construct an empty header store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header. Known names assign their fixed slot, replacing
    /// any previous value; other names append to the fallback list.
    pub fn append(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        match name.into() {
            HeaderName::Known(known) => self.known[known as usize] = Some(value.into()),
            HeaderName::Unknown(name) => self.extra.push((name, value.into())),
        }
    }

    /// retrieve a header value, fixed slot first, then a linear
    /// case-insensitive scan of the fallback list
    pub fn get(&self, name: impl Into<HeaderName>) -> Option<&str> {
        match name.into() {
            HeaderName::Known(known) => self.known[known as usize].as_deref(),
            HeaderName::Unknown(name) => self
                .extra
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(&name))
                .map(|(_, v)| &**v),
        }
    }

    /// predicate for the presence of a header
    pub fn has_header(&self, name: impl Into<HeaderName>) -> bool {
        self.get(name).is_some()
    }

    /// take a header out of the store
    pub fn remove(&mut self, name: impl Into<HeaderName>) -> Option<String> {
        match name.into() {
            HeaderName::Known(known) => self.known[known as usize].take(),
            HeaderName::Unknown(name) => {
                let index = self
                    .extra
                    .iter()
                    .position(|(n, _)| n.eq_ignore_ascii_case(&name))?;
                Some(self.extra.remove(index).1)
            }
        }
    }

    /// whether the value for `name` is ascii-case-insensitively equal
    /// to `needle`. false when the header is absent.
    pub fn eq_ignore_ascii_case(&self, name: impl Into<HeaderName>, needle: &str) -> bool {
        self.get(name).is_some_and(|v| v.eq_ignore_ascii_case(needle))
    }

    /// whether the comma-separated value for `name` contains `token`,
    /// compared ascii-case-insensitively. This is the lookup used for
    /// `Connection: keep-alive, upgrade`-style headers.
    pub fn contains_token(&self, name: impl Into<HeaderName>, token: &str) -> bool {
        self.get(name).is_some_and(|value| {
            value
                .split(',')
                .any(|part| part.trim().eq_ignore_ascii_case(token))
        })
    }

    /// how many headers are present
    pub fn len(&self) -> usize {
        self.known.iter().filter(|slot| slot.is_some()).count() + self.extra.len()
    }

    /// are there zero headers?
    pub fn is_empty(&self) -> bool {
        self.extra.is_empty() && self.known.iter().all(Option::is_none)
    }

    /// Iterate over all headers: populated fixed slots in
    /// [`KnownHeaderName`] order, then the fallback list in insertion
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (HeaderName, &str)> {
        KnownHeaderName::ALL
            .iter()
            .filter_map(|known| {
                self.known[*known as usize]
                    .as_deref()
                    .map(|value| (HeaderName::Known(*known), value))
            })
            .chain(
                self.extra
                    .iter()
                    .map(|(name, value)| (HeaderName::Unknown(name.clone()), &**value)),
            )
    }

    /// Parse the Cookie header into decoded name/value pairs, values
    /// trimmed per RFC 6265. Cookie names are case-sensitive, so
    /// lookups against the returned pairs should compare exactly.
    pub fn cookies(&self) -> Vec<(String, String)> {
        let Some(header) = self.get(KnownHeaderName::Cookie) else {
            return Vec::new();
        };

        Cookie::split_parse_encoded(header)
            .filter_map(|cookie| {
                let cookie = cookie.ok()?;
                Some((cookie.name().to_string(), cookie.value_trimmed().to_string()))
            })
            .collect()
    }
}

impl Debug for Headers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(name, value)| (name.to_string(), value)))
            .finish()
    }
}

impl Display for Headers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            f.write_fmt(format_args!("{name}: {value}\r\n"))?;
        }
        Ok(())
    }
}

impl<N: Into<HeaderName>, V: Into<String>> Extend<(N, V)> for Headers {
    fn extend<T: IntoIterator<Item = (N, V)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.append(name, value);
        }
    }
}

impl<N: Into<HeaderName>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}

/// The response header list.
///
/// Unlike the request store this is a plain ordered list, because
/// responses legitimately repeat header names (`Set-Cookie`, `Vary`)
/// and are written out in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(HeaderName, String)>,
}

impl ResponseHeaders {
    /// construct an empty header list
    pub fn new() -> Self {
        Self::default()
    }

    /// append a header, permitting duplicate names
    pub fn append(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// replace all headers with this name by a single entry
    pub fn insert(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, value.into()));
    }

    /// insert if and only if the name is not already present
    pub fn try_insert(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        let name = name.into();
        if !self.has_header(name.clone()) {
            self.entries.push((name, value.into()));
        }
    }

    /// insert if absent, with a lazily computed value
    pub fn try_insert_with<V: Into<String>>(
        &mut self,
        name: impl Into<HeaderName>,
        value: impl FnOnce() -> V,
    ) {
        let name = name.into();
        if !self.has_header(name.clone()) {
            self.entries.push((name, value().into()));
        }
    }

    /// the first value for this name
    pub fn get(&self, name: impl Into<HeaderName>) -> Option<&str> {
        let name = name.into();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| &**v)
    }

    /// predicate for the presence of a header name
    pub fn has_header(&self, name: impl Into<HeaderName>) -> bool {
        let name = name.into();
        self.entries.iter().any(|(n, _)| *n == name)
    }

    /// remove all values for this name
    pub fn remove(&mut self, name: impl Into<HeaderName>) {
        let name = name.into();
        self.entries.retain(|(n, _)| *n != name);
    }

    /// whether the comma-separated value for `name` contains `token`
    pub fn contains_token(&self, name: impl Into<HeaderName>, token: &str) -> bool {
        let name = name.into();
        self.entries.iter().any(|(n, value)| {
            *n == name
                && value
                    .split(',')
                    .any(|part| part.trim().eq_ignore_ascii_case(token))
        })
    }

    /// iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.entries.iter().map(|(name, value)| (name, &**value))
    }

    /// how many entries, duplicates included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// are there zero entries?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<HeaderName>, V: Into<String>> Extend<(N, V)> for ResponseHeaders {
    fn extend<T: IntoIterator<Item = (N, V)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.append(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_names_use_fixed_slots() {
        let mut headers = Headers::new();
        headers.append("host", "example.com");
        headers.append("HOST", "example.org");
        assert_eq!(headers.get(KnownHeaderName::Host), Some("example.org"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn unknown_names_are_case_insensitive_and_ordered() {
        let mut headers = Headers::new();
        headers.append("X-First", "1");
        headers.append("X-Second", "2");
        assert_eq!(headers.get("x-first"), Some("1"));
        let names = headers
            .iter()
            .map(|(name, _)| name.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["X-First", "X-Second"]);
    }

    #[test]
    fn enumeration_yields_known_before_extra() {
        let mut headers = Headers::new();
        headers.append("X-Custom", "custom");
        headers.append(KnownHeaderName::Host, "example.com");
        let names = headers
            .iter()
            .map(|(name, _)| name.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Host", "X-Custom"]);
    }

    #[test]
    fn connection_token_lookup() {
        let mut headers = Headers::new();
        headers.append(KnownHeaderName::Connection, "keep-alive, Upgrade");
        assert!(headers.contains_token(KnownHeaderName::Connection, "upgrade"));
        assert!(headers.contains_token(KnownHeaderName::Connection, "keep-alive"));
        assert!(!headers.contains_token(KnownHeaderName::Connection, "close"));
    }

    #[test]
    fn cookie_parsing() {
        let mut headers = Headers::new();
        headers.append(KnownHeaderName::Cookie, "session=abc123; Theme=dark%20mode");
        let cookies = headers.cookies();
        assert_eq!(
            cookies,
            vec![
                ("session".to_string(), "abc123".to_string()),
                ("Theme".to_string(), "dark mode".to_string()),
            ]
        );
    }

    #[test]
    fn response_headers_permit_duplicates() {
        let mut headers = ResponseHeaders::new();
        headers.append(KnownHeaderName::SetCookie, "a=1");
        headers.append(KnownHeaderName::SetCookie, "b=2");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get(KnownHeaderName::SetCookie), Some("a=1"));
        headers.insert(KnownHeaderName::SetCookie, "c=3");
        assert_eq!(headers.len(), 1);
    }
}
