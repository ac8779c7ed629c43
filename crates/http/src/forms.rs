/*!
Query-string and form-url-encoded decoding.

Both wire shapes are `key=value` pairs joined by `&`, with `+`
standing for space and `%HH` escapes. Query parameter keys compare
case-insensitively; form field keys compare exactly, and repeated keys
(or the `key[]` convention) accumulate list values.
*/

use crate::{Error, Result};

/// Decode `%HH` escapes and optionally `+` as space. Invalid escape
/// sequences are kept literally rather than rejected, matching what
/// browsers send servers that tolerate them.
pub fn percent_decode(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' if plus_as_space => {
                decoded.push(b' ');
                i += 1;
            }
            b'%' => {
                match (hex_digit(bytes.get(i + 1)), hex_digit(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        decoded.push(hi * 16 + lo);
                        i += 3;
                    }
                    _ => {
                        decoded.push(b'%');
                        i += 1;
                    }
                }
            }
            other => {
                decoded.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_digit(byte: Option<&u8>) -> Option<u8> {
    (*byte? as char).to_digit(16).map(|d| d as u8)
}

/// Decoded query parameters, in wire order, with case-insensitive
/// keys.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// parse a raw query string (without the leading `?`)
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => {
                    (percent_decode(key, true), percent_decode(value, true))
                }
                None => (percent_decode(pair, true), String::new()),
            })
            .collect();

        Self { pairs }
    }

    /// the first value for this key, compared case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| &**v)
    }

    /// every value for this key
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.pairs
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| &**v)
    }

    /// iterate the decoded pairs in wire order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (&**k, &**v))
    }

    /// number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// are there zero pairs?
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A decoded `application/x-www-form-urlencoded` body.
///
/// Field keys compare exactly. A repeated key, or a key written with
/// the `key[]` convention, accumulates multiple values under one
/// entry in first-seen order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, Vec<String>)>,
}

impl FormData {
    /// parse a form body
    pub fn parse(body: &[u8]) -> Result<Self> {
        let body = std::str::from_utf8(body)
            .map_err(|_| Error::BadRequest("form body not utf-8"))?;

        let mut form = Self::default();
        for pair in body.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (percent_decode(key, true), percent_decode(value, true)),
                None => (percent_decode(pair, true), String::new()),
            };

            let key = key.strip_suffix("[]").map(str::to_string).unwrap_or(key);
            match form.entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => form.entries.push((key, vec![value])),
            }
        }

        Ok(form)
    }

    /// the first value for this field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, values)| values.first())
            .map(|v| &**v)
    }

    /// every value for this field
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| &values[..])
            .unwrap_or_default()
    }

    /// iterate fields in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (&**k, &v[..]))
    }

    /// number of distinct fields
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// are there zero fields?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
