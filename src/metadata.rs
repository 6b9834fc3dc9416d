//! Transport-origin metadata.
//!
//! An open, string-keyed bag. There is no schema: transports and the
//! middleware that read what they put there agree on keys between
//! themselves. A bag lives exactly as long as its invocation.

use std::collections::HashMap;
use std::collections::hash_map;

use http::header::{HeaderMap, HeaderName, HeaderValue};

/// Per-invocation key/value pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: HashMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool { self.entries.contains_key(key) }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // ── HTTP bridge ──────────────────────────────────────────────────────────

    /// Copies request headers into a new bag.
    ///
    /// Names come out lowercased (that is how [`HeaderName`] stores them).
    /// Repeated headers are joined with `", "`. Values that are not valid
    /// UTF-8 are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut meta = Self::new();
        for name in headers.keys() {
            let values: Vec<&str> = headers
                .get_all(name)
                .iter()
                .filter_map(|v| std::str::from_utf8(v.as_bytes()).ok())
                .collect();
            if !values.is_empty() {
                meta.insert(name.as_str(), values.join(", "));
            }
        }
        meta
    }

    /// Renders the bag as headers. Keys or values that are not valid in a
    /// header are left out.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else { continue };
            let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) else { continue };
            headers.insert(name, value);
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Metadata {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.entries.extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = Self::new();
        meta.extend(iter);
        meta
    }
}

impl IntoIterator for Metadata {
    type Item = (String, String);
    type IntoIter = hash_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut meta = Metadata::new();
        assert_eq!(meta.insert("tenant", "a"), None);
        assert_eq!(meta.insert("tenant", "b"), Some("a".to_owned()));
        assert_eq!(meta.get("tenant"), Some("b"));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn from_headers_lowercases_and_joins() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-Id", HeaderValue::from_static("abc"));
        headers.append("accept", HeaderValue::from_static("text/plain"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers.insert("x-binary", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());

        let meta = Metadata::from_headers(&headers);
        assert_eq!(meta.get("x-request-id"), Some("abc"));
        assert_eq!(meta.get("accept"), Some("text/plain, application/json"));
        assert!(!meta.contains_key("x-binary"));
    }

    #[test]
    fn from_headers_keeps_non_ascii_utf8() {
        let mut headers = HeaderMap::new();
        headers.insert("x-name", HeaderValue::from_bytes("café".as_bytes()).unwrap());

        let meta = Metadata::from_headers(&headers);
        assert_eq!(meta.get("x-name"), Some("café"));
    }

    #[test]
    fn to_headers_skips_invalid_names() {
        let meta: Metadata = [("x-trace", "t-1"), ("not a header", "v")].into_iter().collect();
        let headers = meta.to_headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-trace").unwrap(), "t-1");
    }
}
