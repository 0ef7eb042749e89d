use std::fmt;
use std::sync::Arc;

/// Uniquely identifies a logical request or event.
///
/// Callers that want to share a computation must build identical keys, so keys should be created
/// through [`RequestKey::request`] or [`RequestKey::event`] wherever possible.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey(Arc<str>);

impl RequestKey {
    /// Creates a key from a raw string.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        assert!(!key.is_empty(), "request keys must not be empty");
        Self(key.into())
    }

    /// Creates a key for an HTTP request, like `GET http://host/api/artist?name=x`.
    pub fn request(method: &str, url: impl fmt::Display) -> Self {
        Self::new(format!("{method} {url}"))
    }

    /// Creates a key for a named event concerning the given entities, like
    /// `playlist-view:user:playlist`.
    ///
    /// Separators and backslashes within parts are escaped with a backslash, so distinct parts
    /// always yield distinct keys.
    pub fn event<I>(name: &str, parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let mut key = name.to_owned();
        for part in parts {
            key.push(':');
            for c in part.to_string().chars() {
                if matches!(c, ':' | '\\') {
                    key.push('\\');
                }
                key.push(c);
            }
        }
        Self::new(key)
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key() {
        let key = RequestKey::request("GET", "http://localhost/api/artist?name=abba");
        assert_eq!(key.as_str(), "GET http://localhost/api/artist?name=abba");
    }

    #[test]
    fn test_event_key() {
        let key = RequestKey::event("playlist-view", ["user-1", "playlist-2"]);
        assert_eq!(key.to_string(), "playlist-view:user-1:playlist-2");

        let a = RequestKey::event("playlist-view", ["a", "bc"]);
        let b = RequestKey::event("playlist-view", ["ab", "c"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_event_key_escapes_separators() {
        let a = RequestKey::event("playlist-view", ["user:1", "p2"]);
        let b = RequestKey::event("playlist-view", ["user", "1:p2"]);
        assert_ne!(a, b);
        assert_eq!(a.as_str(), r"playlist-view:user\:1:p2");
        assert_eq!(b.as_str(), r"playlist-view:user:1\:p2");

        let a = RequestKey::event("playlist-view", [r"u\", "p"]);
        let b = RequestKey::event("playlist-view", [r"u\:p"]);
        assert_ne!(a, b);
        assert_eq!(a.as_str(), r"playlist-view:u\\:p");
        assert_eq!(b.as_str(), r"playlist-view:u\\\:p");
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_empty_key() {
        RequestKey::new("");
    }
}
