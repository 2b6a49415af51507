//! The supported subset of HTTP methods.

use std::fmt;

/// HTTP request method.
///
/// Only `GET`, `POST`, `PUT` and `DELETE` travel the wire in both directions.
/// Other standard methods parse as [`Method::Unsupported`]; non-standard
/// tokens parse as [`Method::Unknown`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Unknown,
    Get,
    Post,
    Put,
    Delete,
    Unsupported,
}

impl Method {
    pub(crate) fn from_wire(token: &str) -> Method {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" | "OPTIONS" | "PATCH" | "CONNECT" | "TRACE" => Method::Unsupported,
            _ => Method::Unknown,
        }
    }

    /// The wire token, for methods that have one.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Method::Get => Some("GET"),
            Method::Post => Some("POST"),
            Method::Put => Some("PUT"),
            Method::Delete => Some("DELETE"),
            Method::Unknown | Method::Unsupported => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(token) => f.write_str(token),
            None => f.write_str("<unsupported>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_mapping() {
        assert_eq!(Method::from_wire("GET"), Method::Get);
        assert_eq!(Method::from_wire("DELETE"), Method::Delete);
        assert_eq!(Method::from_wire("HEAD"), Method::Unsupported);
        assert_eq!(Method::from_wire("PATCH"), Method::Unsupported);
        assert_eq!(Method::from_wire("BREW"), Method::Unknown);
    }

    #[test]
    fn only_supported_methods_have_tokens() {
        assert_eq!(Method::Put.as_str(), Some("PUT"));
        assert_eq!(Method::Unknown.as_str(), None);
        assert_eq!(Method::Unsupported.as_str(), None);
    }
}
