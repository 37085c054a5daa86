//! The HTTP upgrade request a connection was opened with.

use std::collections::HashMap;

/// Path, query and headers of the upgrade request.
///
/// The hub never authorizes anything itself; this is what an upstream
/// gateway hands over so an authenticator can recover the caller's
/// identity (room from the path, user from headers or query).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    path: String,
    query: Vec<(String, String)>,
    headers: HashMap<String, String>,
}

impl ConnectRequest {
    /// Parses a request target such as `/ws/r1?userId=42&userName=alice`.
    ///
    /// Query values are percent-decoded.
    pub fn from_target(target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let query = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self {
            path: path.to_string(),
            query,
            headers: HashMap::new(),
        }
    }

    /// Adds a header. Names are matched case-insensitively.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-empty `/`-separated path segments.
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// The first value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// A header value, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_target_splits_path_and_query() {
        let req = ConnectRequest::from_target("/api/ws/r1?userId=42&userName=al%20ice");
        assert_eq!(req.path(), "/api/ws/r1");
        assert_eq!(req.query_param("userId"), Some("42"));
        assert_eq!(req.query_param("userName"), Some("al ice"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn test_from_target_without_query() {
        let req = ConnectRequest::from_target("/ws/lobby");
        assert_eq!(req.path_segments().collect::<Vec<_>>(), ["ws", "lobby"]);
        assert_eq!(req.query_param("userId"), None);
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = ConnectRequest::from_target("/")
            .with_header("X-User-Id", "u1");
        assert_eq!(req.header("x-user-id"), Some("u1"));
        assert_eq!(req.header("X-USER-ID"), Some("u1"));
    }
}
