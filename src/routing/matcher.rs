//! Route matching logic.
//!
//! # Responsibilities
//! - Match a request path against a module route
//!
//! # Design Decisions
//! - A route is a path prefix: `/user` serves `/user` and `/user/...`
//! - Matching only happens on segment boundaries (`/user` never serves `/users`)
//! - ASCII case-insensitive, trailing slash on the route is ignored

/// Matches request paths mounted under a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePrefix {
    prefix: String,
}

impl RoutePrefix {
    pub fn new(route: impl Into<String>) -> Self {
        let route = route.into();
        Self {
            prefix: route.trim_end_matches('/').to_string(),
        }
    }

    /// Returns true if `path` is served by this route.
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.as_bytes();
        let path = path.as_bytes();
        if prefix.is_empty() {
            return true;
        }
        if path.len() < prefix.len() || !path[..prefix.len()].eq_ignore_ascii_case(prefix) {
            return false;
        }
        path.len() == prefix.len() || path[prefix.len()] == b'/'
    }

    /// Key used to detect two routes claiming the same prefix.
    pub fn key(&self) -> String {
        self.prefix.to_ascii_lowercase()
    }
}
