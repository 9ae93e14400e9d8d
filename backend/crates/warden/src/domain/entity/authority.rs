//! Authority
//!
//! What a subject holds: either a flat role/permission string, or a
//! verb+path grant such as `GET:/pet/**`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verb sentinel meaning "any method"
pub const ALL_METHODS: &str = "ALL";

const KNOWN_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE", ALL_METHODS,
];

/// Authority held by a subject
///
/// The discriminant decides how the authorization engine evaluates it; a
/// subject's list is expected to use one variant only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Authority {
    /// Role name or permission code, compared by exact equality
    Simple { authority: String },
    /// Verb + path pattern; `method` may be [`ALL_METHODS`]
    MethodAndPath { method: String, path: String },
}

impl Authority {
    pub fn simple(authority: impl Into<String>) -> Self {
        Authority::Simple {
            authority: authority.into(),
        }
    }

    pub fn method_and_path(method: impl Into<String>, path: impl Into<String>) -> Self {
        Authority::MethodAndPath {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Parse `VERB:PATH` into a verb+path authority, anything else into a
    /// simple one.
    ///
    /// ```rust
    /// use warden::domain::entity::authority::Authority;
    ///
    /// assert_eq!(
    ///     Authority::parse("get:/pet/**"),
    ///     Authority::method_and_path("GET", "/pet/**")
    /// );
    /// assert_eq!(Authority::parse("catSave"), Authority::simple("catSave"));
    /// assert_eq!(Authority::parse("scope:read"), Authority::simple("scope:read"));
    /// ```
    pub fn parse(raw: &str) -> Self {
        if let Some((verb, path)) = raw.split_once(':') {
            let verb = verb.trim().to_ascii_uppercase();
            if KNOWN_METHODS.contains(&verb.as_str()) && !path.is_empty() {
                return Authority::method_and_path(verb, path.trim());
            }
        }
        Authority::simple(raw)
    }

    /// Rendered authority string
    pub fn authority(&self) -> String {
        match self {
            Authority::Simple { authority } => authority.clone(),
            Authority::MethodAndPath { method, path } => format!("{method}:{path}"),
        }
    }

    /// Whether `method` is granted by this authority's verb
    ///
    /// Always false for simple authorities.
    pub fn allows_method(&self, method: &str) -> bool {
        match self {
            Authority::Simple { .. } => false,
            Authority::MethodAndPath { method: verb, .. } => {
                verb.eq_ignore_ascii_case(ALL_METHODS) || verb.eq_ignore_ascii_case(method)
            }
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}
