//! Inbound request view
//!
//! The core only needs a handful of facts about a request: its method and
//! path for authorization, and where a session token might be carried.

use std::collections::HashMap;

pub trait InboundRequest: Sync {
    fn method(&self) -> &str;

    fn path(&self) -> &str;

    fn cookie(&self, name: &str) -> Option<String>;

    fn header(&self, name: &str) -> Option<String>;

    fn query_param(&self, name: &str) -> Option<String>;
}

/// Owned request description for hosts that are not HTTP servers
#[derive(Debug, Clone, Default)]
pub struct PlainRequest {
    method: String,
    path: String,
    cookies: HashMap<String, String>,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl PlainRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Header names are case-insensitive
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

impl InboundRequest for PlainRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }
}
