//! HTTP request view
//!
//! Borrows an `http` request's method, path, headers and query string so
//! the coordinators can read a session token from it.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri};
use platform::cookie::extract_cookie;
use platform::request::{extract_header, extract_query_param};

use crate::domain::request::InboundRequest;

#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
}

impl<'a> HttpRequest<'a> {
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        Self::new(request.method(), request.uri(), request.headers())
    }

    pub fn from_parts(parts: &'a Parts) -> Self {
        Self::new(&parts.method, &parts.uri, &parts.headers)
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }
}

impl InboundRequest for HttpRequest<'_> {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn path(&self) -> &str {
        self.uri.path()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        extract_cookie(self.headers, name)
    }

    fn header(&self, name: &str) -> Option<String> {
        extract_header(self.headers, name)
    }

    fn query_param(&self, name: &str) -> Option<String> {
        extract_query_param(self.uri.query(), name)
    }
}
