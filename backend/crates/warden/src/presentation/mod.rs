//! Presentation Layer
//!
//! HTTP request view and axum middleware.

pub mod middleware;
pub mod request;

pub use middleware::{
    CurrentSession, WardenMiddlewareState, require_authorization, require_session,
};
pub use request::HttpRequest;
