//! Domain Layer
//!
//! Entities, the path matcher, listener contracts and the storage traits.

pub mod cache;
pub mod entity;
pub mod event;
pub mod repository;
pub mod request;
pub mod service;
pub mod store;

// Re-exports
pub use cache::Cache;
pub use entity::{Authority, Catalog, Page, Session, SubjectDetails};
pub use event::{AuthenticationListener, LoginOutcome, SessionListener};
pub use repository::{AuthorizationMetadataProvider, SessionRepository};
pub use request::{InboundRequest, PlainRequest};
pub use service::PathMatcher;
pub use store::SharedStore;
