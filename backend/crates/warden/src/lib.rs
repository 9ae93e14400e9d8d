//! Warden Session and Authorization Core
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, path matcher, listener contracts, storage traits
//! - `application/` - Authentication and authorization coordinators, config
//! - `infra/` - In-process and shared-store backends
//! - `presentation/` - HTTP request view and axum middleware
//!
//! ## Features
//! - Server-side sessions with idle timeout, in process or in a shared store
//! - One session per principal, rejecting or kicking out duplicate logins
//! - Path-pattern rule catalog with simple and method+path authorities
//! - Login retry limiting with timed lockout
//! - Periodic expiry sweep and index reconciliation
//!
//! ## Storage
//! The shared-store variant runs against any `SharedStore`. `MemoryStore`
//! is an in-process implementation; enable the `redis` feature for
//! `RedisStore`.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::{AuthenticationManager, AuthorizationManager, RetryLimiter, spawn_sweeper};
pub use application::config::WardenConfig;
pub use error::{WardenError, WardenResult};
pub use infra::{DistributedSessionStore, InProcessSessionStore, MemoryStore, StaticMetadataProvider};
#[cfg(feature = "redis")]
pub use infra::RedisStore;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
