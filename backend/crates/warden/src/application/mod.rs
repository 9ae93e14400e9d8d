//! Application Layer
//!
//! Coordinators built on the domain traits: authentication, authorization,
//! login retry limiting and the expiry sweeper.

pub mod authentication;
pub mod authorization;
pub mod config;
pub mod retry_limit;
pub mod sweeper;

// Re-exports
pub use authentication::AuthenticationManager;
pub use authorization::AuthorizationManager;
pub use config::{
    AuthorityConfig, CookieSettings, RetryLimitConfig, SchedulerConfig, SessionConfig,
    WardenConfig,
};
pub use retry_limit::RetryLimiter;
pub use sweeper::spawn_sweeper;
