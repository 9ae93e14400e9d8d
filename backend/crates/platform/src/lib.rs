//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations for hosts of the
//! session core:
//! - Cookie reading and Set-Cookie construction
//! - Header / query-string token lookup
//! - Client address resolution
//! - Password encoding (Argon2id)

pub mod client;
pub mod cookie;
pub mod password;
pub mod request;
