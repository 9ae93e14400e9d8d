//! Demo subjects and rule catalog
//!
//! Stand-ins for a user database: three accounts sharing one password and
//! a small catalog protecting the `/pet` and admin routes.

use std::collections::HashMap;

use platform::password::{PasswordEncodeError, PasswordEncoder};
use warden::domain::entity::Catalog;

pub const DEMO_PASSWORD: &str = "aaaaaa";

#[derive(Debug, Clone)]
pub struct DemoUser {
    pub name: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    users: HashMap<String, DemoUser>,
}

impl Directory {
    /// Accounts keyed by `channel:id` principal
    pub fn seeded(encoder: &dyn PasswordEncoder) -> Result<Self, PasswordEncodeError> {
        let password_hash = encoder.encode(DEMO_PASSWORD)?;
        let mut users = HashMap::new();
        for (principal, name, role) in [
            ("PC:1", "alice", "admin"),
            ("APP:1", "alice", "admin"),
            ("PC:2", "bob", "user"),
        ] {
            users.insert(
                principal.to_string(),
                DemoUser {
                    name: name.to_string(),
                    password_hash: password_hash.clone(),
                    roles: vec![role.to_string()],
                },
            );
        }
        Ok(Self { users })
    }

    pub fn find(&self, principal: &str) -> Option<&DemoUser> {
        self.users.get(principal)
    }
}

/// First matching pattern wins, so the specific rules come first
pub fn catalog() -> Catalog {
    Catalog::new()
        .with_rule("/pet/cat", ["admin", "user"])
        .with_rule("/pet/cat/*", ["guest"])
        .with_rule("/pet/**", ["admin"])
        .with_rule("/online", ["admin"])
        .with_rule("/kickout/**", ["admin"])
}
