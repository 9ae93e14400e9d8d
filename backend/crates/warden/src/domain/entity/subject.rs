//! Subject details carried on a session

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::entity::authority::Authority;

/// The authenticated subject as seen by the core
///
/// `attributes` is an opaque host payload (display name, user id, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectDetails {
    pub principal: String,
    pub enabled: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub authorities: Vec<Authority>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl SubjectDetails {
    /// Enabled subject with no roles or authorities
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            enabled: true,
            roles: Vec::new(),
            authorities: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_authorities(mut self, authorities: Vec<Authority>) -> Self {
        self.authorities = authorities;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Principal is present and not whitespace only
    pub fn has_principal(&self) -> bool {
        !self.principal.trim().is_empty()
    }
}
