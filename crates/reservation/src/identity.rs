//! Authenticated caller identity
//!
//! Token verification happens upstream. The core only receives the verified
//! principal and records it as the actor of each mutating operation.

use serde::{Deserialize, Serialize};

/// Role required to create products or change their total stock
pub const INVENTORY_ADMIN_ROLE: &str = "inventory-admin";

/// Verified principal on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject: String,
    roles: Vec<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Identity used for start-up seeding and maintenance tasks
    pub fn system() -> Self {
        Self::new("system").with_roles(["system", INVENTORY_ADMIN_ROLE])
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.subject)
    }
}
