use serde::{Deserialize, Serialize};
use std::fmt;

/// Someone holding a bearer token: an anonymous visitor or the site owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Visitor,
    Owner,
}

impl Identity {
    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
        }
    }

    /// Owner status is an exact match against the configured owner email.
    /// With no owner configured nobody is the owner.
    pub fn role(&self, owner_email: Option<&str>) -> Role {
        match (self.email.as_deref(), owner_email) {
            (Some(mine), Some(owner)) if mine == owner => Role::Owner,
            _ => Role::Visitor,
        }
    }

    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Visitor")
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.id)
    }
}
