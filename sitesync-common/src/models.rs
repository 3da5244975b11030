//! Site and material record models
//!
//! Wire field names (`_id`, `site_id`, `added_by`, `created_by`) are shared by the
//! HTTP API and the real-time event surface, so clients render both identically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A physical site. Its `id` is the room key for real-time broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub location: String,
    pub created_by: String,
}

/// A material entry on a site
///
/// Immutable once persisted; the only later transition is deletion. `added_by` is the
/// ownership marker used for delete authorization and is never re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Soft reference to [`Site::id`]; a dangling value is valid but orphaned
    pub site_id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub added_by: String,
    /// Human-readable `%Y-%m-%d %H:%M`, never used for ordering
    pub timestamp: String,
}

/// Actor role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(crate::Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Authenticated actor bound to one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Delete policy: admins may delete anything, everyone else only what they added
    pub fn may_delete(&self, record: &MaterialRecord) -> bool {
        self.is_admin() || self.username == record.added_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_added_by(owner: &str) -> MaterialRecord {
        MaterialRecord {
            id: "m-1".to_string(),
            site_id: "S1".to_string(),
            name: "Cement".to_string(),
            quantity: 50.0,
            unit: "bags".to_string(),
            added_by: owner.to_string(),
            timestamp: "2026-10-18 09:30".to_string(),
        }
    }

    #[test]
    fn test_owner_may_delete() {
        let alice = Identity::new("alice", Role::User);
        assert!(alice.may_delete(&record_added_by("alice")));
    }

    #[test]
    fn test_other_user_may_not_delete() {
        let bob = Identity::new("bob", Role::User);
        assert!(!bob.may_delete(&record_added_by("alice")));
    }

    #[test]
    fn test_admin_may_delete_anything() {
        let carol = Identity::new("carol", Role::Admin);
        assert!(carol.may_delete(&record_added_by("alice")));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_material_wire_field_names() {
        let json = serde_json::to_value(record_added_by("alice")).unwrap();
        assert_eq!(json["_id"], "m-1");
        assert_eq!(json["site_id"], "S1");
        assert_eq!(json["added_by"], "alice");
        assert!(json.get("id").is_none());
    }
}
