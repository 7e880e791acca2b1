//! Directory records for therapists and organizations.
//!
//! Only what commission resolution and analytics need: a display name and an
//! optional per-party commission override. Profile CRUD lives outside the
//! core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A therapist directory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Therapist {
    pub id: Uuid,
    pub name: String,
    /// Overrides the organization and platform commission when set
    pub commission_override: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Therapist {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            commission_override: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An organization directory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// Overrides the platform commission when set (loses to a therapist override)
    pub commission_override: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            commission_override: None,
            created_at: now,
            updated_at: now,
        }
    }
}
