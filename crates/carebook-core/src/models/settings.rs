//! Versioned platform configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A platform settings snapshot.
///
/// Settings are versioned rows, never a mutable global: confirmation reads
/// the current version and snapshots what it needs into the booking and the
/// escrow hold, so later admin edits only affect future confirmations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformSettings {
    pub version: i64,
    /// Global default commission, whole percent in `0..=100`
    pub platform_commission_percentage: u32,
    /// Escrow release delay applied after session completion
    pub escrow_hold_hours: i64,
    /// Admin who wrote this version; `None` for the seeded defaults
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl PlatformSettings {
    pub fn commission_is_valid(&self) -> bool {
        self.platform_commission_percentage <= 100
    }
}
