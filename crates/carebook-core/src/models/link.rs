//! Therapist/organization pairing and its revenue shares.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Link approval status. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkStatus {
    Pending,
    Approved,
    Rejected,
}

impl LinkStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkStatus::Approved | LinkStatus::Rejected)
    }
}

/// A therapist's membership in an organization, owned by the organization.
///
/// Shares divide the post-commission remainder of organization-routed
/// bookings; they must sum to exactly 100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TherapistOrganizationLink {
    pub therapist_id: Uuid,
    pub organization_id: Uuid,
    pub therapist_percentage: u32,
    pub organization_percentage: u32,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TherapistOrganizationLink {
    pub fn new(
        therapist_id: Uuid,
        organization_id: Uuid,
        therapist_percentage: u32,
        organization_percentage: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            therapist_id,
            organization_id,
            therapist_percentage,
            organization_percentage,
            status: LinkStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Shares must sum to exactly 100.
    pub fn shares_are_valid(&self) -> bool {
        u64::from(self.therapist_percentage) + u64::from(self.organization_percentage) == 100
    }

    pub fn is_approved(&self) -> bool {
        self.status == LinkStatus::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_must_sum_to_100() {
        let now = Utc::now();
        let link = TherapistOrganizationLink::new(Uuid::new_v4(), Uuid::new_v4(), 60, 40, now);
        assert!(link.shares_are_valid());

        let bad = TherapistOrganizationLink::new(Uuid::new_v4(), Uuid::new_v4(), 60, 30, now);
        assert!(!bad.shares_are_valid());
    }

    #[test]
    fn test_new_link_is_pending() {
        let link =
            TherapistOrganizationLink::new(Uuid::new_v4(), Uuid::new_v4(), 70, 30, Utc::now());
        assert_eq!(link.status, LinkStatus::Pending);
        assert!(!link.is_approved());
        assert!(!link.status.is_terminal());
    }
}
