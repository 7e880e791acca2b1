//! Escrow hold model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RevenueSplit;

/// Escrow hold state.
///
/// Normal path `Held → Releasable → Released`; contested path
/// `Held|Releasable → Disputed → Refunded|Released`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EscrowState {
    /// Funds settled but not yet eligible for payout
    Held,
    /// Dispute window elapsed; eligible for payout
    Releasable,
    /// Paid out
    Released,
    /// Returned to the patient
    Refunded,
    /// Countdown frozen pending resolution
    Disputed,
}

impl EscrowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowState::Released | EscrowState::Refunded)
    }
}

/// Outcome of a dispute resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisputeOutcome {
    Refund,
    Release,
}

/// Per-booking escrow hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscrowHold {
    pub booking_id: Uuid,
    /// Held amounts, frozen from the split at confirmation
    pub platform_fee: i64,
    pub therapist_amount: i64,
    pub organization_amount: i64,
    pub state: EscrowState,
    pub opened_at: DateTime<Utc>,
    /// Hold window snapshotted from settings at open time; never re-read
    pub hold_hours: i64,
    /// `None` until the completion countdown starts
    pub release_eligible_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EscrowHold {
    /// Open a hold for a freshly confirmed booking.
    pub fn open(
        booking_id: Uuid,
        split: &RevenueSplit,
        hold_hours: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            booking_id,
            platform_fee: split.platform_fee,
            therapist_amount: split.therapist_amount,
            organization_amount: split.organization_amount,
            state: EscrowState::Held,
            opened_at: now,
            hold_hours,
            release_eligible_at: None,
            disputed_at: None,
            resolved_at: None,
        }
    }

    pub fn countdown_started(&self) -> bool {
        self.release_eligible_at.is_some()
    }

    /// When the countdown would end if started at `completed_at`.
    pub fn eligible_from(&self, completed_at: DateTime<Utc>) -> DateTime<Utc> {
        completed_at + Duration::hours(self.hold_hours)
    }

    /// Whether the release sweep may promote this hold at `now`.
    pub fn is_release_eligible(&self, now: DateTime<Utc>) -> bool {
        self.state == EscrowState::Held
            && self
                .release_eligible_at
                .map(|at| now >= at)
                .unwrap_or(false)
    }

    pub fn held_total(&self) -> i64 {
        self.platform_fee + self.therapist_amount + self.organization_amount
    }
}
