//! Booking models: the central entity plus its two state machines.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking lifecycle status.
///
/// `PendingPayment → PendingAcceptance → Confirmed → Completed`, with the
/// cancellation branches reachable from any non-terminal state. Cancellation
/// and completion states are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    /// Created, waiting for the payment collaborator to report capture
    PendingPayment,
    /// Paid, waiting for the therapist to accept
    PendingAcceptance,
    /// Accepted; split resolved and escrow hold open
    Confirmed,
    /// Session delivered and lifecycle closed
    Completed,
    /// Cancelled on the patient side
    CancelledByPatient,
    /// Cancelled on the therapist side (includes system auto-cancel)
    CancelledByTherapist,
}

impl BookingStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::CancelledByPatient
                | BookingStatus::CancelledByTherapist
        )
    }

    /// All legal next statuses from this one.
    pub fn valid_transitions(&self) -> Vec<BookingStatus> {
        match self {
            BookingStatus::PendingPayment => vec![
                BookingStatus::PendingAcceptance,
                BookingStatus::CancelledByPatient,
                BookingStatus::CancelledByTherapist,
            ],
            BookingStatus::PendingAcceptance => vec![
                BookingStatus::Confirmed,
                BookingStatus::CancelledByPatient,
                BookingStatus::CancelledByTherapist,
            ],
            BookingStatus::Confirmed => vec![
                BookingStatus::Completed,
                BookingStatus::CancelledByPatient,
                BookingStatus::CancelledByTherapist,
            ],
            // Terminal states
            BookingStatus::Completed
            | BookingStatus::CancelledByPatient
            | BookingStatus::CancelledByTherapist => vec![],
        }
    }

    pub fn can_transition_to(&self, next: &BookingStatus) -> bool {
        self.valid_transitions().contains(next)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            BookingStatus::CancelledByPatient | BookingStatus::CancelledByTherapist
        )
    }
}

/// Day-of-session tracking status, independent of the booking lifecycle.
///
/// Only meaningful while the booking is `Confirmed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrackingStatus {
    Scheduled,
    Waiting,
    InSession,
    Completed,
    NoShow,
    Cancelled,
}

impl TrackingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrackingStatus::Completed | TrackingStatus::NoShow | TrackingStatus::Cancelled
        )
    }

    pub fn valid_transitions(&self) -> Vec<TrackingStatus> {
        match self {
            TrackingStatus::Scheduled => vec![TrackingStatus::Waiting, TrackingStatus::NoShow],
            TrackingStatus::Waiting => vec![TrackingStatus::InSession, TrackingStatus::NoShow],
            TrackingStatus::InSession => {
                vec![TrackingStatus::Completed, TrackingStatus::Cancelled]
            }
            TrackingStatus::Completed | TrackingStatus::NoShow | TrackingStatus::Cancelled => {
                vec![]
            }
        }
    }

    pub fn can_transition_to(&self, next: &TrackingStatus) -> bool {
        self.valid_transitions().contains(next)
    }
}

/// The resolved division of a booking's subtotal.
///
/// Populated exactly once, when the booking enters `Confirmed`. Invariant:
/// `platform_fee + therapist_amount + organization_amount == subtotal`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevenueSplit {
    /// Commission percentage actually applied, snapshotted at confirmation
    pub commission_percentage: u32,
    /// Platform share, minor currency units
    pub platform_fee: i64,
    /// Therapist share, minor currency units
    pub therapist_amount: i64,
    /// Organization share, minor currency units (0 without an organization)
    pub organization_amount: i64,
}

impl RevenueSplit {
    /// Sum of all shares; must equal the booking subtotal.
    pub fn total(&self) -> i64 {
        self.platform_fee + self.therapist_amount + self.organization_amount
    }
}

/// Requested session slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSlot {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl SessionSlot {
    pub fn is_well_formed(&self) -> bool {
        self.end_at > self.start_at
    }
}

/// A booking record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    /// Present when the booking is routed through an organization
    pub organization_id: Option<Uuid>,
    pub session_type_id: Uuid,
    /// Price in minor currency units
    pub subtotal: i64,
    /// Resolved split; `None` until the booking is confirmed
    pub split: Option<RevenueSplit>,
    pub status: BookingStatus,
    pub tracking_status: TrackingStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub session_started_at: Option<DateTime<Utc>>,
    pub session_ended_at: Option<DateTime<Utc>>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Stamped when entering `PendingAcceptance`; drives the auto-cancel window
    pub acceptance_pending_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a new booking request in `PendingPayment`.
    pub fn new(
        patient_id: Uuid,
        therapist_id: Uuid,
        organization_id: Option<Uuid>,
        session_type_id: Uuid,
        subtotal: i64,
        slot: SessionSlot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            therapist_id,
            organization_id,
            session_type_id,
            subtotal,
            split: None,
            status: BookingStatus::PendingPayment,
            tracking_status: TrackingStatus::Scheduled,
            checked_in_at: None,
            session_started_at: None,
            session_ended_at: None,
            start_at: slot.start_at,
            end_at: slot.end_at,
            acceptance_pending_since: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Elapsed session time while `InSession`; computed, never stored.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.tracking_status != TrackingStatus::InSession {
            return None;
        }
        self.session_started_at.map(|started| now - started)
    }

    /// Final session duration once tracking is `Completed`.
    pub fn session_duration(&self) -> Option<Duration> {
        match (self.session_started_at, self.session_ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Whether the split invariant holds for this booking.
    pub fn split_is_balanced(&self) -> bool {
        match &self.split {
            Some(split) => split.total() == self.subtotal,
            None => true,
        }
    }
}
