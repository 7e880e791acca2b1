//! Day-of-session appointment tracker.
//!
//! A faster-moving state machine layered on a `Confirmed` booking, driven by
//! front-desk staff. It shares the booking row with the lifecycle manager but
//! only ever writes the tracking columns; the same conditional-update
//! discipline keeps concurrent front-desk clicks from double-applying.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::db::Database;
use crate::models::{Booking, BookingStatus, TrackingStatus};
use crate::{PlatformError, PlatformResult};

/// Appointment tracker.
pub struct AppointmentTracker<'a> {
    db: &'a Database,
}

impl<'a> AppointmentTracker<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// `Scheduled → Waiting`; stamps `checked_in_at`.
    pub fn check_in(&self, id: Uuid, now: DateTime<Utc>) -> PlatformResult<Booking> {
        self.transition(id, TrackingStatus::Waiting, now)
    }

    /// `Waiting → InSession`; stamps `session_started_at`.
    pub fn start_session(&self, id: Uuid, now: DateTime<Utc>) -> PlatformResult<Booking> {
        self.transition(id, TrackingStatus::InSession, now)
    }

    /// `InSession → Completed`; stamps `session_ended_at` and unblocks the
    /// lifecycle `complete` operation.
    pub fn complete_session(&self, id: Uuid, now: DateTime<Utc>) -> PlatformResult<Booking> {
        self.transition(id, TrackingStatus::Completed, now)
    }

    /// Terminal shortcut from `Scheduled` or `Waiting`.
    pub fn mark_no_show(&self, id: Uuid, now: DateTime<Utc>) -> PlatformResult<Booking> {
        self.transition(id, TrackingStatus::NoShow, now)
    }

    /// Terminal shortcut from `InSession` (session abandoned mid-way).
    pub fn mark_cancelled(&self, id: Uuid, now: DateTime<Utc>) -> PlatformResult<Booking> {
        self.transition(id, TrackingStatus::Cancelled, now)
    }

    fn transition(
        &self,
        id: Uuid,
        target: TrackingStatus,
        now: DateTime<Utc>,
    ) -> PlatformResult<Booking> {
        let booking = self
            .db
            .get_booking(id)?
            .ok_or_else(|| PlatformError::NotFound(format!("booking {}", id)))?;

        // Tracking progression is only meaningful on a confirmed booking
        if booking.status != BookingStatus::Confirmed {
            return Err(PlatformError::InvalidTransition(format!(
                "tracking requires a confirmed booking, lifecycle is {:?}",
                booking.status
            )));
        }

        let observed = booking.tracking_status;
        if observed == target {
            // Double click / double check-in: the state already advanced
            return Err(PlatformError::Conflict(format!(
                "booking {} tracking is already {:?}",
                id, target
            )));
        }
        if !observed.can_transition_to(&target) {
            return Err(PlatformError::InvalidTransition(format!(
                "tracking cannot move {:?} → {:?}",
                observed, target
            )));
        }

        if !self.db.update_tracking(id, &observed, &target, now)? {
            return Err(PlatformError::Conflict(format!(
                "booking {} tracking changed during update",
                id
            )));
        }

        info!(booking_id = %id, from = ?observed, to = ?target, "tracking advanced");
        self.db
            .get_booking(id)?
            .ok_or_else(|| PlatformError::NotFound(format!("booking {}", id)))
    }
}
