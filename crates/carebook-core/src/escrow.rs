//! Escrow ledger: hold state transitions and the release sweep.
//!
//! Holds open inside the booking-confirmation transaction (see
//! `Database::confirm_booking`); everything after that point goes through
//! this ledger.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::events::{DomainEvent, EventSink};
use crate::models::{DisputeOutcome, EscrowHold, EscrowState};
use crate::{PlatformError, PlatformResult};

/// Counts from one release sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseSweepOutcome {
    pub promoted: usize,
    pub skipped: usize,
}

/// Escrow ledger manager.
pub struct EscrowLedger<'a> {
    db: &'a Database,
    events: &'a dyn EventSink,
}

impl<'a> EscrowLedger<'a> {
    pub fn new(db: &'a Database, events: &'a dyn EventSink) -> Self {
        Self { db, events }
    }

    /// Get a hold, failing when the booking has none.
    pub fn get_hold(&self, booking_id: Uuid) -> PlatformResult<EscrowHold> {
        self.db
            .get_hold(booking_id)?
            .ok_or_else(|| PlatformError::NotFound(format!("escrow hold for booking {}", booking_id)))
    }

    /// Start the release countdown after session completion.
    ///
    /// Idempotent: sweeps and retried completions may call this more than
    /// once; only the first call stamps the eligibility instant. The hours
    /// value was snapshotted at hold-open time and is not re-read from
    /// settings.
    pub fn start_countdown(&self, booking_id: Uuid, now: DateTime<Utc>) -> PlatformResult<()> {
        let hold = self.get_hold(booking_id)?;
        if hold.countdown_started() {
            return Ok(());
        }
        let release_eligible_at = now + Duration::hours(hold.hold_hours);
        self.db.start_hold_countdown(booking_id, release_eligible_at)?;
        Ok(())
    }

    /// Promote every hold whose countdown has elapsed to `Releasable`.
    ///
    /// Disputed holds are excluded by the query; individual failures are
    /// logged and skipped so one bad hold cannot block the rest of the pass.
    pub fn sweep_release(&self, now: DateTime<Utc>) -> PlatformResult<ReleaseSweepOutcome> {
        let mut outcome = ReleaseSweepOutcome::default();
        for hold in self.db.list_release_eligible_holds(now)? {
            match self.db.update_hold_state(
                hold.booking_id,
                &EscrowState::Held,
                &EscrowState::Releasable,
                now,
            ) {
                Ok(true) => outcome.promoted += 1,
                // Lost a race with a dispute or another sweep pass
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    warn!(booking_id = %hold.booking_id, error = %e, "release sweep skipped hold");
                    outcome.skipped += 1;
                }
            }
        }
        if outcome.promoted > 0 {
            info!(promoted = outcome.promoted, "escrow release sweep promoted holds");
        }
        Ok(outcome)
    }

    /// Pay out a `Releasable` hold.
    pub fn release(&self, booking_id: Uuid, now: DateTime<Utc>) -> PlatformResult<EscrowHold> {
        let hold = self.get_hold(booking_id)?;
        if hold.state != EscrowState::Releasable {
            return Err(PlatformError::InvalidTransition(format!(
                "cannot release hold in state {:?}",
                hold.state
            )));
        }
        if !self
            .db
            .update_hold_state(booking_id, &EscrowState::Releasable, &EscrowState::Released, now)?
        {
            return Err(PlatformError::Conflict(format!(
                "hold for booking {} changed state during release",
                booking_id
            )));
        }

        info!(booking_id = %booking_id, "escrow hold released");
        self.events.publish(DomainEvent::EscrowReleased {
            booking_id,
            therapist_amount: hold.therapist_amount,
            organization_amount: hold.organization_amount,
            occurred_at: now,
        });
        self.get_hold(booking_id)
    }

    /// Freeze the countdown pending dispute resolution.
    ///
    /// Legal from `Held` or `Releasable`; resolution is the only way out.
    pub fn open_dispute(&self, booking_id: Uuid, now: DateTime<Utc>) -> PlatformResult<EscrowHold> {
        let hold = self.get_hold(booking_id)?;
        let observed = match hold.state {
            EscrowState::Held | EscrowState::Releasable => hold.state,
            other => {
                return Err(PlatformError::InvalidTransition(format!(
                    "cannot dispute hold in state {:?}",
                    other
                )))
            }
        };
        if !self
            .db
            .update_hold_state(booking_id, &observed, &EscrowState::Disputed, now)?
        {
            return Err(PlatformError::Conflict(format!(
                "hold for booking {} changed state during dispute open",
                booking_id
            )));
        }
        warn!(booking_id = %booking_id, "escrow hold disputed");
        self.get_hold(booking_id)
    }

    /// Resolve a dispute to `Refunded` or `Released`.
    pub fn resolve_dispute(
        &self,
        booking_id: Uuid,
        outcome: DisputeOutcome,
        now: DateTime<Utc>,
    ) -> PlatformResult<EscrowHold> {
        let hold = self.get_hold(booking_id)?;
        if hold.state != EscrowState::Disputed {
            return Err(PlatformError::InvalidTransition(format!(
                "cannot resolve hold in state {:?}",
                hold.state
            )));
        }

        let target = match outcome {
            DisputeOutcome::Refund => EscrowState::Refunded,
            DisputeOutcome::Release => EscrowState::Released,
        };
        if !self
            .db
            .update_hold_state(booking_id, &EscrowState::Disputed, &target, now)?
        {
            return Err(PlatformError::Conflict(format!(
                "hold for booking {} changed state during dispute resolution",
                booking_id
            )));
        }

        info!(booking_id = %booking_id, outcome = ?outcome, "escrow dispute resolved");
        if target == EscrowState::Released {
            self.events.publish(DomainEvent::EscrowReleased {
                booking_id,
                therapist_amount: hold.therapist_amount,
                organization_amount: hold.organization_amount,
                occurred_at: now,
            });
        }
        self.get_hold(booking_id)
    }

    /// Mark a hold refunded after a post-confirmation cancellation.
    ///
    /// A disputed hold stays disputed (resolution owns it); terminal holds
    /// are left alone.
    pub fn refund_for_cancellation(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> PlatformResult<()> {
        let hold = self.get_hold(booking_id)?;
        match hold.state {
            EscrowState::Held | EscrowState::Releasable => {
                self.db
                    .update_hold_state(booking_id, &hold.state, &EscrowState::Refunded, now)?;
                Ok(())
            }
            EscrowState::Disputed => Ok(()),
            EscrowState::Released | EscrowState::Refunded => Ok(()),
        }
    }
}
