//! Auto-cancellation of stale unaccepted bookings.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::events::EventSink;
use crate::lifecycle::BookingLifecycle;
use crate::models::Actor;
use crate::payment::PaymentCollaborator;
use crate::{PlatformError, PlatformResult};

/// Bookings unaccepted for this long get cancelled by the system.
pub const AUTO_CANCEL_WINDOW_HOURS: i64 = 4;

/// Sweep cadence. The 4-hour window is overshot by at most one period.
pub const AUTO_CANCEL_PERIOD: std::time::Duration = std::time::Duration::from_secs(300);

/// Counts from one auto-cancel pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub cancelled: usize,
    /// Already transitioned by a racing accept or another pass
    pub skipped: usize,
    pub failed: usize,
}

/// Auto-cancel sweeper.
///
/// Each pass is idempotent and safe to run concurrently with itself and with
/// human accepts: the cancellation is a conditional update per booking, so a
/// booking accepted a second before the pass is skipped, never
/// double-cancelled. Individual failures are logged and skipped so one bad
/// booking cannot block expiry of the rest.
pub struct AutoCancelSweeper<'a> {
    db: &'a Database,
    events: &'a dyn EventSink,
    payments: &'a dyn PaymentCollaborator,
}

impl<'a> AutoCancelSweeper<'a> {
    pub fn new(
        db: &'a Database,
        events: &'a dyn EventSink,
        payments: &'a dyn PaymentCollaborator,
    ) -> Self {
        Self {
            db,
            events,
            payments,
        }
    }

    /// Run one pass at `now`.
    pub fn run_pass(&self, now: DateTime<Utc>) -> PlatformResult<SweepOutcome> {
        let cutoff = now - Duration::hours(AUTO_CANCEL_WINDOW_HOURS);
        let stale = self.db.list_stale_pending(cutoff)?;
        let lifecycle = BookingLifecycle::new(self.db, self.events, self.payments);

        let mut outcome = SweepOutcome::default();
        for booking in stale {
            match lifecycle.cancel(booking.id, &Actor::system(), now) {
                Ok(_) => outcome.cancelled += 1,
                Err(PlatformError::Conflict(_)) | Err(PlatformError::InvalidTransition(_)) => {
                    debug!(booking_id = %booking.id, "booking moved on before sweep, skipping");
                    outcome.skipped += 1;
                }
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "auto-cancel failed, skipping");
                    outcome.failed += 1;
                }
            }
        }

        if outcome.cancelled > 0 {
            info!(cancelled = outcome.cancelled, "auto-cancel sweep expired bookings");
        }
        Ok(outcome)
    }
}
