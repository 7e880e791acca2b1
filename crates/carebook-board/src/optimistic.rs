//! Optimistic tracking updates with explicit rollback.
//!
//! A front-desk click applies locally first (the board feels instant), then
//! submits to the server. The command object keeps the last
//! server-confirmed row so a rejection rolls the board back exactly; a row
//! is never left in a client-only state.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use carebook_core::models::{Booking, TrackingStatus};
use carebook_core::{Platform, PlatformError};

use crate::{Board, BoardError, BoardResult, BoardRow};

/// A locally applied tracking update, holding the rollback state.
#[derive(Debug, Clone)]
pub struct OptimisticUpdate {
    pub booking_id: Uuid,
    pub applied: TrackingStatus,
    pub applied_at: DateTime<Utc>,
    /// The last server-confirmed row, restored on rejection
    previous: BoardRow,
}

impl Board {
    /// Apply a tracking status locally before server acknowledgment.
    pub fn apply_optimistic(
        &mut self,
        booking_id: Uuid,
        target: TrackingStatus,
        now: DateTime<Utc>,
    ) -> BoardResult<OptimisticUpdate> {
        let row = self
            .get_mut(booking_id)
            .ok_or(BoardError::UnknownBooking(booking_id))?;
        let previous = row.clone();

        row.tracking_status = target;
        match target {
            TrackingStatus::Waiting => row.checked_in_at = Some(now),
            TrackingStatus::InSession => row.session_started_at = Some(now),
            TrackingStatus::Completed => row.session_ended_at = Some(now),
            _ => {}
        }

        Ok(OptimisticUpdate {
            booking_id,
            applied: target,
            applied_at: now,
            previous,
        })
    }

    /// Replace the optimistic row with what the server actually confirmed.
    pub fn confirm(&mut self, update: OptimisticUpdate, server_row: BoardRow) {
        debug!(booking_id = %update.booking_id, applied = ?update.applied, "optimistic update confirmed");
        self.put(server_row);
    }

    /// Roll the row back to the last server-confirmed state.
    pub fn revert(&mut self, update: OptimisticUpdate) {
        warn!(
            booking_id = %update.booking_id,
            applied = ?update.applied,
            "optimistic update rejected, reverting"
        );
        self.put(update.previous);
    }
}

/// Server seam for submitting tracking transitions.
pub trait TrackingClient {
    fn advance(&self, booking_id: Uuid, target: TrackingStatus) -> Result<Booking, PlatformError>;
}

impl TrackingClient for Platform {
    fn advance(&self, booking_id: Uuid, target: TrackingStatus) -> Result<Booking, PlatformError> {
        match target {
            TrackingStatus::Waiting => self.check_in(booking_id),
            TrackingStatus::InSession => self.start_session(booking_id),
            TrackingStatus::Completed => self.complete_session(booking_id),
            TrackingStatus::NoShow => self.mark_no_show(booking_id),
            TrackingStatus::Cancelled => self.mark_session_cancelled(booking_id),
            TrackingStatus::Scheduled => Err(PlatformError::InvalidTransition(
                "cannot move a booking back to scheduled".into(),
            )),
        }
    }
}

/// Apply locally, submit, and confirm or revert.
///
/// On success the board shows the server-confirmed row; on rejection it is
/// back at the last confirmed state and the error says whether a retry makes
/// sense.
pub fn submit_tracking(
    board: &mut Board,
    client: &dyn TrackingClient,
    booking_id: Uuid,
    target: TrackingStatus,
    now: DateTime<Utc>,
) -> BoardResult<BoardRow> {
    let update = board.apply_optimistic(booking_id, target, now)?;
    match client.advance(booking_id, target) {
        Ok(booking) => {
            let row = BoardRow::from(&booking);
            board.confirm(update, row.clone());
            Ok(row)
        }
        Err(e) => {
            board.revert(update);
            Err(BoardError::Rejected(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::make_row;
    use std::sync::Mutex;

    /// Client scripted to accept or reject.
    struct ScriptedClient {
        responses: Mutex<Vec<Result<Booking, PlatformError>>>,
    }

    impl TrackingClient for ScriptedClient {
        fn advance(
            &self,
            _booking_id: Uuid,
            _target: TrackingStatus,
        ) -> Result<Booking, PlatformError> {
            self.responses
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(0)
        }
    }

    fn rejecting_client(error: PlatformError) -> ScriptedClient {
        ScriptedClient {
            responses: Mutex::new(vec![Err(error)]),
        }
    }

    #[test]
    fn test_optimistic_apply_then_revert_restores_confirmed_state() {
        let mut board = Board::new();
        let row = make_row("2026-03-02T09:00:00Z", TrackingStatus::Scheduled);
        let booking_id = row.booking_id;
        board.sync(vec![row.clone()]);

        let now: DateTime<Utc> = "2026-03-02T09:05:00Z".parse().unwrap();
        let client = rejecting_client(PlatformError::InvalidTransition("nope".into()));
        let result = submit_tracking(&mut board, &client, booking_id, TrackingStatus::Waiting, now);

        assert!(matches!(result, Err(BoardError::Rejected(_))));
        // Board is exactly back at the server-confirmed row
        assert_eq!(board.get(booking_id), Some(&row));
    }

    #[test]
    fn test_optimistic_apply_is_visible_before_submission() {
        let mut board = Board::new();
        let row = make_row("2026-03-02T09:00:00Z", TrackingStatus::Scheduled);
        let booking_id = row.booking_id;
        board.sync(vec![row]);

        let now: DateTime<Utc> = "2026-03-02T09:05:00Z".parse().unwrap();
        board
            .apply_optimistic(booking_id, TrackingStatus::Waiting, now)
            .unwrap();

        let shown = board.get(booking_id).unwrap();
        assert_eq!(shown.tracking_status, TrackingStatus::Waiting);
        assert_eq!(shown.checked_in_at, Some(now));
    }

    #[test]
    fn test_rejection_error_carries_retryability() {
        let mut board = Board::new();
        let row = make_row("2026-03-02T09:00:00Z", TrackingStatus::Scheduled);
        let booking_id = row.booking_id;
        board.sync(vec![row]);

        let now = Utc::now();
        let client = rejecting_client(PlatformError::Conflict("raced".into()));
        let error = submit_tracking(&mut board, &client, booking_id, TrackingStatus::Waiting, now)
            .unwrap_err();
        assert!(error.is_retryable());
    }

    #[test]
    fn test_unknown_booking() {
        let mut board = Board::new();
        let result = board.apply_optimistic(Uuid::new_v4(), TrackingStatus::Waiting, Utc::now());
        assert!(matches!(result, Err(BoardError::UnknownBooking(_))));
    }
}
