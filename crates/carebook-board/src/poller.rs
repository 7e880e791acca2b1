//! Near-real-time board refresh.
//!
//! A cancellable periodic task polls the consolidated schedule and replaces
//! the board baseline; stopping the poller joins the worker thread, so
//! teardown is deterministic.

use chrono::NaiveDate;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use carebook_core::models::Booking;
use carebook_core::sweep::Ticker;
use carebook_core::{Platform, PlatformError};

use crate::{Board, BoardRow};

/// Default refresh cadence for the live board.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(5);

/// Server seam the poller reads from.
pub trait ScheduleSource: Send + Sync {
    fn schedule_for_date(
        &self,
        date: NaiveDate,
        therapist_id: Option<Uuid>,
    ) -> Result<Vec<Booking>, PlatformError>;
}

impl ScheduleSource for Platform {
    fn schedule_for_date(
        &self,
        date: NaiveDate,
        therapist_id: Option<Uuid>,
    ) -> Result<Vec<Booking>, PlatformError> {
        Platform::schedule_for_date(self, date, therapist_id)
    }
}

/// Periodic board refresher.
pub struct BoardPoller {
    ticker: Ticker,
}

impl BoardPoller {
    /// Start polling `source` for `date`, replacing `board` on each pass.
    /// Poll failures are logged and the previous baseline kept.
    pub fn start(
        source: Arc<dyn ScheduleSource>,
        board: Arc<Mutex<Board>>,
        date: NaiveDate,
        therapist_id: Option<Uuid>,
        period: Duration,
    ) -> io::Result<Self> {
        let ticker = Ticker::spawn("board-poll", period, move || {
            match source.schedule_for_date(date, therapist_id) {
                Ok(bookings) => {
                    let rows: Vec<BoardRow> = bookings.iter().map(BoardRow::from).collect();
                    let mut board = board.lock().unwrap_or_else(|e| e.into_inner());
                    board.sync(rows);
                }
                Err(e) => warn!(error = %e, "board poll failed, keeping last snapshot"),
            }
        })?;
        Ok(Self { ticker })
    }

    /// Stop polling and wait for the worker to exit.
    pub fn stop(self) {
        self.ticker.stop();
    }
}
