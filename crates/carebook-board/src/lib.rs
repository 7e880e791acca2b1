//! CareBook front-desk board.
//!
//! Client-side state for the "today's board" view: one row per booking with
//! its day-of-session tracking progress. Updates are optimistic (applied
//! locally before server acknowledgment) with an explicit rollback path
//! invoked when the server rejects a transition, so a row is never left in a
//! client-only state. A cancellable polling loop keeps the board near
//! real-time.

pub mod board;
pub mod optimistic;
pub mod poller;

pub use board::*;
pub use optimistic::*;
pub use poller::*;

use thiserror::Error;
use uuid::Uuid;

/// Board errors.
#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Booking {0} is not on the board")]
    UnknownBooking(Uuid),

    #[error("Server rejected the update: {0}")]
    Rejected(#[from] carebook_core::PlatformError),
}

impl BoardError {
    /// Whether refetching and retrying may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            BoardError::UnknownBooking(_) => false,
            BoardError::Rejected(e) => e.is_retryable(),
        }
    }
}

pub type BoardResult<T> = Result<T, BoardError>;
