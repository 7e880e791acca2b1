//! Board state: last server-confirmed row per booking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use carebook_core::models::{Booking, TrackingStatus};

/// One row on the front-desk board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardRow {
    pub booking_id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub tracking_status: TrackingStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub session_started_at: Option<DateTime<Utc>>,
    pub session_ended_at: Option<DateTime<Utc>>,
}

impl From<&Booking> for BoardRow {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            patient_id: booking.patient_id,
            therapist_id: booking.therapist_id,
            start_at: booking.start_at,
            end_at: booking.end_at,
            tracking_status: booking.tracking_status,
            checked_in_at: booking.checked_in_at,
            session_started_at: booking.session_started_at,
            session_ended_at: booking.session_ended_at,
        }
    }
}

impl BoardRow {
    /// Minutes in session so far; display-only, never stored.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.tracking_status != TrackingStatus::InSession {
            return None;
        }
        self.session_started_at
            .map(|started| (now - started).num_minutes())
    }

    /// Final session length once the session completed.
    pub fn duration_minutes(&self) -> Option<i64> {
        match (self.session_started_at, self.session_ended_at) {
            (Some(started), Some(ended)) => Some((ended - started).num_minutes()),
            _ => None,
        }
    }
}

/// The front-desk board for one day.
///
/// Holds the last server-confirmed row per booking; optimistic updates layer
/// on top of this baseline (see [`crate::optimistic`]).
#[derive(Debug, Default)]
pub struct Board {
    rows: HashMap<Uuid, BoardRow>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the board with a fresh server snapshot.
    pub fn sync(&mut self, server_rows: Vec<BoardRow>) {
        self.rows = server_rows
            .into_iter()
            .map(|row| (row.booking_id, row))
            .collect();
    }

    pub fn get(&self, booking_id: Uuid) -> Option<&BoardRow> {
        self.rows.get(&booking_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in display order: start time, then id for stability.
    pub fn rows(&self) -> Vec<&BoardRow> {
        let mut rows: Vec<&BoardRow> = self.rows.values().collect();
        rows.sort_by(|a, b| {
            a.start_at
                .cmp(&b.start_at)
                .then_with(|| a.booking_id.cmp(&b.booking_id))
        });
        rows
    }

    pub(crate) fn get_mut(&mut self, booking_id: Uuid) -> Option<&mut BoardRow> {
        self.rows.get_mut(&booking_id)
    }

    pub(crate) fn put(&mut self, row: BoardRow) {
        self.rows.insert(row.booking_id, row);
    }
}

/// Test helper shared by the board and optimistic-update tests.
#[cfg(test)]
pub(crate) fn make_row(start: &str, status: TrackingStatus) -> BoardRow {
    let start_at: DateTime<Utc> = start.parse().unwrap();
    BoardRow {
        booking_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        therapist_id: Uuid::new_v4(),
        start_at,
        end_at: start_at + chrono::Duration::hours(1),
        tracking_status: status,
        checked_in_at: None,
        session_started_at: None,
        session_ended_at: None,
    }
}
