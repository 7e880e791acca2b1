//! Booking database operations.
//!
//! All state transitions go through conditional updates keyed on the current
//! status (compare-and-swap): zero rows affected means the caller lost a race
//! or attempted an illegal jump, and must refetch to decide which.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{parse_id, parse_id_opt, parse_ts, parse_ts_opt, ts, Database, DbError, DbResult};
use crate::models::{Booking, BookingStatus, EscrowHold, RevenueSplit, TrackingStatus};

/// Column list shared by every booking SELECT.
const BOOKING_COLUMNS: &str = "id, patient_id, therapist_id, organization_id, session_type_id, \
     subtotal, commission_percentage, platform_fee, therapist_amount, organization_amount, \
     status, tracking_status, checked_in_at, session_started_at, session_ended_at, \
     start_at, end_at, acceptance_pending_since, created_at, updated_at";

/// Outcome of the transactional completion write.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionWrite {
    /// Booking completed; countdown now ends at the given instant
    Done { release_eligible_at: DateTime<Utc> },
    /// Lifecycle status was not `Confirmed`
    WrongStatus(BookingStatus),
    /// Tracking had not reached `Completed`
    TrackingNotFinished(TrackingStatus),
    NotFound,
}

impl Database {
    /// Insert a new booking.
    pub fn insert_booking(&self, booking: &Booking) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO bookings (
                id, patient_id, therapist_id, organization_id, session_type_id,
                subtotal, status, tracking_status, start_at, end_at,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                booking.id.to_string(),
                booking.patient_id.to_string(),
                booking.therapist_id.to_string(),
                booking.organization_id.map(|id| id.to_string()),
                booking.session_type_id.to_string(),
                booking.subtotal,
                status_to_string(&booking.status),
                tracking_to_string(&booking.tracking_status),
                ts(booking.start_at),
                ts(booking.end_at),
                ts(booking.created_at),
                ts(booking.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Get a booking by id.
    pub fn get_booking(&self, id: Uuid) -> DbResult<Option<Booking>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS),
                [id.to_string()],
                booking_row,
            )
            .optional()?
            .map(Booking::try_from)
            .transpose()
    }

    /// `PendingPayment → PendingAcceptance`, stamping the acceptance window.
    ///
    /// Returns false when the booking was not in `PendingPayment`.
    pub fn mark_payment_confirmed(&self, id: Uuid, now: DateTime<Utc>) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE bookings SET
                status = 'pending_acceptance',
                acceptance_pending_since = ?2,
                updated_at = ?2
            WHERE id = ?1 AND status = 'pending_payment'
            "#,
            params![id.to_string(), ts(now)],
        )?;
        Ok(rows_affected > 0)
    }

    /// `PendingAcceptance → Confirmed` with the split persisted and the
    /// escrow hold opened, all in one transaction.
    ///
    /// Returns false (and writes nothing) when the conditional update loses:
    /// a crash or a racing caller can never leave a confirmed booking without
    /// a split, or a split/hold without the confirmation.
    pub fn confirm_booking(
        &self,
        id: Uuid,
        split: &RevenueSplit,
        hold: &EscrowHold,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let rows_affected = tx.execute(
            r#"
            UPDATE bookings SET
                status = 'confirmed',
                commission_percentage = ?2,
                platform_fee = ?3,
                therapist_amount = ?4,
                organization_amount = ?5,
                updated_at = ?6
            WHERE id = ?1 AND status = 'pending_acceptance'
            "#,
            params![
                id.to_string(),
                split.commission_percentage,
                split.platform_fee,
                split.therapist_amount,
                split.organization_amount,
                ts(now),
            ],
        )?;

        if rows_affected == 0 {
            // Lost the race; nothing was written
            return Ok(false);
        }

        super::insert_hold(&tx, hold)?;
        tx.commit()?;
        Ok(true)
    }

    /// Conditional cancellation keyed on the status the caller observed.
    pub fn cancel_booking(
        &self,
        id: Uuid,
        observed: &BookingStatus,
        target: &BookingStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE bookings SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
            params![
                id.to_string(),
                status_to_string(observed),
                status_to_string(target),
                ts(now),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// `Confirmed → Completed`, gated on tracking having finished, with the
    /// escrow countdown started in the same transaction.
    ///
    /// The tracking check happens inside the transaction so `status` and
    /// `tracking_status` can never interleave into an invalid combination.
    pub fn complete_booking(&self, id: Uuid, now: DateTime<Utc>) -> DbResult<CompletionWrite> {
        let tx = self.conn.unchecked_transaction()?;

        let current: Option<(String, String)> = tx
            .query_row(
                "SELECT status, tracking_status FROM bookings WHERE id = ?",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (status_str, tracking_str) = match current {
            Some(pair) => pair,
            None => return Ok(CompletionWrite::NotFound),
        };
        let status = string_to_status(&status_str)?;
        let tracking = string_to_tracking(&tracking_str)?;

        if status != BookingStatus::Confirmed {
            return Ok(CompletionWrite::WrongStatus(status));
        }
        if tracking != TrackingStatus::Completed {
            return Ok(CompletionWrite::TrackingNotFinished(tracking));
        }

        let rows_affected = tx.execute(
            r#"
            UPDATE bookings SET status = 'completed', updated_at = ?2
            WHERE id = ?1 AND status = 'confirmed' AND tracking_status = 'completed'
            "#,
            params![id.to_string(), ts(now)],
        )?;
        if rows_affected == 0 {
            // Raced between the read and the write; report the fresh status
            let status: String = tx.query_row(
                "SELECT status FROM bookings WHERE id = ?",
                [id.to_string()],
                |row| row.get(0),
            )?;
            return Ok(CompletionWrite::WrongStatus(string_to_status(&status)?));
        }

        // Start the countdown with the hours snapshotted at hold-open time.
        // Idempotent: a hold whose countdown already started is untouched.
        let hold_hours: i64 = tx.query_row(
            "SELECT hold_hours FROM escrow_holds WHERE booking_id = ?",
            [id.to_string()],
            |row| row.get(0),
        )?;
        let release_eligible_at = now + Duration::hours(hold_hours);
        tx.execute(
            r#"
            UPDATE escrow_holds SET release_eligible_at = ?2
            WHERE booking_id = ?1 AND release_eligible_at IS NULL AND state = 'held'
            "#,
            params![id.to_string(), ts(release_eligible_at)],
        )?;

        tx.commit()?;
        Ok(CompletionWrite::Done {
            release_eligible_at,
        })
    }

    /// Conditional tracking transition; only legal while the booking is
    /// `Confirmed`. Stamps the timestamp column matching the target state.
    pub fn update_tracking(
        &self,
        id: Uuid,
        observed: &TrackingStatus,
        target: &TrackingStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let stamp_column = match target {
            TrackingStatus::Waiting => "checked_in_at = ?4,",
            TrackingStatus::InSession => "session_started_at = ?4,",
            TrackingStatus::Completed => "session_ended_at = ?4,",
            _ => "",
        };
        let sql = format!(
            r#"
            UPDATE bookings SET tracking_status = ?3, {} updated_at = ?4
            WHERE id = ?1 AND tracking_status = ?2 AND status = 'confirmed'
            "#,
            stamp_column
        );
        let rows_affected = self.conn.execute(
            &sql,
            params![
                id.to_string(),
                tracking_to_string(observed),
                tracking_to_string(target),
                ts(now),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Administrative split override. Only touches bookings whose split was
    /// already resolved; callers log the override.
    pub fn override_split(&self, id: Uuid, split: &RevenueSplit, now: DateTime<Utc>) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE bookings SET
                commission_percentage = ?2,
                platform_fee = ?3,
                therapist_amount = ?4,
                organization_amount = ?5,
                updated_at = ?6
            WHERE id = ?1 AND commission_percentage IS NOT NULL
            "#,
            params![
                id.to_string(),
                split.commission_percentage,
                split.platform_fee,
                split.therapist_amount,
                split.organization_amount,
                ts(now),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Count bookings overlapping the given slot for a therapist, in any
    /// state that still holds the slot.
    pub fn count_overlapping(
        &self,
        therapist_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE therapist_id = ?1
              AND status IN ('pending_payment', 'pending_acceptance', 'confirmed')
              AND start_at < ?3 AND end_at > ?2
            "#,
            params![therapist_id.to_string(), ts(start_at), ts(end_at)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Bookings stuck in `PendingAcceptance` since before the cutoff.
    pub fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE status = 'pending_acceptance' AND acceptance_pending_since <= ?
            ORDER BY acceptance_pending_since ASC
            "#,
            BOOKING_COLUMNS
        ))?;
        let rows = stmt.query_map([ts(cutoff)], booking_row)?;
        collect_bookings(rows)
    }

    /// Consolidated schedule: bookings starting inside the window, optionally
    /// for one therapist, ordered by start time.
    pub fn schedule_for_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        therapist_id: Option<Uuid>,
    ) -> DbResult<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE start_at >= ?1 AND start_at < ?2
              AND (?3 IS NULL OR therapist_id = ?3)
            ORDER BY start_at ASC
            "#,
            BOOKING_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![ts(from), ts(to), therapist_id.map(|id| id.to_string())],
            booking_row,
        )?;
        collect_bookings(rows)
    }

    /// Finalized (completed or cancelled) bookings starting inside the
    /// window, with the enumerated analytics filters applied.
    pub fn list_finalized_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        therapist_id: Option<Uuid>,
        organization_id: Option<Uuid>,
        session_type_id: Option<Uuid>,
    ) -> DbResult<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE start_at >= ?1 AND start_at < ?2
              AND status IN ('completed', 'cancelled_by_patient', 'cancelled_by_therapist')
              AND (?3 IS NULL OR therapist_id = ?3)
              AND (?4 IS NULL OR organization_id = ?4)
              AND (?5 IS NULL OR session_type_id = ?5)
            ORDER BY start_at ASC
            "#,
            BOOKING_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![
                ts(from),
                ts(to),
                therapist_id.map(|id| id.to_string()),
                organization_id.map(|id| id.to_string()),
                session_type_id.map(|id| id.to_string()),
            ],
            booking_row,
        )?;
        collect_bookings(rows)
    }
}

/// Intermediate row struct for database mapping.
struct BookingRow {
    id: String,
    patient_id: String,
    therapist_id: String,
    organization_id: Option<String>,
    session_type_id: String,
    subtotal: i64,
    commission_percentage: Option<u32>,
    platform_fee: Option<i64>,
    therapist_amount: Option<i64>,
    organization_amount: Option<i64>,
    status: String,
    tracking_status: String,
    checked_in_at: Option<String>,
    session_started_at: Option<String>,
    session_ended_at: Option<String>,
    start_at: String,
    end_at: String,
    acceptance_pending_since: Option<String>,
    created_at: String,
    updated_at: String,
}

fn booking_row(row: &Row<'_>) -> rusqlite::Result<BookingRow> {
    Ok(BookingRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        therapist_id: row.get(2)?,
        organization_id: row.get(3)?,
        session_type_id: row.get(4)?,
        subtotal: row.get(5)?,
        commission_percentage: row.get(6)?,
        platform_fee: row.get(7)?,
        therapist_amount: row.get(8)?,
        organization_amount: row.get(9)?,
        status: row.get(10)?,
        tracking_status: row.get(11)?,
        checked_in_at: row.get(12)?,
        session_started_at: row.get(13)?,
        session_ended_at: row.get(14)?,
        start_at: row.get(15)?,
        end_at: row.get(16)?,
        acceptance_pending_since: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

fn collect_bookings(
    rows: impl Iterator<Item = rusqlite::Result<BookingRow>>,
) -> DbResult<Vec<Booking>> {
    let mut bookings = Vec::new();
    for row in rows {
        bookings.push(row?.try_into()?);
    }
    Ok(bookings)
}

impl TryFrom<BookingRow> for Booking {
    type Error = DbError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let split = match (
            row.commission_percentage,
            row.platform_fee,
            row.therapist_amount,
            row.organization_amount,
        ) {
            (Some(commission_percentage), Some(platform_fee), Some(therapist_amount), Some(organization_amount)) => {
                Some(RevenueSplit {
                    commission_percentage,
                    platform_fee,
                    therapist_amount,
                    organization_amount,
                })
            }
            (None, None, None, None) => None,
            _ => {
                return Err(DbError::Constraint(format!(
                    "Partially populated split for booking {}",
                    row.id
                )))
            }
        };

        Ok(Booking {
            id: parse_id(&row.id)?,
            patient_id: parse_id(&row.patient_id)?,
            therapist_id: parse_id(&row.therapist_id)?,
            organization_id: parse_id_opt(row.organization_id)?,
            session_type_id: parse_id(&row.session_type_id)?,
            subtotal: row.subtotal,
            split,
            status: string_to_status(&row.status)?,
            tracking_status: string_to_tracking(&row.tracking_status)?,
            checked_in_at: parse_ts_opt(row.checked_in_at)?,
            session_started_at: parse_ts_opt(row.session_started_at)?,
            session_ended_at: parse_ts_opt(row.session_ended_at)?,
            start_at: parse_ts(&row.start_at)?,
            end_at: parse_ts(&row.end_at)?,
            acceptance_pending_since: parse_ts_opt(row.acceptance_pending_since)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

pub(crate) fn status_to_string(status: &BookingStatus) -> &'static str {
    match status {
        BookingStatus::PendingPayment => "pending_payment",
        BookingStatus::PendingAcceptance => "pending_acceptance",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Completed => "completed",
        BookingStatus::CancelledByPatient => "cancelled_by_patient",
        BookingStatus::CancelledByTherapist => "cancelled_by_therapist",
    }
}

pub(crate) fn string_to_status(s: &str) -> Result<BookingStatus, DbError> {
    match s {
        "pending_payment" => Ok(BookingStatus::PendingPayment),
        "pending_acceptance" => Ok(BookingStatus::PendingAcceptance),
        "confirmed" => Ok(BookingStatus::Confirmed),
        "completed" => Ok(BookingStatus::Completed),
        "cancelled_by_patient" => Ok(BookingStatus::CancelledByPatient),
        "cancelled_by_therapist" => Ok(BookingStatus::CancelledByTherapist),
        _ => Err(DbError::Constraint(format!("Unknown booking status: {}", s))),
    }
}

pub(crate) fn tracking_to_string(status: &TrackingStatus) -> &'static str {
    match status {
        TrackingStatus::Scheduled => "scheduled",
        TrackingStatus::Waiting => "waiting",
        TrackingStatus::InSession => "in_session",
        TrackingStatus::Completed => "completed",
        TrackingStatus::NoShow => "no_show",
        TrackingStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn string_to_tracking(s: &str) -> Result<TrackingStatus, DbError> {
    match s {
        "scheduled" => Ok(TrackingStatus::Scheduled),
        "waiting" => Ok(TrackingStatus::Waiting),
        "in_session" => Ok(TrackingStatus::InSession),
        "completed" => Ok(TrackingStatus::Completed),
        "no_show" => Ok(TrackingStatus::NoShow),
        "cancelled" => Ok(TrackingStatus::Cancelled),
        _ => Err(DbError::Constraint(format!("Unknown tracking status: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionSlot, Therapist};

    fn setup_db() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let therapist = Therapist::new("Dr. Reyes".into(), Utc::now());
        db.insert_therapist(&therapist).unwrap();
        (db, therapist.id)
    }

    fn make_booking(therapist_id: Uuid, start: &str, end: &str) -> Booking {
        Booking::new(
            Uuid::new_v4(),
            therapist_id,
            None,
            Uuid::new_v4(),
            10_000,
            SessionSlot {
                start_at: start.parse().unwrap(),
                end_at: end.parse().unwrap(),
            },
            Utc::now(),
        )
    }

    fn make_split() -> RevenueSplit {
        RevenueSplit {
            commission_percentage: 15,
            platform_fee: 1_500,
            therapist_amount: 8_500,
            organization_amount: 0,
        }
    }

    #[test]
    fn test_insert_and_get_booking() {
        let (db, therapist_id) = setup_db();
        let booking = make_booking(therapist_id, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        db.insert_booking(&booking).unwrap();

        let retrieved = db.get_booking(booking.id).unwrap().unwrap();
        assert_eq!(retrieved.status, BookingStatus::PendingPayment);
        assert_eq!(retrieved.subtotal, 10_000);
        assert!(retrieved.split.is_none());
        assert_eq!(retrieved.start_at, booking.start_at);
    }

    #[test]
    fn test_mark_payment_confirmed_is_conditional() {
        let (db, therapist_id) = setup_db();
        let booking = make_booking(therapist_id, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        db.insert_booking(&booking).unwrap();
        let now = Utc::now();

        assert!(db.mark_payment_confirmed(booking.id, now).unwrap());
        // Second attempt loses the conditional update
        assert!(!db.mark_payment_confirmed(booking.id, now).unwrap());

        let retrieved = db.get_booking(booking.id).unwrap().unwrap();
        assert_eq!(retrieved.status, BookingStatus::PendingAcceptance);
        assert!(retrieved.acceptance_pending_since.is_some());
    }

    #[test]
    fn test_confirm_booking_writes_split_and_hold_atomically() {
        let (db, therapist_id) = setup_db();
        let booking = make_booking(therapist_id, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        db.insert_booking(&booking).unwrap();
        let now = Utc::now();
        db.mark_payment_confirmed(booking.id, now).unwrap();

        let split = make_split();
        let hold = EscrowHold::open(booking.id, &split, 72, now);
        assert!(db.confirm_booking(booking.id, &split, &hold, now).unwrap());

        let retrieved = db.get_booking(booking.id).unwrap().unwrap();
        assert_eq!(retrieved.status, BookingStatus::Confirmed);
        assert_eq!(retrieved.split, Some(split));
        assert!(db.get_hold(booking.id).unwrap().is_some());

        // Losing confirm writes neither split nor a second hold
        assert!(!db.confirm_booking(booking.id, &split, &hold, now).unwrap());
    }

    #[test]
    fn test_complete_requires_tracking_finished() {
        let (db, therapist_id) = setup_db();
        let booking = make_booking(therapist_id, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        db.insert_booking(&booking).unwrap();
        let now = Utc::now();
        db.mark_payment_confirmed(booking.id, now).unwrap();
        let split = make_split();
        let hold = EscrowHold::open(booking.id, &split, 72, now);
        db.confirm_booking(booking.id, &split, &hold, now).unwrap();

        match db.complete_booking(booking.id, now).unwrap() {
            CompletionWrite::TrackingNotFinished(TrackingStatus::Scheduled) => {}
            other => panic!("expected tracking gate, got {:?}", other),
        }

        db.update_tracking(booking.id, &TrackingStatus::Scheduled, &TrackingStatus::Waiting, now)
            .unwrap();
        db.update_tracking(booking.id, &TrackingStatus::Waiting, &TrackingStatus::InSession, now)
            .unwrap();
        db.update_tracking(booking.id, &TrackingStatus::InSession, &TrackingStatus::Completed, now)
            .unwrap();

        match db.complete_booking(booking.id, now).unwrap() {
            CompletionWrite::Done { release_eligible_at } => {
                assert_eq!(release_eligible_at, now + Duration::hours(72));
            }
            other => panic!("expected completion, got {:?}", other),
        }

        let hold = db.get_hold(booking.id).unwrap().unwrap();
        assert_eq!(hold.release_eligible_at, Some(now + Duration::hours(72)));
    }

    #[test]
    fn test_tracking_update_requires_confirmed_lifecycle() {
        let (db, therapist_id) = setup_db();
        let booking = make_booking(therapist_id, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        db.insert_booking(&booking).unwrap();

        // Still pending payment: check-in must not go through
        let moved = db
            .update_tracking(
                booking.id,
                &TrackingStatus::Scheduled,
                &TrackingStatus::Waiting,
                Utc::now(),
            )
            .unwrap();
        assert!(!moved);
    }

    #[test]
    fn test_count_overlapping() {
        let (db, therapist_id) = setup_db();
        let booking = make_booking(therapist_id, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        db.insert_booking(&booking).unwrap();

        let overlap = db
            .count_overlapping(
                therapist_id,
                "2026-03-02T09:30:00Z".parse().unwrap(),
                "2026-03-02T10:30:00Z".parse().unwrap(),
            )
            .unwrap();
        assert_eq!(overlap, 1);

        let clear = db
            .count_overlapping(
                therapist_id,
                "2026-03-02T10:00:00Z".parse().unwrap(),
                "2026-03-02T11:00:00Z".parse().unwrap(),
            )
            .unwrap();
        assert_eq!(clear, 0);
    }

    #[test]
    fn test_list_stale_pending_respects_cutoff() {
        let (db, therapist_id) = setup_db();
        let stale = make_booking(therapist_id, "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        let fresh = make_booking(therapist_id, "2026-03-03T09:00:00Z", "2026-03-03T10:00:00Z");
        db.insert_booking(&stale).unwrap();
        db.insert_booking(&fresh).unwrap();

        let early: DateTime<Utc> = "2026-03-01T00:00:00Z".parse().unwrap();
        let late: DateTime<Utc> = "2026-03-01T05:00:00Z".parse().unwrap();
        db.mark_payment_confirmed(stale.id, early).unwrap();
        db.mark_payment_confirmed(fresh.id, late).unwrap();

        let cutoff: DateTime<Utc> = "2026-03-01T04:00:00Z".parse().unwrap();
        let found = db.list_stale_pending(cutoff).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stale.id);
    }
}
