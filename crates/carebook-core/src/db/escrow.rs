//! Escrow hold database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{parse_id, parse_ts, parse_ts_opt, ts, Database, DbError, DbResult};
use crate::models::{EscrowHold, EscrowState};

const HOLD_COLUMNS: &str = "booking_id, platform_fee, therapist_amount, organization_amount, \
     state, opened_at, hold_hours, release_eligible_at, disputed_at, resolved_at";

/// Insert a hold inside an already-open transaction (hold-open shares the
/// booking confirmation transaction).
pub(crate) fn insert_hold(conn: &Connection, hold: &EscrowHold) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO escrow_holds (
            booking_id, platform_fee, therapist_amount, organization_amount,
            state, opened_at, hold_hours, release_eligible_at, disputed_at, resolved_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            hold.booking_id.to_string(),
            hold.platform_fee,
            hold.therapist_amount,
            hold.organization_amount,
            state_to_string(&hold.state),
            ts(hold.opened_at),
            hold.hold_hours,
            hold.release_eligible_at.map(ts),
            hold.disputed_at.map(ts),
            hold.resolved_at.map(ts),
        ],
    )?;
    Ok(())
}

impl Database {
    /// Get the hold for a booking.
    pub fn get_hold(&self, booking_id: Uuid) -> DbResult<Option<EscrowHold>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM escrow_holds WHERE booking_id = ?", HOLD_COLUMNS),
                [booking_id.to_string()],
                hold_row,
            )
            .optional()?
            .map(EscrowHold::try_from)
            .transpose()
    }

    /// Conditional hold state transition.
    pub fn update_hold_state(
        &self,
        booking_id: Uuid,
        observed: &EscrowState,
        target: &EscrowState,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let stamp_column = match target {
            EscrowState::Disputed => Some("disputed_at"),
            EscrowState::Released | EscrowState::Refunded => Some("resolved_at"),
            _ => None,
        };
        let rows_affected = match stamp_column {
            Some(column) => self.conn.execute(
                &format!(
                    "UPDATE escrow_holds SET state = ?3, {} = ?4 \
                     WHERE booking_id = ?1 AND state = ?2",
                    column
                ),
                params![
                    booking_id.to_string(),
                    state_to_string(observed),
                    state_to_string(target),
                    ts(now),
                ],
            )?,
            None => self.conn.execute(
                "UPDATE escrow_holds SET state = ?3 WHERE booking_id = ?1 AND state = ?2",
                params![
                    booking_id.to_string(),
                    state_to_string(observed),
                    state_to_string(target),
                ],
            )?,
        };
        Ok(rows_affected > 0)
    }

    /// Start the release countdown. Idempotent: a hold whose countdown
    /// already started is untouched and still reports success.
    pub fn start_hold_countdown(
        &self,
        booking_id: Uuid,
        release_eligible_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM escrow_holds WHERE booking_id = ?",
                [booking_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(false);
        }
        self.conn.execute(
            r#"
            UPDATE escrow_holds SET release_eligible_at = ?2
            WHERE booking_id = ?1 AND release_eligible_at IS NULL AND state = 'held'
            "#,
            params![booking_id.to_string(), ts(release_eligible_at)],
        )?;
        Ok(true)
    }

    /// Holds the release sweep should promote at `now`: countdown elapsed and
    /// not disputed.
    pub fn list_release_eligible_holds(&self, now: DateTime<Utc>) -> DbResult<Vec<EscrowHold>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM escrow_holds
            WHERE state = 'held'
              AND release_eligible_at IS NOT NULL
              AND release_eligible_at <= ?
            ORDER BY release_eligible_at ASC
            "#,
            HOLD_COLUMNS
        ))?;
        let rows = stmt.query_map([ts(now)], hold_row)?;

        let mut holds = Vec::new();
        for row in rows {
            holds.push(row?.try_into()?);
        }
        Ok(holds)
    }
}

/// Intermediate row struct for database mapping.
struct HoldRow {
    booking_id: String,
    platform_fee: i64,
    therapist_amount: i64,
    organization_amount: i64,
    state: String,
    opened_at: String,
    hold_hours: i64,
    release_eligible_at: Option<String>,
    disputed_at: Option<String>,
    resolved_at: Option<String>,
}

fn hold_row(row: &Row<'_>) -> rusqlite::Result<HoldRow> {
    Ok(HoldRow {
        booking_id: row.get(0)?,
        platform_fee: row.get(1)?,
        therapist_amount: row.get(2)?,
        organization_amount: row.get(3)?,
        state: row.get(4)?,
        opened_at: row.get(5)?,
        hold_hours: row.get(6)?,
        release_eligible_at: row.get(7)?,
        disputed_at: row.get(8)?,
        resolved_at: row.get(9)?,
    })
}

impl TryFrom<HoldRow> for EscrowHold {
    type Error = DbError;

    fn try_from(row: HoldRow) -> Result<Self, Self::Error> {
        Ok(EscrowHold {
            booking_id: parse_id(&row.booking_id)?,
            platform_fee: row.platform_fee,
            therapist_amount: row.therapist_amount,
            organization_amount: row.organization_amount,
            state: string_to_state(&row.state)?,
            opened_at: parse_ts(&row.opened_at)?,
            hold_hours: row.hold_hours,
            release_eligible_at: parse_ts_opt(row.release_eligible_at)?,
            disputed_at: parse_ts_opt(row.disputed_at)?,
            resolved_at: parse_ts_opt(row.resolved_at)?,
        })
    }
}

pub(crate) fn state_to_string(state: &EscrowState) -> &'static str {
    match state {
        EscrowState::Held => "held",
        EscrowState::Releasable => "releasable",
        EscrowState::Released => "released",
        EscrowState::Refunded => "refunded",
        EscrowState::Disputed => "disputed",
    }
}

pub(crate) fn string_to_state(s: &str) -> Result<EscrowState, DbError> {
    match s {
        "held" => Ok(EscrowState::Held),
        "releasable" => Ok(EscrowState::Releasable),
        "released" => Ok(EscrowState::Released),
        "refunded" => Ok(EscrowState::Refunded),
        "disputed" => Ok(EscrowState::Disputed),
        _ => Err(DbError::Constraint(format!("Unknown escrow state: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Booking, RevenueSplit, SessionSlot, Therapist};

    fn setup_hold(hold_hours: i64) -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let therapist = Therapist::new("Dr. Okafor".into(), now);
        db.insert_therapist(&therapist).unwrap();

        let booking = Booking::new(
            Uuid::new_v4(),
            therapist.id,
            None,
            Uuid::new_v4(),
            10_000,
            SessionSlot {
                start_at: "2026-03-02T09:00:00Z".parse().unwrap(),
                end_at: "2026-03-02T10:00:00Z".parse().unwrap(),
            },
            now,
        );
        db.insert_booking(&booking).unwrap();

        let split = RevenueSplit {
            commission_percentage: 15,
            platform_fee: 1_500,
            therapist_amount: 8_500,
            organization_amount: 0,
        };
        let hold = EscrowHold::open(booking.id, &split, hold_hours, now);
        insert_hold(db.conn(), &hold).unwrap();
        (db, booking.id)
    }

    #[test]
    fn test_insert_and_get_hold() {
        let (db, booking_id) = setup_hold(72);
        let hold = db.get_hold(booking_id).unwrap().unwrap();
        assert_eq!(hold.state, EscrowState::Held);
        assert_eq!(hold.hold_hours, 72);
        assert_eq!(hold.held_total(), 10_000);
        assert!(hold.release_eligible_at.is_none());
    }

    #[test]
    fn test_countdown_start_is_idempotent() {
        let (db, booking_id) = setup_hold(72);
        let first: DateTime<Utc> = "2026-03-05T10:00:00Z".parse().unwrap();
        let second: DateTime<Utc> = "2026-03-09T10:00:00Z".parse().unwrap();

        assert!(db.start_hold_countdown(booking_id, first).unwrap());
        assert!(db.start_hold_countdown(booking_id, second).unwrap());

        // First stamp wins; re-invocation is a no-op
        let hold = db.get_hold(booking_id).unwrap().unwrap();
        assert_eq!(hold.release_eligible_at, Some(first));
    }

    #[test]
    fn test_countdown_on_missing_hold() {
        let (db, _) = setup_hold(72);
        let missing = db
            .start_hold_countdown(Uuid::new_v4(), Utc::now())
            .unwrap();
        assert!(!missing);
    }

    #[test]
    fn test_release_eligible_listing_excludes_disputed() {
        let (db, booking_id) = setup_hold(0);
        let eligible_at: DateTime<Utc> = "2026-03-02T12:00:00Z".parse().unwrap();
        db.start_hold_countdown(booking_id, eligible_at).unwrap();

        let before = db
            .list_release_eligible_holds("2026-03-02T11:59:59Z".parse().unwrap())
            .unwrap();
        assert!(before.is_empty());

        let after = db.list_release_eligible_holds(eligible_at).unwrap();
        assert_eq!(after.len(), 1);

        db.update_hold_state(booking_id, &EscrowState::Held, &EscrowState::Disputed, Utc::now())
            .unwrap();
        let disputed = db.list_release_eligible_holds(eligible_at).unwrap();
        assert!(disputed.is_empty());
    }

    #[test]
    fn test_conditional_state_update() {
        let (db, booking_id) = setup_hold(72);
        let now = Utc::now();

        assert!(db
            .update_hold_state(booking_id, &EscrowState::Held, &EscrowState::Disputed, now)
            .unwrap());
        // Observed state is stale now
        assert!(!db
            .update_hold_state(booking_id, &EscrowState::Held, &EscrowState::Releasable, now)
            .unwrap());

        let hold = db.get_hold(booking_id).unwrap().unwrap();
        assert_eq!(hold.state, EscrowState::Disputed);
        assert!(hold.disputed_at.is_some());
    }
}
