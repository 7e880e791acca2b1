//! Versioned platform settings operations.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use super::{parse_id_opt, parse_ts, ts, Database, DbResult};
use crate::models::PlatformSettings;

impl Database {
    /// The current settings snapshot (latest version wins). The schema seeds
    /// version 1, so this always resolves.
    pub fn current_settings(&self) -> DbResult<PlatformSettings> {
        let row = self.conn.query_row(
            r#"
            SELECT version, platform_commission_percentage, escrow_hold_hours,
                   updated_by, updated_at
            FROM platform_settings
            ORDER BY version DESC
            LIMIT 1
            "#,
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;

        Ok(PlatformSettings {
            version: row.0,
            platform_commission_percentage: row.1,
            escrow_hold_hours: row.2,
            updated_by: parse_id_opt(row.3)?,
            updated_at: parse_ts(&row.4)?,
        })
    }

    /// Append a new settings version and return the snapshot written.
    ///
    /// Existing bookings are untouched: they carry what they snapshotted at
    /// confirmation time.
    pub fn insert_settings(
        &self,
        platform_commission_percentage: u32,
        escrow_hold_hours: i64,
        updated_by: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<PlatformSettings> {
        self.conn.execute(
            r#"
            INSERT INTO platform_settings
                (platform_commission_percentage, escrow_hold_hours, updated_by, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                platform_commission_percentage,
                escrow_hold_hours,
                updated_by.to_string(),
                ts(now),
            ],
        )?;
        let version = self.conn.last_insert_rowid();

        Ok(PlatformSettings {
            version,
            platform_commission_percentage,
            escrow_hold_hours,
            updated_by: Some(updated_by),
            updated_at: now,
        })
    }
}
