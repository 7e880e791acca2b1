//! Therapist and organization directory operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;
use uuid::Uuid;

use super::{parse_id, parse_ts, ts, Database, DbResult};
use crate::models::{Organization, Therapist};

impl Database {
    /// Insert a therapist directory record.
    pub fn insert_therapist(&self, therapist: &Therapist) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO therapists (id, name, commission_override, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                therapist.id.to_string(),
                therapist.name,
                therapist.commission_override,
                ts(therapist.created_at),
                ts(therapist.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Get a therapist by id.
    pub fn get_therapist(&self, id: Uuid) -> DbResult<Option<Therapist>> {
        self.conn
            .query_row(
                "SELECT id, name, commission_override, created_at, updated_at \
                 FROM therapists WHERE id = ?",
                [id.to_string()],
                party_row,
            )
            .optional()?
            .map(|row| {
                Ok(Therapist {
                    id: parse_id(&row.id)?,
                    name: row.name,
                    commission_override: row.commission_override,
                    created_at: parse_ts(&row.created_at)?,
                    updated_at: parse_ts(&row.updated_at)?,
                })
            })
            .transpose()
    }

    /// Set or clear a therapist's commission override.
    pub fn set_therapist_commission_override(
        &self,
        id: Uuid,
        commission_override: Option<u32>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE therapists SET commission_override = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), commission_override, ts(now)],
        )?;
        Ok(rows_affected > 0)
    }

    /// Insert an organization directory record.
    pub fn insert_organization(&self, organization: &Organization) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO organizations (id, name, commission_override, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                organization.id.to_string(),
                organization.name,
                organization.commission_override,
                ts(organization.created_at),
                ts(organization.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Get an organization by id.
    pub fn get_organization(&self, id: Uuid) -> DbResult<Option<Organization>> {
        self.conn
            .query_row(
                "SELECT id, name, commission_override, created_at, updated_at \
                 FROM organizations WHERE id = ?",
                [id.to_string()],
                party_row,
            )
            .optional()?
            .map(|row| {
                Ok(Organization {
                    id: parse_id(&row.id)?,
                    name: row.name,
                    commission_override: row.commission_override,
                    created_at: parse_ts(&row.created_at)?,
                    updated_at: parse_ts(&row.updated_at)?,
                })
            })
            .transpose()
    }

    /// Set or clear an organization's commission override.
    pub fn set_organization_commission_override(
        &self,
        id: Uuid,
        commission_override: Option<u32>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE organizations SET commission_override = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), commission_override, ts(now)],
        )?;
        Ok(rows_affected > 0)
    }

    /// Display names for leaderboards, keyed by id.
    pub fn therapist_names(&self) -> DbResult<HashMap<Uuid, String>> {
        self.party_names("therapists")
    }

    /// Display names for leaderboards, keyed by id.
    pub fn organization_names(&self) -> DbResult<HashMap<Uuid, String>> {
        self.party_names("organizations")
    }

    fn party_names(&self, table: &str) -> DbResult<HashMap<Uuid, String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, name FROM {}", table))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut names = HashMap::new();
        for row in rows {
            let (id, name) = row?;
            names.insert(parse_id(&id)?, name);
        }
        Ok(names)
    }
}

/// Shared row shape for both directory tables.
struct PartyRow {
    id: String,
    name: String,
    commission_override: Option<u32>,
    created_at: String,
    updated_at: String,
}

fn party_row(row: &Row<'_>) -> rusqlite::Result<PartyRow> {
    Ok(PartyRow {
        id: row.get(0)?,
        name: row.get(1)?,
        commission_override: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
