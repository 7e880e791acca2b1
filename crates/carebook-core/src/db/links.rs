//! Therapist/organization link database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{parse_id, parse_ts, ts, Database, DbError, DbResult};
use crate::models::{LinkStatus, TherapistOrganizationLink};

const LINK_COLUMNS: &str = "therapist_id, organization_id, therapist_percentage, \
     organization_percentage, status, created_at, updated_at";

impl Database {
    /// Insert a new link. The primary key enforces at most one link per
    /// (therapist, organization) pair.
    pub fn insert_link(&self, link: &TherapistOrganizationLink) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO therapist_organization_links (
                therapist_id, organization_id, therapist_percentage,
                organization_percentage, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                link.therapist_id.to_string(),
                link.organization_id.to_string(),
                link.therapist_percentage,
                link.organization_percentage,
                link_status_to_string(&link.status),
                ts(link.created_at),
                ts(link.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Get the link for a (therapist, organization) pair.
    pub fn get_link(
        &self,
        therapist_id: Uuid,
        organization_id: Uuid,
    ) -> DbResult<Option<TherapistOrganizationLink>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM therapist_organization_links \
                     WHERE therapist_id = ?1 AND organization_id = ?2",
                    LINK_COLUMNS
                ),
                params![therapist_id.to_string(), organization_id.to_string()],
                link_row,
            )
            .optional()?
            .map(TherapistOrganizationLink::try_from)
            .transpose()
    }

    /// Move a pending link to its terminal decision. Conditional on the link
    /// still being pending.
    pub fn decide_link(
        &self,
        therapist_id: Uuid,
        organization_id: Uuid,
        decision: &LinkStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE therapist_organization_links SET status = ?3, updated_at = ?4
            WHERE therapist_id = ?1 AND organization_id = ?2 AND status = 'pending'
            "#,
            params![
                therapist_id.to_string(),
                organization_id.to_string(),
                link_status_to_string(decision),
                ts(now),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// All links owned by an organization.
    pub fn list_links_for_organization(
        &self,
        organization_id: Uuid,
    ) -> DbResult<Vec<TherapistOrganizationLink>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM therapist_organization_links \
             WHERE organization_id = ? ORDER BY created_at ASC",
            LINK_COLUMNS
        ))?;
        let rows = stmt.query_map([organization_id.to_string()], link_row)?;

        let mut links = Vec::new();
        for row in rows {
            links.push(row?.try_into()?);
        }
        Ok(links)
    }
}

/// Intermediate row struct for database mapping.
struct LinkRow {
    therapist_id: String,
    organization_id: String,
    therapist_percentage: u32,
    organization_percentage: u32,
    status: String,
    created_at: String,
    updated_at: String,
}

fn link_row(row: &Row<'_>) -> rusqlite::Result<LinkRow> {
    Ok(LinkRow {
        therapist_id: row.get(0)?,
        organization_id: row.get(1)?,
        therapist_percentage: row.get(2)?,
        organization_percentage: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl TryFrom<LinkRow> for TherapistOrganizationLink {
    type Error = DbError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        Ok(TherapistOrganizationLink {
            therapist_id: parse_id(&row.therapist_id)?,
            organization_id: parse_id(&row.organization_id)?,
            therapist_percentage: row.therapist_percentage,
            organization_percentage: row.organization_percentage,
            status: string_to_link_status(&row.status)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

pub(crate) fn link_status_to_string(status: &LinkStatus) -> &'static str {
    match status {
        LinkStatus::Pending => "pending",
        LinkStatus::Approved => "approved",
        LinkStatus::Rejected => "rejected",
    }
}

pub(crate) fn string_to_link_status(s: &str) -> Result<LinkStatus, DbError> {
    match s {
        "pending" => Ok(LinkStatus::Pending),
        "approved" => Ok(LinkStatus::Approved),
        "rejected" => Ok(LinkStatus::Rejected),
        _ => Err(DbError::Constraint(format!("Unknown link status: {}", s))),
    }
}
