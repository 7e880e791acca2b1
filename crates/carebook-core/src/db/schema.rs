//! SQLite schema definition.

/// Complete database schema for the CareBook core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Directory
-- ============================================================================

CREATE TABLE IF NOT EXISTS therapists (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    commission_override INTEGER CHECK (commission_override BETWEEN 0 AND 100),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_therapists_name ON therapists(name);

CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    commission_override INTEGER CHECK (commission_override BETWEEN 0 AND 100),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_organizations_name ON organizations(name);

-- ============================================================================
-- Therapist / Organization Links
-- ============================================================================

CREATE TABLE IF NOT EXISTS therapist_organization_links (
    therapist_id TEXT NOT NULL REFERENCES therapists(id),
    organization_id TEXT NOT NULL REFERENCES organizations(id),
    therapist_percentage INTEGER NOT NULL,
    organization_percentage INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',      -- pending, approved, rejected
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (therapist_id, organization_id),
    CHECK (therapist_percentage + organization_percentage = 100)
);

CREATE INDEX IF NOT EXISTS idx_links_organization ON therapist_organization_links(organization_id);

-- ============================================================================
-- Bookings
-- ============================================================================

CREATE TABLE IF NOT EXISTS bookings (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    therapist_id TEXT NOT NULL REFERENCES therapists(id),
    organization_id TEXT REFERENCES organizations(id),
    session_type_id TEXT NOT NULL,
    subtotal INTEGER NOT NULL CHECK (subtotal >= 0),
    -- Split columns stay NULL until the booking is confirmed
    commission_percentage INTEGER,
    platform_fee INTEGER,
    therapist_amount INTEGER,
    organization_amount INTEGER,
    status TEXT NOT NULL DEFAULT 'pending_payment',
    tracking_status TEXT NOT NULL DEFAULT 'scheduled',
    checked_in_at TEXT,
    session_started_at TEXT,
    session_ended_at TEXT,
    start_at TEXT NOT NULL,
    end_at TEXT NOT NULL,
    acceptance_pending_since TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);
CREATE INDEX IF NOT EXISTS idx_bookings_therapist_start ON bookings(therapist_id, start_at);
CREATE INDEX IF NOT EXISTS idx_bookings_start ON bookings(start_at);
CREATE INDEX IF NOT EXISTS idx_bookings_pending_since ON bookings(acceptance_pending_since);

-- ============================================================================
-- Escrow Holds
-- ============================================================================

CREATE TABLE IF NOT EXISTS escrow_holds (
    booking_id TEXT PRIMARY KEY REFERENCES bookings(id),
    platform_fee INTEGER NOT NULL,
    therapist_amount INTEGER NOT NULL,
    organization_amount INTEGER NOT NULL,
    state TEXT NOT NULL DEFAULT 'held',          -- held, releasable, released, refunded, disputed
    opened_at TEXT NOT NULL,
    hold_hours INTEGER NOT NULL CHECK (hold_hours >= 0),
    release_eligible_at TEXT,
    disputed_at TEXT,
    resolved_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_holds_state ON escrow_holds(state);
CREATE INDEX IF NOT EXISTS idx_holds_eligible ON escrow_holds(release_eligible_at);

-- ============================================================================
-- Platform Settings (versioned; latest row wins)
-- ============================================================================

CREATE TABLE IF NOT EXISTS platform_settings (
    version INTEGER PRIMARY KEY AUTOINCREMENT,
    platform_commission_percentage INTEGER NOT NULL
        CHECK (platform_commission_percentage BETWEEN 0 AND 100),
    escrow_hold_hours INTEGER NOT NULL CHECK (escrow_hold_hours >= 0),
    updated_by TEXT,
    updated_at TEXT NOT NULL
);

-- Seed defaults: 15% commission, 72 hour dispute window
INSERT OR IGNORE INTO platform_settings
    (version, platform_commission_percentage, escrow_hold_hours, updated_by, updated_at)
VALUES (1, 15, 72, NULL, '1970-01-01T00:00:00+00:00');
"#;
