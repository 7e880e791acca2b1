//! CareBook Core Library
//!
//! Booking lifecycle, revenue-split/escrow engine, and live
//! appointment-tracking core for a therapy marketplace.
//!
//! # Architecture
//!
//! ```text
//! requestBooking ──► PENDING_PAYMENT ──► PENDING_ACCEPTANCE ──► CONFIRMED ──► COMPLETED
//!                         │                      │    ▲              │             │
//!                         │        auto-cancel ──┘    │ accept       │             │
//!                         ▼        (4h sweep)         │              ▼             ▼
//!                     CANCELLED ◄─────────────────────┴──── RevenueSplit      EscrowLedger
//!                                                           + EscrowHold      countdown ──►
//!                                                           (one txn)         RELEASABLE ──► RELEASED
//!
//!        front desk:  SCHEDULED ──► WAITING ──► IN_SESSION ──► COMPLETED
//!                         │            │             └──► CANCELLED
//!                         └────────────┴──► NO_SHOW
//! ```
//!
//! # Core Principle
//!
//! **Money never leaks.** The split is computed once, in exact integer
//! arithmetic, inside the same transaction as the `CONFIRMED` transition;
//! `platform_fee + therapist_amount + organization_amount == subtotal` holds
//! for every booking, always.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence with compare-and-swap transition writes
//! - [`models`]: Domain types (Booking, EscrowHold, links, settings)
//! - [`lifecycle`]: Booking state machine manager
//! - [`tracking`]: Day-of-session appointment tracker
//! - [`split`]: Pure revenue-split calculator
//! - [`escrow`]: Escrow ledger and release sweep
//! - [`analytics`]: Read-only rollups and leaderboards
//! - [`sweep`]: Cancellable ticker and the auto-cancel sweeper
//! - [`events`] / [`payment`]: Notification and payment collaborator seams

pub mod analytics;
pub mod db;
pub mod escrow;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod payment;
pub mod split;
pub mod sweep;
pub mod tracking;

// Re-export commonly used types
pub use analytics::{AnalyticsAggregator, AnalyticsFilter, LeaderboardEntry, ReportWindow, RevenueReport};
pub use db::Database;
pub use escrow::EscrowLedger;
pub use events::{DomainEvent, EventSink, MemorySink, NullSink};
pub use lifecycle::{BookingLifecycle, BookingRequest};
pub use models::{
    Actor, Booking, BookingStatus, DisputeOutcome, EscrowHold, EscrowState, LinkStatus,
    Organization, PlatformSettings, RevenueSplit, Role, SessionSlot, Therapist,
    TherapistOrganizationLink, TrackingStatus,
};
pub use payment::{NullGateway, PaymentCollaborator, RecordingGateway};
pub use split::{compute_split, resolve_commission, CommissionSources, LinkShares};
pub use sweep::{AutoCancelSweeper, SweepOutcome, Ticker, AUTO_CANCEL_PERIOD};
pub use tracking::AppointmentTracker;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

// =========================================================================
// Error Taxonomy
// =========================================================================

/// Top-level error taxonomy for every surface operation.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Caller-fixable input problem (bad percentages, malformed slot,
    /// unresolvable routing party)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Illegal lifecycle/tracking jump; never coerced to a nearby state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Lost a race; refetch current state and decide whether to retry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Actor lacks permission for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown booking/link/hold/party id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage-layer failure
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    /// Process-internal failure (poisoned lock)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Whether retrying the identical request may succeed. Only true for
    /// lost races; validation and transition errors are permanently invalid.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlatformError::Conflict(_))
    }
}

impl From<split::SplitError> for PlatformError {
    fn from(e: split::SplitError) -> Self {
        PlatformError::Validation(e.to_string())
    }
}

impl<T> From<PoisonError<T>> for PlatformError {
    fn from(e: PoisonError<T>) -> Self {
        PlatformError::Internal(format!("Lock poisoned: {}", e))
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

// =========================================================================
// Factory Functions
// =========================================================================

/// Open or create a platform database at the given path.
pub fn open_platform(
    path: &str,
    events: Arc<dyn EventSink>,
    payments: Arc<dyn PaymentCollaborator>,
) -> PlatformResult<Arc<Platform>> {
    let db = Database::open(path)?;
    Ok(Arc::new(Platform::new(db, events, payments)))
}

/// Create an in-memory platform (for testing).
pub fn open_platform_in_memory(
    events: Arc<dyn EventSink>,
    payments: Arc<dyn PaymentCollaborator>,
) -> PlatformResult<Arc<Platform>> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(Platform::new(db, events, payments)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe, transport-agnostic surface over the core.
///
/// Stateless between calls: each operation locks the database, runs one
/// linearizable transition or query, and returns. Identity arrives as an
/// [`Actor`] resolved by the auth collaborator.
pub struct Platform {
    db: Mutex<Database>,
    events: Arc<dyn EventSink>,
    payments: Arc<dyn PaymentCollaborator>,
}

impl Platform {
    pub fn new(
        db: Database,
        events: Arc<dyn EventSink>,
        payments: Arc<dyn PaymentCollaborator>,
    ) -> Self {
        Self {
            db: Mutex::new(db),
            events,
            payments,
        }
    }

    fn db(&self) -> PlatformResult<MutexGuard<'_, Database>> {
        Ok(self.db.lock()?)
    }

    fn require_admin(actor: &Actor) -> PlatformResult<()> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(PlatformError::Forbidden("admin role required".into()))
        }
    }

    // =====================================================================
    // Directory & Links
    // =====================================================================

    /// Register a therapist directory record.
    pub fn register_therapist(&self, name: String) -> PlatformResult<Therapist> {
        let therapist = Therapist::new(name, Utc::now());
        self.db()?.insert_therapist(&therapist)?;
        Ok(therapist)
    }

    /// Register an organization directory record.
    pub fn register_organization(&self, name: String) -> PlatformResult<Organization> {
        let organization = Organization::new(name, Utc::now());
        self.db()?.insert_organization(&organization)?;
        Ok(organization)
    }

    /// Propose a therapist/organization link. Owned by the organization:
    /// only that organization (or an admin) may create it.
    pub fn propose_link(
        &self,
        actor: &Actor,
        therapist_id: Uuid,
        organization_id: Uuid,
        therapist_percentage: u32,
        organization_percentage: u32,
    ) -> PlatformResult<TherapistOrganizationLink> {
        let owns = actor.role == Role::Organization && actor.user_id == organization_id;
        if !owns && !actor.is_admin() {
            return Err(PlatformError::Forbidden(
                "only the owning organization may propose a link".into(),
            ));
        }

        let link = TherapistOrganizationLink::new(
            therapist_id,
            organization_id,
            therapist_percentage,
            organization_percentage,
            Utc::now(),
        );
        if !link.shares_are_valid() {
            return Err(PlatformError::Validation(format!(
                "link shares must sum to 100, got {} + {}",
                therapist_percentage, organization_percentage
            )));
        }

        let db = self.db()?;
        if db.get_therapist(therapist_id)?.is_none() {
            return Err(PlatformError::NotFound(format!("therapist {}", therapist_id)));
        }
        if db.get_organization(organization_id)?.is_none() {
            return Err(PlatformError::NotFound(format!(
                "organization {}",
                organization_id
            )));
        }
        db.insert_link(&link)?;
        Ok(link)
    }

    /// Approve or reject a pending link (terminal decision).
    pub fn decide_link(
        &self,
        actor: &Actor,
        therapist_id: Uuid,
        organization_id: Uuid,
        approve: bool,
    ) -> PlatformResult<TherapistOrganizationLink> {
        let owns = actor.role == Role::Organization && actor.user_id == organization_id;
        if !owns && !actor.is_admin() {
            return Err(PlatformError::Forbidden(
                "only the owning organization may decide a link".into(),
            ));
        }

        let decision = if approve {
            LinkStatus::Approved
        } else {
            LinkStatus::Rejected
        };
        let db = self.db()?;
        if !db.decide_link(therapist_id, organization_id, &decision, Utc::now())? {
            return match db.get_link(therapist_id, organization_id)? {
                Some(link) => Err(PlatformError::Conflict(format!(
                    "link already decided as {:?}",
                    link.status
                ))),
                None => Err(PlatformError::NotFound(format!(
                    "link ({}, {})",
                    therapist_id, organization_id
                ))),
            };
        }
        db.get_link(therapist_id, organization_id)?.ok_or_else(|| {
            PlatformError::NotFound(format!("link ({}, {})", therapist_id, organization_id))
        })
    }

    // =====================================================================
    // Settings & Commission Administration
    // =====================================================================

    /// Write a new platform settings version (admin). Existing bookings keep
    /// their snapshots.
    pub fn update_platform_settings(
        &self,
        actor: &Actor,
        platform_commission_percentage: u32,
        escrow_hold_hours: i64,
    ) -> PlatformResult<PlatformSettings> {
        Self::require_admin(actor)?;
        if platform_commission_percentage > 100 {
            return Err(PlatformError::Validation(format!(
                "commission percentage out of range: {}",
                platform_commission_percentage
            )));
        }
        if escrow_hold_hours < 0 {
            return Err(PlatformError::Validation(format!(
                "escrow hold hours must be non-negative, got {}",
                escrow_hold_hours
            )));
        }
        let settings = self.db()?.insert_settings(
            platform_commission_percentage,
            escrow_hold_hours,
            actor.user_id,
            Utc::now(),
        )?;
        warn!(
            admin = %actor.user_id,
            version = settings.version,
            commission = platform_commission_percentage,
            hold_hours = escrow_hold_hours,
            "platform settings updated"
        );
        Ok(settings)
    }

    /// The current settings snapshot.
    pub fn current_settings(&self) -> PlatformResult<PlatformSettings> {
        Ok(self.db()?.current_settings()?)
    }

    /// Set or clear a therapist's commission override (admin).
    pub fn set_therapist_commission_override(
        &self,
        actor: &Actor,
        therapist_id: Uuid,
        commission_override: Option<u32>,
    ) -> PlatformResult<()> {
        Self::require_admin(actor)?;
        if let Some(pct) = commission_override {
            if pct > 100 {
                return Err(PlatformError::Validation(format!(
                    "commission percentage out of range: {}",
                    pct
                )));
            }
        }
        if !self.db()?.set_therapist_commission_override(
            therapist_id,
            commission_override,
            Utc::now(),
        )? {
            return Err(PlatformError::NotFound(format!("therapist {}", therapist_id)));
        }
        Ok(())
    }

    /// Set or clear an organization's commission override (admin).
    pub fn set_organization_commission_override(
        &self,
        actor: &Actor,
        organization_id: Uuid,
        commission_override: Option<u32>,
    ) -> PlatformResult<()> {
        Self::require_admin(actor)?;
        if let Some(pct) = commission_override {
            if pct > 100 {
                return Err(PlatformError::Validation(format!(
                    "commission percentage out of range: {}",
                    pct
                )));
            }
        }
        if !self.db()?.set_organization_commission_override(
            organization_id,
            commission_override,
            Utc::now(),
        )? {
            return Err(PlatformError::NotFound(format!(
                "organization {}",
                organization_id
            )));
        }
        Ok(())
    }

    // =====================================================================
    // Booking Lifecycle
    // =====================================================================

    /// Create a booking in `PendingPayment` and request capture.
    pub fn request_booking(&self, request: BookingRequest) -> PlatformResult<Booking> {
        let db = self.db()?;
        BookingLifecycle::new(&db, self.events.as_ref(), self.payments.as_ref())
            .request_booking(request, Utc::now())
    }

    /// Capture result reported by the payment collaborator.
    pub fn confirm_payment(&self, booking_id: Uuid) -> PlatformResult<Booking> {
        let db = self.db()?;
        BookingLifecycle::new(&db, self.events.as_ref(), self.payments.as_ref())
            .confirm_payment(booking_id, Utc::now())
    }

    /// Therapist acceptance; computes the split and opens the escrow hold.
    pub fn accept_booking(&self, booking_id: Uuid, actor: &Actor) -> PlatformResult<Booking> {
        let db = self.db()?;
        BookingLifecycle::new(&db, self.events.as_ref(), self.payments.as_ref())
            .accept(booking_id, actor, Utc::now())
    }

    /// Cancellation by any permitted actor.
    pub fn cancel_booking(&self, booking_id: Uuid, actor: &Actor) -> PlatformResult<Booking> {
        let db = self.db()?;
        BookingLifecycle::new(&db, self.events.as_ref(), self.payments.as_ref())
            .cancel(booking_id, actor, Utc::now())
    }

    /// Close the lifecycle once the tracked session finished.
    pub fn complete_booking(&self, booking_id: Uuid) -> PlatformResult<Booking> {
        let db = self.db()?;
        BookingLifecycle::new(&db, self.events.as_ref(), self.payments.as_ref())
            .complete(booking_id, Utc::now())
    }

    /// Fetch a booking.
    pub fn get_booking(&self, booking_id: Uuid) -> PlatformResult<Booking> {
        self.db()?
            .get_booking(booking_id)?
            .ok_or_else(|| PlatformError::NotFound(format!("booking {}", booking_id)))
    }

    /// Administrative split override; logged, never silent. The replacement
    /// must balance against the subtotal exactly.
    pub fn override_split(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        split: RevenueSplit,
    ) -> PlatformResult<Booking> {
        Self::require_admin(actor)?;
        if split.commission_percentage > 100 {
            return Err(PlatformError::Validation(format!(
                "commission percentage out of range: {}",
                split.commission_percentage
            )));
        }

        let db = self.db()?;
        let booking = db
            .get_booking(booking_id)?
            .ok_or_else(|| PlatformError::NotFound(format!("booking {}", booking_id)))?;
        if split.total() != booking.subtotal {
            return Err(PlatformError::Validation(format!(
                "override must sum to subtotal {}, got {}",
                booking.subtotal,
                split.total()
            )));
        }
        if !db.override_split(booking_id, &split, Utc::now())? {
            return Err(PlatformError::InvalidTransition(
                "cannot override a split that was never resolved".into(),
            ));
        }
        warn!(
            admin = %actor.user_id,
            booking_id = %booking_id,
            platform_fee = split.platform_fee,
            therapist_amount = split.therapist_amount,
            organization_amount = split.organization_amount,
            "administrative split override applied"
        );
        db.get_booking(booking_id)?
            .ok_or_else(|| PlatformError::NotFound(format!("booking {}", booking_id)))
    }

    // =====================================================================
    // Appointment Tracking
    // =====================================================================

    /// Front-desk check-in.
    pub fn check_in(&self, booking_id: Uuid) -> PlatformResult<Booking> {
        let db = self.db()?;
        AppointmentTracker::new(&db).check_in(booking_id, Utc::now())
    }

    /// Session start.
    pub fn start_session(&self, booking_id: Uuid) -> PlatformResult<Booking> {
        let db = self.db()?;
        AppointmentTracker::new(&db).start_session(booking_id, Utc::now())
    }

    /// Session end; unblocks lifecycle completion.
    pub fn complete_session(&self, booking_id: Uuid) -> PlatformResult<Booking> {
        let db = self.db()?;
        AppointmentTracker::new(&db).complete_session(booking_id, Utc::now())
    }

    /// No-show shortcut.
    pub fn mark_no_show(&self, booking_id: Uuid) -> PlatformResult<Booking> {
        let db = self.db()?;
        AppointmentTracker::new(&db).mark_no_show(booking_id, Utc::now())
    }

    /// Mid-session cancellation shortcut.
    pub fn mark_session_cancelled(&self, booking_id: Uuid) -> PlatformResult<Booking> {
        let db = self.db()?;
        AppointmentTracker::new(&db).mark_cancelled(booking_id, Utc::now())
    }

    // =====================================================================
    // Schedule & Analytics
    // =====================================================================

    /// Consolidated schedule for one calendar day (UTC).
    pub fn schedule_for_date(
        &self,
        date: NaiveDate,
        therapist_id: Option<Uuid>,
    ) -> PlatformResult<Vec<Booking>> {
        let from = date.and_time(NaiveTime::MIN).and_utc();
        let to = from + chrono::Duration::days(1);
        self.schedule_for_range(from, to, therapist_id)
    }

    /// Consolidated schedule for an arbitrary range.
    pub fn schedule_for_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        therapist_id: Option<Uuid>,
    ) -> PlatformResult<Vec<Booking>> {
        let db = self.db()?;
        AnalyticsAggregator::new(&db).schedule(from, to, therapist_id)
    }

    /// Revenue/volume rollup for a window.
    pub fn revenue_report(
        &self,
        window: ReportWindow,
        filter: AnalyticsFilter,
    ) -> PlatformResult<RevenueReport> {
        let db = self.db()?;
        AnalyticsAggregator::new(&db).revenue_report(window, filter)
    }

    /// Therapist leaderboard for a window.
    pub fn therapist_leaderboard(
        &self,
        window: ReportWindow,
        top_n: usize,
    ) -> PlatformResult<Vec<LeaderboardEntry>> {
        let db = self.db()?;
        AnalyticsAggregator::new(&db).therapist_leaderboard(window, top_n)
    }

    /// Organization leaderboard for a window.
    pub fn organization_leaderboard(
        &self,
        window: ReportWindow,
        top_n: usize,
    ) -> PlatformResult<Vec<LeaderboardEntry>> {
        let db = self.db()?;
        AnalyticsAggregator::new(&db).organization_leaderboard(window, top_n)
    }

    // =====================================================================
    // Escrow
    // =====================================================================

    /// Fetch the escrow hold for a booking.
    pub fn get_hold(&self, booking_id: Uuid) -> PlatformResult<EscrowHold> {
        let db = self.db()?;
        EscrowLedger::new(&db, self.events.as_ref()).get_hold(booking_id)
    }

    /// Freeze a hold pending dispute resolution.
    pub fn open_dispute(&self, booking_id: Uuid) -> PlatformResult<EscrowHold> {
        let db = self.db()?;
        EscrowLedger::new(&db, self.events.as_ref()).open_dispute(booking_id, Utc::now())
    }

    /// Resolve a dispute (admin).
    pub fn resolve_dispute(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        outcome: DisputeOutcome,
    ) -> PlatformResult<EscrowHold> {
        Self::require_admin(actor)?;
        let db = self.db()?;
        let hold =
            EscrowLedger::new(&db, self.events.as_ref()).resolve_dispute(booking_id, outcome, Utc::now())?;
        if hold.state == EscrowState::Refunded {
            if let Err(e) = self.payments.request_refund(booking_id, hold.held_total()) {
                warn!(booking_id = %booking_id, error = %e, "refund request failed");
            }
        }
        Ok(hold)
    }

    /// Pay out a releasable hold.
    pub fn release_hold(&self, booking_id: Uuid) -> PlatformResult<EscrowHold> {
        let db = self.db()?;
        EscrowLedger::new(&db, self.events.as_ref()).release(booking_id, Utc::now())
    }

    // =====================================================================
    // Background Sweeps
    // =====================================================================

    /// One auto-cancel pass over stale unaccepted bookings.
    pub fn run_auto_cancel_pass(&self) -> PlatformResult<SweepOutcome> {
        let db = self.db()?;
        AutoCancelSweeper::new(&db, self.events.as_ref(), self.payments.as_ref())
            .run_pass(Utc::now())
    }

    /// One escrow release pass promoting eligible holds.
    pub fn run_escrow_release_pass(&self) -> PlatformResult<escrow::ReleaseSweepOutcome> {
        let db = self.db()?;
        EscrowLedger::new(&db, self.events.as_ref()).sweep_release(Utc::now())
    }

    /// Start both periodic sweepers. Dropping (or stopping) the returned
    /// tickers tears the worker threads down deterministically.
    pub fn start_sweepers(
        self: &Arc<Self>,
        auto_cancel_period: Duration,
        escrow_release_period: Duration,
    ) -> std::io::Result<(Ticker, Ticker)> {
        let platform = Arc::clone(self);
        let auto_cancel = Ticker::spawn("auto-cancel", auto_cancel_period, move || {
            if let Err(e) = platform.run_auto_cancel_pass() {
                warn!(error = %e, "auto-cancel pass failed");
            }
        })?;

        let platform = Arc::clone(self);
        let escrow_release = Ticker::spawn("escrow-release", escrow_release_period, move || {
            if let Err(e) = platform.run_escrow_release_pass() {
                warn!(error = %e, "escrow release pass failed");
            }
        })?;

        Ok((auto_cancel, escrow_release))
    }
}
