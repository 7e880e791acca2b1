//! Booking lifecycle manager.
//!
//! Owns the `PendingPayment → PendingAcceptance → Confirmed → Completed`
//! state machine. Every transition is a conditional update keyed on the
//! status the caller observed, so concurrent writers lose cleanly with
//! `Conflict` instead of corrupting state. The revenue split and the escrow
//! hold are written inside the same transaction as the `Confirmed`
//! transition.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{CompletionWrite, Database};
use crate::escrow::EscrowLedger;
use crate::events::{DomainEvent, EventSink};
use crate::models::{
    Actor, Booking, BookingStatus, EscrowHold, Role, SessionSlot,
};
use crate::payment::PaymentCollaborator;
use crate::split::{compute_split, resolve_commission, CommissionSources, LinkShares};
use crate::{PlatformError, PlatformResult};

/// A new booking request.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub session_type_id: Uuid,
    /// Price in minor currency units
    pub subtotal: i64,
    pub slot: SessionSlot,
}

/// Booking lifecycle manager.
pub struct BookingLifecycle<'a> {
    db: &'a Database,
    events: &'a dyn EventSink,
    payments: &'a dyn PaymentCollaborator,
}

impl<'a> BookingLifecycle<'a> {
    pub fn new(
        db: &'a Database,
        events: &'a dyn EventSink,
        payments: &'a dyn PaymentCollaborator,
    ) -> Self {
        Self {
            db,
            events,
            payments,
        }
    }

    fn get(&self, id: Uuid) -> PlatformResult<Booking> {
        self.db
            .get_booking(id)?
            .ok_or_else(|| PlatformError::NotFound(format!("booking {}", id)))
    }

    /// Create a booking in `PendingPayment` and ask the payment collaborator
    /// to capture.
    pub fn request_booking(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> PlatformResult<Booking> {
        if !request.slot.is_well_formed() {
            return Err(PlatformError::Validation(
                "session slot must end after it starts".into(),
            ));
        }
        if request.subtotal < 0 {
            return Err(PlatformError::Validation(format!(
                "subtotal must be non-negative, got {}",
                request.subtotal
            )));
        }
        if self.db.get_therapist(request.therapist_id)?.is_none() {
            return Err(PlatformError::NotFound(format!(
                "therapist {}",
                request.therapist_id
            )));
        }

        // Organization routing must resolve to a single responsible party:
        // an organization id is only valid with an approved link behind it.
        if let Some(organization_id) = request.organization_id {
            if self.db.get_organization(organization_id)?.is_none() {
                return Err(PlatformError::NotFound(format!(
                    "organization {}",
                    organization_id
                )));
            }
            let link = self.db.get_link(request.therapist_id, organization_id)?;
            if !link.map(|l| l.is_approved()).unwrap_or(false) {
                return Err(PlatformError::Validation(format!(
                    "therapist {} has no approved link with organization {}",
                    request.therapist_id, organization_id
                )));
            }
        }

        let overlapping = self.db.count_overlapping(
            request.therapist_id,
            request.slot.start_at,
            request.slot.end_at,
        )?;
        if overlapping > 0 {
            return Err(PlatformError::Validation(
                "requested slot is not available".into(),
            ));
        }

        let booking = Booking::new(
            request.patient_id,
            request.therapist_id,
            request.organization_id,
            request.session_type_id,
            request.subtotal,
            request.slot,
            now,
        );
        self.db.insert_booking(&booking)?;
        info!(booking_id = %booking.id, therapist_id = %booking.therapist_id, "booking requested");

        // Fire-and-forget: the collaborator reports back via confirm_payment
        if let Err(e) = self.payments.request_capture(booking.id, booking.subtotal) {
            warn!(booking_id = %booking.id, error = %e, "capture request failed");
        }

        Ok(booking)
    }

    /// Capture reported by the payment collaborator:
    /// `PendingPayment → PendingAcceptance`.
    pub fn confirm_payment(&self, id: Uuid, now: DateTime<Utc>) -> PlatformResult<Booking> {
        let booking = self.get(id)?;
        if booking.status != BookingStatus::PendingPayment {
            return Err(PlatformError::InvalidTransition(format!(
                "cannot confirm payment for booking in state {:?}",
                booking.status
            )));
        }
        if !self.db.mark_payment_confirmed(id, now)? {
            return Err(PlatformError::Conflict(format!(
                "booking {} changed state during payment confirmation",
                id
            )));
        }
        info!(booking_id = %id, "payment confirmed, awaiting acceptance");
        self.get(id)
    }

    /// Therapist acceptance: `PendingAcceptance → Confirmed`.
    ///
    /// Resolves the commission, computes the split, and opens the escrow hold
    /// inside one transaction with the status flip. Exactly one of N
    /// concurrent accepts succeeds; the rest observe `Conflict`.
    pub fn accept(&self, id: Uuid, actor: &Actor, now: DateTime<Utc>) -> PlatformResult<Booking> {
        let booking = self.get(id)?;

        let permitted = match actor.role {
            Role::Admin => true,
            Role::Therapist => actor.user_id == booking.therapist_id,
            _ => false,
        };
        if !permitted {
            return Err(PlatformError::Forbidden(
                "only the booking's therapist may accept".into(),
            ));
        }

        match booking.status {
            BookingStatus::PendingAcceptance => {}
            BookingStatus::PendingPayment => {
                return Err(PlatformError::InvalidTransition(
                    "cannot accept a booking before payment".into(),
                ))
            }
            other => {
                return Err(PlatformError::Conflict(format!(
                    "booking {} already advanced to {:?}",
                    id, other
                )))
            }
        }

        let settings = self.db.current_settings()?;
        let therapist = self
            .db
            .get_therapist(booking.therapist_id)?
            .ok_or_else(|| PlatformError::NotFound(format!("therapist {}", booking.therapist_id)))?;

        let (organization_override, shares) = match booking.organization_id {
            None => (None, None),
            Some(organization_id) => {
                let organization = self.db.get_organization(organization_id)?.ok_or_else(|| {
                    PlatformError::NotFound(format!("organization {}", organization_id))
                })?;
                let shares = match self.db.get_link(booking.therapist_id, organization_id)? {
                    Some(link) if link.is_approved() => LinkShares {
                        therapist_percentage: link.therapist_percentage,
                        organization_percentage: link.organization_percentage,
                    },
                    _ => LinkShares::split_default(),
                };
                (organization.commission_override, Some(shares))
            }
        };

        let commission_percentage = resolve_commission(&CommissionSources {
            therapist_override: therapist.commission_override,
            organization_override,
            platform_default: settings.platform_commission_percentage,
        })?;
        let split = compute_split(booking.subtotal, commission_percentage, shares)?;
        let hold = EscrowHold::open(id, &split, settings.escrow_hold_hours, now);

        if !self.db.confirm_booking(id, &split, &hold, now)? {
            return Err(PlatformError::Conflict(format!(
                "booking {} was accepted or cancelled by a concurrent caller",
                id
            )));
        }

        info!(
            booking_id = %id,
            commission = commission_percentage,
            platform_fee = split.platform_fee,
            "booking confirmed with split"
        );
        self.events.publish(DomainEvent::BookingConfirmed {
            booking_id: id,
            therapist_id: booking.therapist_id,
            occurred_at: now,
        });
        self.get(id)
    }

    /// Cancellation by any permitted actor, from any non-terminal state.
    ///
    /// A booking that reached `Confirmed` has its hold refunded and a refund
    /// requested from the payment collaborator.
    pub fn cancel(&self, id: Uuid, actor: &Actor, now: DateTime<Utc>) -> PlatformResult<Booking> {
        let booking = self.get(id)?;

        let target = match actor.role {
            Role::Patient => {
                if actor.user_id != booking.patient_id {
                    return Err(PlatformError::Forbidden(
                        "only the booking's patient may cancel on the patient side".into(),
                    ));
                }
                BookingStatus::CancelledByPatient
            }
            Role::Therapist => {
                if actor.user_id != booking.therapist_id {
                    return Err(PlatformError::Forbidden(
                        "only the booking's therapist may cancel on the therapist side".into(),
                    ));
                }
                BookingStatus::CancelledByTherapist
            }
            Role::Admin | Role::System => BookingStatus::CancelledByTherapist,
            _ => {
                return Err(PlatformError::Forbidden(
                    "actor may not cancel bookings".into(),
                ))
            }
        };

        if booking.status.is_terminal() {
            return Err(PlatformError::InvalidTransition(format!(
                "cannot cancel booking in terminal state {:?}",
                booking.status
            )));
        }
        if !self.db.cancel_booking(id, &booking.status, &target, now)? {
            return Err(PlatformError::Conflict(format!(
                "booking {} changed state during cancellation",
                id
            )));
        }

        if booking.status == BookingStatus::Confirmed {
            if let Err(e) = self.payments.request_refund(id, booking.subtotal) {
                warn!(booking_id = %id, error = %e, "refund request failed");
            }
            EscrowLedger::new(self.db, self.events).refund_for_cancellation(id, now)?;
        }

        info!(booking_id = %id, target = ?target, actor_role = ?actor.role, "booking cancelled");
        self.events.publish(DomainEvent::BookingCancelled {
            booking_id: id,
            status: target,
            occurred_at: now,
        });
        self.get(id)
    }

    /// Close the lifecycle: `Confirmed → Completed`, gated on the tracked
    /// session having actually finished. Starts the escrow countdown.
    pub fn complete(&self, id: Uuid, now: DateTime<Utc>) -> PlatformResult<Booking> {
        match self.db.complete_booking(id, now)? {
            CompletionWrite::Done {
                release_eligible_at,
            } => {
                info!(booking_id = %id, %release_eligible_at, "booking completed");
                self.events.publish(DomainEvent::BookingCompleted {
                    booking_id: id,
                    release_eligible_at,
                    occurred_at: now,
                });
                self.get(id)
            }
            CompletionWrite::WrongStatus(status) => Err(PlatformError::InvalidTransition(format!(
                "cannot complete booking in state {:?}",
                status
            ))),
            CompletionWrite::TrackingNotFinished(tracking) => {
                Err(PlatformError::InvalidTransition(format!(
                    "cannot complete booking while tracking is {:?}",
                    tracking
                )))
            }
            CompletionWrite::NotFound => {
                Err(PlatformError::NotFound(format!("booking {}", id)))
            }
        }
    }
}
