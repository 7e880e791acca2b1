//! Domain events for the notification collaborator.
//!
//! Events are fire-and-forget: the core publishes after a successful
//! transition and never blocks on (or fails because of) delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::BookingStatus;

/// Events the core emits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DomainEvent {
    BookingConfirmed {
        booking_id: Uuid,
        therapist_id: Uuid,
        occurred_at: DateTime<Utc>,
    },
    BookingCompleted {
        booking_id: Uuid,
        release_eligible_at: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    BookingCancelled {
        booking_id: Uuid,
        status: BookingStatus,
        occurred_at: DateTime<Utc>,
    },
    EscrowReleased {
        booking_id: Uuid,
        therapist_amount: i64,
        organization_amount: i64,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Stable event name for subscribers.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::BookingConfirmed { .. } => "booking.confirmed",
            DomainEvent::BookingCompleted { .. } => "booking.completed",
            DomainEvent::BookingCancelled { .. } => "booking.cancelled",
            DomainEvent::EscrowReleased { .. } => "escrow.released",
        }
    }
}

/// The notification collaborator seam.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Sink that drops everything (default for callers without notifications).
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: DomainEvent) {}
}

/// Buffering sink for tests.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Names of all events published so far, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::name).collect()
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: DomainEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}
