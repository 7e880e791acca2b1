//! Payment collaborator seam.
//!
//! The core never talks to card networks: it asks the collaborator to capture
//! or refund, and the collaborator reports outcomes back through the booking
//! surface (`confirm_payment`, cancellation flow). Requests are
//! fire-and-forget from the core's perspective; a failed request is logged by
//! the caller and retried out-of-band by the collaborator's own machinery.

use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Collaborator-side request failure.
#[derive(Error, Debug)]
pub enum PaymentRequestError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Payment request rejected: {0}")]
    Rejected(String),
}

/// The external payment processor seam.
pub trait PaymentCollaborator: Send + Sync {
    /// Ask the processor to capture the booking subtotal.
    fn request_capture(&self, booking_id: Uuid, amount: i64) -> Result<(), PaymentRequestError>;

    /// Ask the processor to refund a previously captured booking.
    fn request_refund(&self, booking_id: Uuid, amount: i64) -> Result<(), PaymentRequestError>;
}

/// Gateway that accepts everything and does nothing (default collaborator).
pub struct NullGateway;

impl PaymentCollaborator for NullGateway {
    fn request_capture(&self, _booking_id: Uuid, _amount: i64) -> Result<(), PaymentRequestError> {
        Ok(())
    }

    fn request_refund(&self, _booking_id: Uuid, _amount: i64) -> Result<(), PaymentRequestError> {
        Ok(())
    }
}

/// A recorded payment request, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRequest {
    Capture { booking_id: Uuid, amount: i64 },
    Refund { booking_id: Uuid, amount: i64 },
}

/// Recording gateway for tests.
#[derive(Default)]
pub struct RecordingGateway {
    requests: Mutex<Vec<PaymentRequest>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl PaymentCollaborator for RecordingGateway {
    fn request_capture(&self, booking_id: Uuid, amount: i64) -> Result<(), PaymentRequestError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PaymentRequest::Capture { booking_id, amount });
        Ok(())
    }

    fn request_refund(&self, booking_id: Uuid, amount: i64) -> Result<(), PaymentRequestError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PaymentRequest::Refund { booking_id, amount });
        Ok(())
    }
}
