//! Revenue split computation.
//!
//! Pipeline: commission resolution → integer split with banker's rounding.
//! Pure and deterministic; invoked exactly once per booking, at confirmation.

mod calculator;
mod commission;

pub use calculator::*;
pub use commission::*;

use thiserror::Error;

/// Split errors. Everything here is caller-fixable validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SplitError {
    #[error("Commission percentage out of range: {0} (must be 0-100)")]
    CommissionOutOfRange(u32),

    #[error("Link shares must sum to 100, got {therapist} + {organization}")]
    InvalidLinkShares { therapist: u32, organization: u32 },

    #[error("Subtotal must be non-negative, got {0}")]
    NegativeSubtotal(i64),
}

pub type SplitResult<T> = Result<T, SplitError>;
