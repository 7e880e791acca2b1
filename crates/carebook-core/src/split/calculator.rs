//! Integer split computation.
//!
//! All arithmetic is on minor currency units; no floating point anywhere.
//! The platform fee rounds half-to-even; the remainder splits by link shares
//! with any single rounding unit assigned to the organization, so
//! `platform_fee + therapist_amount + organization_amount == subtotal` holds
//! exactly for every input.

use crate::models::RevenueSplit;

use super::{SplitError, SplitResult};

/// Default remainder shares when an organization is involved but no approved
/// link exists.
pub const DEFAULT_THERAPIST_SHARE: u32 = 60;
pub const DEFAULT_ORGANIZATION_SHARE: u32 = 40;

/// Remainder shares between therapist and organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkShares {
    pub therapist_percentage: u32,
    pub organization_percentage: u32,
}

impl LinkShares {
    pub fn split_default() -> Self {
        Self {
            therapist_percentage: DEFAULT_THERAPIST_SHARE,
            organization_percentage: DEFAULT_ORGANIZATION_SHARE,
        }
    }
}

/// Compute the revenue split for a booking.
///
/// `shares` is `None` for a direct-to-therapist booking (no organization):
/// the full remainder goes to the therapist.
pub fn compute_split(
    subtotal: i64,
    commission_percentage: u32,
    shares: Option<LinkShares>,
) -> SplitResult<RevenueSplit> {
    if subtotal < 0 {
        return Err(SplitError::NegativeSubtotal(subtotal));
    }
    if commission_percentage > 100 {
        return Err(SplitError::CommissionOutOfRange(commission_percentage));
    }
    if let Some(shares) = &shares {
        if u64::from(shares.therapist_percentage) + u64::from(shares.organization_percentage) != 100
        {
            return Err(SplitError::InvalidLinkShares {
                therapist: shares.therapist_percentage,
                organization: shares.organization_percentage,
            });
        }
    }

    let platform_fee = round_half_even_div(subtotal * i64::from(commission_percentage), 100);
    let remainder = subtotal - platform_fee;

    let (therapist_amount, organization_amount) = match shares {
        None => (remainder, 0),
        Some(shares) => {
            let therapist_amount =
                round_half_even_div(remainder * i64::from(shares.therapist_percentage), 100);
            // The rounding unit always lands on the organization side
            (therapist_amount, remainder - therapist_amount)
        }
    };

    Ok(RevenueSplit {
        commission_percentage,
        platform_fee,
        therapist_amount,
        organization_amount,
    })
}

/// `numerator / denominator` rounded half-to-even, for non-negative
/// numerators and positive denominators.
fn round_half_even_div(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let doubled = remainder * 2;
    if doubled > denominator || (doubled == denominator && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}
