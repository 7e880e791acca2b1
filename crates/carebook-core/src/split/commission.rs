//! Effective commission resolution.

use super::{SplitError, SplitResult};

/// The commission sources visible at confirmation time.
///
/// Precedence: therapist override, then organization override, then the
/// platform default. The chosen value is snapshotted into the booking and
/// never recomputed when settings change later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSources {
    pub therapist_override: Option<u32>,
    pub organization_override: Option<u32>,
    pub platform_default: u32,
}

/// Resolve the effective commission percentage, rejecting out-of-range
/// values before any money math runs.
pub fn resolve_commission(sources: &CommissionSources) -> SplitResult<u32> {
    let effective = sources
        .therapist_override
        .or(sources.organization_override)
        .unwrap_or(sources.platform_default);

    if effective > 100 {
        return Err(SplitError::CommissionOutOfRange(effective));
    }
    Ok(effective)
}
