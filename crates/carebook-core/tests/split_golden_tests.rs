//! Golden tests for the revenue split calculator.
//!
//! These verify exact amounts for known scenarios, plus the sum invariant
//! over the whole input space.

use carebook_core::split::{compute_split, LinkShares, SplitError};
use proptest::prelude::*;

/// Known-good split case.
struct GoldenCase {
    id: &'static str,
    subtotal: i64,
    commission: u32,
    shares: Option<(u32, u32)>,
    expected_platform: i64,
    expected_therapist: i64,
    expected_organization: i64,
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "direct-15pct",
            subtotal: 10_000,
            commission: 15,
            shares: None,
            expected_platform: 1_500,
            expected_therapist: 8_500,
            expected_organization: 0,
        },
        GoldenCase {
            id: "org-60-40",
            subtotal: 10_000,
            commission: 15,
            shares: Some((60, 40)),
            expected_platform: 1_500,
            expected_therapist: 5_100,
            expected_organization: 3_400,
        },
        GoldenCase {
            id: "zero-subtotal",
            subtotal: 0,
            commission: 15,
            shares: Some((60, 40)),
            expected_platform: 0,
            expected_therapist: 0,
            expected_organization: 0,
        },
        GoldenCase {
            id: "zero-commission",
            subtotal: 10_000,
            commission: 0,
            shares: None,
            expected_platform: 0,
            expected_therapist: 10_000,
            expected_organization: 0,
        },
        GoldenCase {
            id: "full-commission",
            subtotal: 10_000,
            commission: 100,
            shares: Some((60, 40)),
            expected_platform: 10_000,
            expected_therapist: 0,
            expected_organization: 0,
        },
        GoldenCase {
            // 9 999 * 15% = 1 499.85 → 1 500 platform, 8 499 remainder
            id: "fee-rounds-up",
            subtotal: 9_999,
            commission: 15,
            shares: None,
            expected_platform: 1_500,
            expected_therapist: 8_499,
            expected_organization: 0,
        },
        GoldenCase {
            // 10 * 25% = 2.5 → banker's rounding keeps the even 2
            id: "fee-half-to-even",
            subtotal: 10,
            commission: 25,
            shares: None,
            expected_platform: 2,
            expected_therapist: 8,
            expected_organization: 0,
        },
        GoldenCase {
            // remainder 85 at 50/50: therapist 42.5 → 42 (even), org picks up 43
            id: "remainder-unit-to-organization",
            subtotal: 100,
            commission: 15,
            shares: Some((50, 50)),
            expected_platform: 15,
            expected_therapist: 42,
            expected_organization: 43,
        },
        GoldenCase {
            id: "single-cent",
            subtotal: 1,
            commission: 15,
            shares: Some((60, 40)),
            expected_platform: 0,
            expected_therapist: 1,
            expected_organization: 0,
        },
    ]
}

#[test]
fn test_golden_cases() {
    for case in get_golden_cases() {
        let shares = case.shares.map(|(t, o)| LinkShares {
            therapist_percentage: t,
            organization_percentage: o,
        });
        let split = compute_split(case.subtotal, case.commission, shares)
            .unwrap_or_else(|e| panic!("case {} failed: {}", case.id, e));

        assert_eq!(split.platform_fee, case.expected_platform, "case {}", case.id);
        assert_eq!(
            split.therapist_amount, case.expected_therapist,
            "case {}",
            case.id
        );
        assert_eq!(
            split.organization_amount, case.expected_organization,
            "case {}",
            case.id
        );
        assert_eq!(split.total(), case.subtotal, "case {} leaks money", case.id);
    }
}

#[test]
fn test_out_of_range_commission_rejected_before_math() {
    let result = compute_split(10_000, 101, None);
    assert_eq!(result, Err(SplitError::CommissionOutOfRange(101)));
}

#[test]
fn test_recomputation_is_identical() {
    // Snapshotted inputs always reproduce the same split
    let shares = Some(LinkShares {
        therapist_percentage: 70,
        organization_percentage: 30,
    });
    let first = compute_split(123_457, 13, shares).unwrap();
    let second = compute_split(123_457, 13, shares).unwrap();
    assert_eq!(first, second);
}

proptest! {
    /// The core money invariant: no subtotal, commission, or share mix ever
    /// loses or duplicates a cent.
    #[test]
    fn prop_split_sum_invariant(
        subtotal in 0i64..=100_000_000,
        commission in 0u32..=100,
        therapist_share in 0u32..=100,
        with_organization in any::<bool>(),
    ) {
        let shares = if with_organization {
            Some(LinkShares {
                therapist_percentage: therapist_share,
                organization_percentage: 100 - therapist_share,
            })
        } else {
            None
        };

        let split = compute_split(subtotal, commission, shares).unwrap();
        prop_assert_eq!(split.total(), subtotal);
        prop_assert!(split.platform_fee >= 0);
        prop_assert!(split.therapist_amount >= 0);
        prop_assert!(split.organization_amount >= 0);
        if shares.is_none() {
            prop_assert_eq!(split.organization_amount, 0);
        }
    }

    /// Fee rounding never drifts more than one unit from the exact value.
    #[test]
    fn prop_fee_within_one_unit_of_exact(
        subtotal in 0i64..=100_000_000,
        commission in 0u32..=100,
    ) {
        let split = compute_split(subtotal, commission, None).unwrap();
        let exact_numerator = subtotal * i64::from(commission);
        let floor = exact_numerator / 100;
        prop_assert!(split.platform_fee == floor || split.platform_fee == floor + 1);
    }
}
