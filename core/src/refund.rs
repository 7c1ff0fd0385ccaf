//! Cancellation refund policy.
//!
//! A pure, table-driven function from "time left until departure" to a refund
//! percentage. Tier bounds are exclusive: a tier applies when the remaining
//! time is strictly greater than its bound.

use crate::types::Money;
use chrono::Duration;
use serde::Serialize;

/// One bracket of the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefundTier {
    /// Applies when more than this many hours remain
    pub min_hours_exclusive: i64,
    /// Percentage of the total refunded (0..=100)
    pub percentage: u8,
}

/// Ordered refund tiers plus the percentage used below the lowest tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefundPolicy {
    tiers: Vec<RefundTier>,
    floor: u8,
}

/// Refund computed for one cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundQuote {
    /// Percentage applied
    pub refund_percentage: u8,
    /// Amount refunded, rounded down to the minor unit
    pub refund_amount: Money,
    /// Hours between now and departure (negative once departed)
    pub hours_until_departure: f64,
}

impl RefundPolicy {
    /// Builds a policy. Tiers are sorted by bound, highest first.
    #[must_use]
    pub fn new(mut tiers: Vec<RefundTier>, floor: u8) -> Self {
        tiers.sort_by(|a, b| b.min_hours_exclusive.cmp(&a.min_hours_exclusive));
        Self {
            tiers,
            floor: floor.min(100),
        }
    }

    /// Full refund beyond 24 hours, half beyond 2 hours, nothing after that.
    #[must_use]
    pub fn coarse() -> Self {
        Self::new(
            vec![
                RefundTier {
                    min_hours_exclusive: 24,
                    percentage: 100,
                },
                RefundTier {
                    min_hours_exclusive: 2,
                    percentage: 50,
                },
            ],
            0,
        )
    }

    /// Percentage refunded when `until_departure` remains.
    ///
    /// Negative durations (cancelling after departure) fall to the floor.
    #[must_use]
    pub fn percentage_for(&self, until_departure: Duration) -> u8 {
        self.tiers
            .iter()
            .find(|tier| until_departure > Duration::hours(tier.min_hours_exclusive))
            .map_or(self.floor, |tier| tier.percentage.min(100))
    }

    /// Computes the refund on `total` when `until_departure` remains.
    #[must_use]
    pub fn quote(&self, total: Money, until_departure: Duration) -> RefundQuote {
        let refund_percentage = self.percentage_for(until_departure);
        #[allow(clippy::cast_precision_loss)]
        let hours_until_departure = until_departure.num_seconds() as f64 / 3600.0;
        RefundQuote {
            refund_percentage,
            refund_amount: total.percent(refund_percentage),
            hours_until_departure,
        }
    }
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self::coarse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn coarse_tiers() {
        let policy = RefundPolicy::coarse();
        assert_eq!(policy.percentage_for(Duration::hours(30)), 100);
        assert_eq!(policy.percentage_for(Duration::hours(10)), 50);
        assert_eq!(policy.percentage_for(Duration::hours(1)), 0);
        assert_eq!(policy.percentage_for(Duration::hours(-5)), 0);
    }

    #[test]
    fn bounds_are_exclusive() {
        let policy = RefundPolicy::coarse();
        assert_eq!(policy.percentage_for(Duration::hours(24)), 50);
        assert_eq!(
            policy.percentage_for(Duration::hours(24) + Duration::seconds(1)),
            100
        );
        assert_eq!(policy.percentage_for(Duration::hours(2)), 0);
    }

    #[test]
    fn quote_rounds_down() {
        let quote = RefundPolicy::coarse().quote(Money::from_minor(999), Duration::hours(3));
        assert_eq!(quote.refund_percentage, 50);
        assert_eq!(quote.refund_amount, Money::from_minor(499));
        assert!((quote.hours_until_departure - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn thirty_hours_out_refunds_everything() {
        let quote = RefundPolicy::coarse().quote(Money::from_minor(1000), Duration::hours(30));
        assert_eq!(quote.refund_amount, Money::from_minor(1000));
    }

    #[test]
    fn fine_grained_policy_can_be_expressed() {
        let policy = RefundPolicy::new(
            vec![
                RefundTier { min_hours_exclusive: 6, percentage: 50 },
                RefundTier { min_hours_exclusive: 24, percentage: 90 },
                RefundTier { min_hours_exclusive: 12, percentage: 70 },
            ],
            20,
        );
        assert_eq!(policy.percentage_for(Duration::hours(48)), 90);
        assert_eq!(policy.percentage_for(Duration::hours(13)), 70);
        assert_eq!(policy.percentage_for(Duration::hours(7)), 50);
        assert_eq!(policy.percentage_for(Duration::hours(6)), 20);
    }

    proptest! {
        #[test]
        fn refund_never_grows_as_departure_nears(a in -200_000i64..200_000, b in -200_000i64..200_000) {
            let policy = RefundPolicy::coarse();
            let (sooner, later) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                policy.percentage_for(Duration::minutes(sooner))
                    <= policy.percentage_for(Duration::minutes(later))
            );
        }

        #[test]
        fn refund_never_exceeds_total(total in 0u64..10_000_000, minutes in -10_000i64..10_000) {
            let quote = RefundPolicy::coarse().quote(Money::from_minor(total), Duration::minutes(minutes));
            prop_assert!(quote.refund_amount.minor() <= total);
        }
    }
}
