//! Engine configuration
//!
//! [`EngineConfig`] carries every tunable the engine consults: minimum score,
//! repayment and grace periods, pool caps, and the score adjustment curve.
//! It deserializes from the `engine` section of a world file; missing fields
//! fall back to the defaults below.
//!
//! # Adjustment curve
//!
//! The curve maps a credit score to the fraction of the borrower's credit
//! limit that may actually be used. It is configuration data, not a formula:
//! a list of control points, linearly interpolated in between.

use crate::types::{CreditError, ProductId, Score, Timestamp, MAX_SCORE};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const DAY: Timestamp = 86_400;

/// One control point of the adjustment curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub score: Score,
    /// Usable fraction of the credit limit at this score (0..=1)
    pub fraction: Decimal,
}

impl CurvePoint {
    pub const fn new(score: Score, fraction: Decimal) -> Self {
        CurvePoint { score, fraction }
    }
}

/// Monotonic score → usable-fraction lookup with linear interpolation
///
/// Always starts at (0, 0%) and ends at (255, 100%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CurvePoint>", into = "Vec<CurvePoint>")]
pub struct AdjustmentCurve {
    points: Vec<CurvePoint>,
}

impl AdjustmentCurve {
    /// Build a curve from control points
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the points do not start at (0, 0), end at
    /// (255, 1), strictly increase in score, or ever decrease in fraction.
    pub fn new(points: Vec<CurvePoint>) -> Result<Self, CreditError> {
        let first = points
            .first()
            .ok_or_else(|| CreditError::invalid_config("adjustment curve has no points"))?;
        let last = points[points.len() - 1];

        if first.score != 0 || !first.fraction.is_zero() {
            return Err(CreditError::invalid_config(
                "adjustment curve must start at score 0 with fraction 0",
            ));
        }
        if last.score != MAX_SCORE || last.fraction != Decimal::ONE {
            return Err(CreditError::invalid_config(
                "adjustment curve must end at score 255 with fraction 1",
            ));
        }
        for pair in points.windows(2) {
            if pair[1].score <= pair[0].score {
                return Err(CreditError::invalid_config(format!(
                    "adjustment curve scores must increase (saw {} after {})",
                    pair[1].score, pair[0].score
                )));
            }
            if pair[1].fraction < pair[0].fraction {
                return Err(CreditError::invalid_config(format!(
                    "adjustment curve decreases between scores {} and {}",
                    pair[0].score, pair[1].score
                )));
            }
        }

        Ok(AdjustmentCurve { points })
    }

    /// Usable fraction of the credit limit at `score`
    pub fn fraction(&self, score: Score) -> Decimal {
        let idx = self.points.partition_point(|p| p.score < score);
        let hi = self.points[idx];
        if hi.score == score || idx == 0 {
            return hi.fraction;
        }
        let lo = self.points[idx - 1];

        let span = Decimal::from(hi.score - lo.score);
        let offset = Decimal::from(score - lo.score);
        lo.fraction + (hi.fraction - lo.fraction) * offset / span
    }

    /// Control points in score order
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }
}

impl TryFrom<Vec<CurvePoint>> for AdjustmentCurve {
    type Error = CreditError;

    fn try_from(points: Vec<CurvePoint>) -> Result<Self, Self::Error> {
        AdjustmentCurve::new(points)
    }
}

impl From<AdjustmentCurve> for Vec<CurvePoint> {
    fn from(curve: AdjustmentCurve) -> Self {
        curve.points
    }
}

impl Default for AdjustmentCurve {
    fn default() -> Self {
        AdjustmentCurve {
            points: vec![
                CurvePoint::new(0, dec!(0)),
                CurvePoint::new(1, dec!(0.0156)),
                CurvePoint::new(31, dec!(0.2058)),
                CurvePoint::new(63, dec!(0.3504)),
                CurvePoint::new(95, dec!(0.4768)),
                CurvePoint::new(127, dec!(0.5928)),
                CurvePoint::new(159, dec!(0.7016)),
                CurvePoint::new(191, dec!(0.8051)),
                CurvePoint::new(223, dec!(0.9043)),
                CurvePoint::new(255, dec!(1)),
            ],
        }
    }
}

/// Tunable engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identity this engine uses when holding a borrower's exclusivity lock
    pub product_id: ProductId,

    /// Lowest score allowed to borrow
    pub min_score: Score,

    /// Seconds between required interest payments
    pub interest_repayment_period: Timestamp,

    /// Seconds past a missed interest deadline before default is allowed
    pub overdue_grace_period: Timestamp,

    /// Seconds a position may stay over its limit before default is allowed
    pub limit_grace_period: Timestamp,

    /// Fraction of a pool's value one borrower may owe it
    pub single_pool_cap: Decimal,

    /// Fraction of all supported pools' value that may be lent out in total
    pub aggregate_cap: Decimal,

    /// Score → usable fraction of the credit limit
    pub adjustment_curve: AdjustmentCurve,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            product_id: 1,
            min_score: 1,
            interest_repayment_period: 30 * DAY,
            overdue_grace_period: 5 * DAY,
            limit_grace_period: 3 * DAY,
            single_pool_cap: dec!(0.10),
            aggregate_cap: dec!(0.50),
            adjustment_curve: AdjustmentCurve::default(),
        }
    }
}

impl EngineConfig {
    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), CreditError> {
        if self.interest_repayment_period == 0 {
            return Err(CreditError::invalid_config(
                "interest_repayment_period must be positive",
            ));
        }
        for (name, cap) in [
            ("single_pool_cap", self.single_pool_cap),
            ("aggregate_cap", self.aggregate_cap),
        ] {
            if cap.is_sign_negative() || cap > Decimal::ONE {
                return Err(CreditError::invalid_config(format!(
                    "{} must be within [0, 1], got {}",
                    name, cap
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(255, dec!(1))]
    #[case(223, dec!(0.9043))]
    #[case(191, dec!(0.8051))]
    #[case(159, dec!(0.7016))]
    #[case(127, dec!(0.5928))]
    #[case(95, dec!(0.4768))]
    #[case(63, dec!(0.3504))]
    #[case(31, dec!(0.2058))]
    #[case(1, dec!(0.0156))]
    #[case(0, dec!(0))]
    fn test_default_curve_sample_table(#[case] score: Score, #[case] expected: Decimal) {
        assert_eq!(AdjustmentCurve::default().fraction(score), expected);
    }

    #[test]
    fn test_default_curve_is_monotonic() {
        let curve = AdjustmentCurve::default();
        let mut previous = curve.fraction(0);
        for score in 1..=MAX_SCORE {
            let current = curve.fraction(score);
            assert!(current >= previous, "curve decreased at score {}", score);
            previous = current;
        }
    }

    #[test]
    fn test_curve_interpolates_linearly() {
        let curve = AdjustmentCurve::new(vec![
            CurvePoint::new(0, dec!(0)),
            CurvePoint::new(255, dec!(1)),
        ])
        .unwrap();
        assert_eq!(curve.fraction(51), dec!(0.2));
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::bad_start(vec![CurvePoint::new(1, dec!(0)), CurvePoint::new(255, dec!(1))])]
    #[case::bad_end(vec![CurvePoint::new(0, dec!(0)), CurvePoint::new(255, dec!(0.9))])]
    #[case::decreasing(vec![
        CurvePoint::new(0, dec!(0)),
        CurvePoint::new(100, dec!(0.6)),
        CurvePoint::new(200, dec!(0.5)),
        CurvePoint::new(255, dec!(1)),
    ])]
    #[case::duplicate_score(vec![
        CurvePoint::new(0, dec!(0)),
        CurvePoint::new(100, dec!(0.5)),
        CurvePoint::new(100, dec!(0.6)),
        CurvePoint::new(255, dec!(1)),
    ])]
    fn test_invalid_curves(#[case] points: Vec<CurvePoint>) {
        assert!(matches!(
            AdjustmentCurve::new(points),
            Err(CreditError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: EngineConfig = serde_json::from_str(r#"{ "min_score": 40 }"#).unwrap();
        assert_eq!(config.min_score, 40);
        assert_eq!(config.interest_repayment_period, 30 * DAY);
        assert_eq!(config.adjustment_curve, AdjustmentCurve::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_invalid_curve_in_json() {
        let json = r#"{ "adjustment_curve": [ { "score": 0, "fraction": "0" } ] }"#;
        assert!(serde_json::from_str::<EngineConfig>(json).is_err());
    }

    #[rstest]
    #[case::zero_period(EngineConfig { interest_repayment_period: 0, ..EngineConfig::default() })]
    #[case::negative_cap(EngineConfig { single_pool_cap: dec!(-0.1), ..EngineConfig::default() })]
    #[case::cap_above_one(EngineConfig { aggregate_cap: dec!(1.5), ..EngineConfig::default() })]
    fn test_validate_rejects(#[case] config: EngineConfig) {
        assert!(config.validate().is_err());
    }
}
