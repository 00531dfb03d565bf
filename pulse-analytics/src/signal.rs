//! Shared helpers for bounded [-1, 1] signals.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Floor applied to every ratio denominator.
pub const EPSILON: f64 = 1e-9;

/// Default symmetric classification boundary for bounded scores.
pub const DEFAULT_BAND_THRESHOLD: f64 = 0.2;

/// Clamp into [-1, 1]. Non-finite values collapse to 0.
pub fn bounded(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// `numerator / max(denominator, EPSILON)`.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    let denominator = if denominator.is_finite() {
        denominator.max(EPSILON)
    } else {
        EPSILON
    };
    numerator / denominator
}

/// Position of a bounded score relative to a [`SignalBand`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Band {
    Above,
    Within,
    Below,
}

/// Threshold pair used by every three-bucket classifier of a [-1, 1] score.
///
/// Momentum direction and the sentiment label both classify through this type so
/// the boundaries stay consistent unless a caller overrides one explicitly.
/// Comparisons are strict: a score exactly on a boundary is [`Band::Within`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct SignalBand {
    pub upper: f64,
    pub lower: f64,
}

impl Default for SignalBand {
    fn default() -> Self {
        Self::symmetric(DEFAULT_BAND_THRESHOLD)
    }
}

impl SignalBand {
    pub fn symmetric(threshold: f64) -> Self {
        Self {
            upper: threshold.abs(),
            lower: -threshold.abs(),
        }
    }

    pub fn classify(&self, score: f64) -> Band {
        if score > self.upper {
            Band::Above
        } else if score < self.lower {
            Band::Below
        } else {
            Band::Within
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = -1.0 <= self.lower && self.lower <= 0.0 && 0.0 <= self.upper && self.upper <= 1.0;
        if ordered {
            Ok(())
        } else {
            Err(ConfigError::InvalidBand {
                lower: self.lower,
                upper: self.upper,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        assert_eq!(bounded(3.0), 1.0);
        assert_eq!(bounded(-7.5), -1.0);
        assert_eq!(bounded(0.25), 0.25);
        assert_eq!(bounded(f64::NAN), 0.0);
        assert_eq!(bounded(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_safe_ratio_zero_denominator() {
        assert_eq!(safe_ratio(0.0, 0.0), 0.0);
        assert!(safe_ratio(1.0, 0.0).is_finite());
        assert_eq!(safe_ratio(1.0, 4.0), 0.25);
    }

    #[test]
    fn test_signal_band_classify() {
        struct TestCase {
            input: f64,
            expected: Band,
        }

        let band = SignalBand::default();
        let tests = vec![
            TestCase {
                // TC0: above upper bound
                input: 0.21,
                expected: Band::Above,
            },
            TestCase {
                // TC1: exactly on upper bound is within
                input: 0.2,
                expected: Band::Within,
            },
            TestCase {
                // TC2: zero is within
                input: 0.0,
                expected: Band::Within,
            },
            TestCase {
                // TC3: exactly on lower bound is within
                input: -0.2,
                expected: Band::Within,
            },
            TestCase {
                // TC4: below lower bound
                input: -0.5,
                expected: Band::Below,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(band.classify(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_signal_band_validate() {
        assert!(SignalBand::default().validate().is_ok());
        assert!(SignalBand { upper: -0.1, lower: 0.1 }.validate().is_err());
        assert!(SignalBand { upper: 1.5, lower: -0.2 }.validate().is_err());
    }
}
