use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while converting upstream trade and book payloads into strict
/// analytics types.
///
/// The analytics themselves never fail: these errors only occur at the ingestion
/// boundary, where the offending record is dropped.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum IngestError {
    #[error("trade is missing an id")]
    MissingId,

    #[error("trade {id}: price {price} outside of [0, 1]")]
    PriceOutOfRange { id: SmolStr, price: Decimal },

    #[error("trade {id}: negative quantity {quantity}")]
    NegativeQuantity { id: SmolStr, quantity: Decimal },

    #[error("trade {id}: no side reported and outcome {outcome:?} does not imply one")]
    UnresolvableSide { id: SmolStr, outcome: Option<SmolStr> },

    #[error("order book level: price {price} outside of [0, 1]")]
    LevelPriceOutOfRange { price: Decimal },

    #[error("order book level at {price}: negative quantity {quantity}")]
    LevelNegativeQuantity { price: Decimal, quantity: Decimal },
}

impl IngestError {
    /// Trade id the error refers to, if any.
    pub fn trade_id(&self) -> Option<&str> {
        match self {
            IngestError::PriceOutOfRange { id, .. }
            | IngestError::NegativeQuantity { id, .. }
            | IngestError::UnresolvableSide { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Invalid analytics configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("momentum window must be at least one second")]
    ZeroWindow,

    #[error("whale threshold must be positive and finite, got {0}")]
    InvalidWhaleThreshold(f64),

    #[error("signal band must satisfy -1 <= lower <= 0 <= upper <= 1, got [{lower}, {upper}]")]
    InvalidBand { lower: f64, upper: f64 },

    #[error("acceleration factor must be >= 1, got {0}")]
    InvalidAccelerationFactor(f64),

    #[error("sentiment weight {name} must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("trade cap must be at least one")]
    ZeroTradeCap,

    #[error("failed to parse {key}={value}")]
    Env { key: String, value: String },

    #[error("failed to deserialise configuration: {0}")]
    Deserialise(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Deserialise(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ingest_error_trade_id() {
        struct TestCase {
            input: IngestError,
            expected: Option<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: missing id has no id to report
                input: IngestError::MissingId,
                expected: None,
            },
            TestCase {
                // TC1: price out of range reports trade id
                input: IngestError::PriceOutOfRange {
                    id: SmolStr::new("t-1"),
                    price: dec!(1.2),
                },
                expected: Some("t-1"),
            },
            TestCase {
                // TC2: unresolvable side reports trade id
                input: IngestError::UnresolvableSide {
                    id: SmolStr::new("t-2"),
                    outcome: Some(SmolStr::new("Trump")),
                },
                expected: Some("t-2"),
            },
            TestCase {
                // TC3: book level errors are not trade scoped
                input: IngestError::LevelNegativeQuantity {
                    price: dec!(0.4),
                    quantity: dec!(-1),
                },
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.trade_id(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::ZeroWindow.to_string(),
            "momentum window must be at least one second"
        );
        assert_eq!(
            ConfigError::Env {
                key: "PULSE_WINDOW_SECS".to_string(),
                value: "abc".to_string()
            }
            .to_string(),
            "failed to parse PULSE_WINDOW_SECS=abc"
        );
    }
}
