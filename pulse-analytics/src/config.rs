//! Analytics configuration.
//!
//! Every tunable has a default. Overrides can come from JSON (see
//! [`AnalyticsConfig::from_json`]) or from `PULSE_*` environment variables (see
//! [`AnalyticsConfig::from_env`]).

use crate::{
    error::ConfigError,
    signal::{DEFAULT_BAND_THRESHOLD, SignalBand},
    types::BookSide,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default momentum look-back window (5 minutes).
pub const DEFAULT_WINDOW_SECS: u32 = 300;
/// Default relative-size cutoff for whale detection.
pub const DEFAULT_WHALE_THRESHOLD: f64 = 3.0;
/// Default recent/older half rate ratio that counts as accelerating.
pub const DEFAULT_ACCELERATION_FACTOR: f64 = 1.5;
/// Windows with fewer trades never report acceleration.
pub const DEFAULT_MIN_TRADES_FOR_ACCELERATION: usize = 4;
/// Default display cap for the reconciled tape.
pub const DEFAULT_TRADE_CAP: usize = 200;
/// Default retention for streamed trades (1 hour).
pub const DEFAULT_RETENTION_SECS: u32 = 60 * 60;

/// How the per-window reference quantity for relative sizing is derived.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceQuantity {
    #[default]
    Median,
    Mean,
}

impl FromStr for ReferenceQuantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "median" => Ok(ReferenceQuantity::Median),
            "mean" | "avg" | "average" => Ok(ReferenceQuantity::Mean),
            _ => Err(format!("unknown reference quantity: {}", s)),
        }
    }
}

/// Momentum aggregator configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Look-back window in seconds
    pub window_secs: u32,
    /// Relative size at or above which a trade is a whale
    pub whale_threshold: f64,
    pub reference: ReferenceQuantity,
    /// Direction classification band
    pub band: SignalBand,
    pub acceleration_factor: f64,
    pub min_trades_for_acceleration: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            whale_threshold: DEFAULT_WHALE_THRESHOLD,
            reference: ReferenceQuantity::default(),
            band: SignalBand::default(),
            acceleration_factor: DEFAULT_ACCELERATION_FACTOR,
            min_trades_for_acceleration: DEFAULT_MIN_TRADES_FOR_ACCELERATION,
        }
    }
}

impl MomentumConfig {
    pub fn new(window_secs: u32, whale_threshold: f64) -> Self {
        Self {
            window_secs,
            whale_threshold,
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: ReferenceQuantity) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_band(mut self, band: SignalBand) -> Self {
        self.band = band;
        self
    }

    pub fn with_acceleration_factor(mut self, factor: f64) -> Self {
        self.acceleration_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if !self.whale_threshold.is_finite() || self.whale_threshold <= 0.0 {
            return Err(ConfigError::InvalidWhaleThreshold(self.whale_threshold));
        }
        if !self.acceleration_factor.is_finite() || self.acceleration_factor < 1.0 {
            return Err(ConfigError::InvalidAccelerationFactor(
                self.acceleration_factor,
            ));
        }
        self.band.validate()
    }
}

/// Composite weights for the directional sentiment signals.
///
/// Weights are normalised by their sum when composing, so only their ratios
/// matter. All-zero weights fall back to equal thirds.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SentimentWeights {
    pub price: f64,
    pub momentum: f64,
    pub book: f64,
}

impl Default for SentimentWeights {
    fn default() -> Self {
        Self {
            price: 1.0 / 3.0,
            momentum: 1.0 / 3.0,
            book: 1.0 / 3.0,
        }
    }
}

impl SentimentWeights {
    /// Weights scaled to sum to one.
    pub fn normalised(&self) -> Self {
        let total = self.price + self.momentum + self.book;
        if !total.is_finite() || total <= 0.0 {
            return Self::default();
        }
        Self {
            price: self.price / total,
            momentum: self.momentum / total,
            book: self.book / total,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("price", self.price),
            ("momentum", self.momentum),
            ("book", self.book),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

/// Sentiment composer configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub weights: SentimentWeights,
    /// Label classification band
    pub band: SignalBand,
}

impl SentimentConfig {
    pub fn with_weights(mut self, weights: SentimentWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.band.validate()
    }
}

/// Full configuration for one market view.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub momentum: MomentumConfig,
    pub sentiment: SentimentConfig,
    /// Maximum trades retained in the reconciled tape
    pub trade_cap: usize,
    /// Streamed trades older than this are discarded
    pub retention_secs: u32,
    /// Restrict book depth sums to the best N levels per side (None = all)
    pub book_depth: Option<usize>,
    /// Outcome token whose book feeds the sentiment signal
    pub book_side: BookSide,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            momentum: MomentumConfig::default(),
            sentiment: SentimentConfig::default(),
            trade_cap: DEFAULT_TRADE_CAP,
            retention_secs: DEFAULT_RETENTION_SECS,
            book_depth: None,
            book_side: BookSide::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Apply the same classification band to momentum direction and sentiment label.
    pub fn with_band(mut self, band: SignalBand) -> Self {
        self.momentum.band = band;
        self.sentiment.band = band;
        self
    }

    pub fn with_momentum(mut self, momentum: MomentumConfig) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_sentiment(mut self, sentiment: SentimentConfig) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_trade_cap(mut self, cap: usize) -> Self {
        self.trade_cap = cap;
        self
    }

    pub fn with_book_depth(mut self, depth: Option<usize>) -> Self {
        self.book_depth = depth;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trade_cap == 0 {
            return Err(ConfigError::ZeroTradeCap);
        }
        self.momentum.validate()?;
        self.sentiment.validate()
    }

    /// Parse and validate a (possibly partial) JSON configuration.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `PULSE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`, keyed by `PULSE_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(window) = parse_var(&lookup, "PULSE_WINDOW_SECS")? {
            config.momentum.window_secs = window;
        }
        if let Some(threshold) = parse_var(&lookup, "PULSE_WHALE_THRESHOLD")? {
            config.momentum.whale_threshold = threshold;
        }
        if let Some(reference) = parse_var(&lookup, "PULSE_REFERENCE_QUANTITY")? {
            config.momentum.reference = reference;
        }
        if let Some(factor) = parse_var(&lookup, "PULSE_ACCELERATION_FACTOR")? {
            config.momentum.acceleration_factor = factor;
        }
        if let Some(threshold) = parse_var::<f64, _>(&lookup, "PULSE_BAND_THRESHOLD")? {
            config = config.with_band(SignalBand::symmetric(threshold));
        }
        if let Some(weight) = parse_var(&lookup, "PULSE_WEIGHT_PRICE")? {
            config.sentiment.weights.price = weight;
        }
        if let Some(weight) = parse_var(&lookup, "PULSE_WEIGHT_MOMENTUM")? {
            config.sentiment.weights.momentum = weight;
        }
        if let Some(weight) = parse_var(&lookup, "PULSE_WEIGHT_BOOK")? {
            config.sentiment.weights.book = weight;
        }
        if let Some(cap) = parse_var(&lookup, "PULSE_TRADE_CAP")? {
            config.trade_cap = cap;
        }
        if let Some(retention) = parse_var(&lookup, "PULSE_RETENTION_SECS")? {
            config.retention_secs = retention;
        }
        if let Some(depth) = parse_var(&lookup, "PULSE_BOOK_DEPTH")? {
            config.book_depth = Some(depth);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env {
                key: key.to_string(),
                value,
            }),
    }
}
