//! Composite market sentiment from price, flow, book and volume signals.

use crate::{
    config::SentimentConfig,
    momentum::TradeMomentum,
    signal::{Band, bounded, safe_ratio},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl From<Band> for SentimentLabel {
    fn from(band: Band) -> Self {
        match band {
            Band::Above => SentimentLabel::Bullish,
            Band::Below => SentimentLabel::Bearish,
            Band::Within => SentimentLabel::Neutral,
        }
    }
}

/// Individual signals feeding the composite, each in [-1, 1].
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SentimentFactors {
    /// Relative price change against the previous price
    pub price: f64,
    /// Trade flow momentum ratio
    pub momentum: f64,
    /// Order book imbalance
    pub book: f64,
    /// Volume relative to average; scales confidence, not direction
    pub volume: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct MarketSentiment {
    pub score: f64,
    pub label: SentimentLabel,
    /// (1 + volume) / 2, in [0, 1]
    pub confidence: f64,
    pub factors: SentimentFactors,
}

/// Sentiment with default weights and band.
pub fn compose_sentiment(
    book_imbalance: f64,
    momentum: &TradeMomentum,
    current_price: f64,
    previous_price: f64,
    volume_24h: f64,
    average_volume: f64,
) -> MarketSentiment {
    compose_sentiment_with(
        book_imbalance,
        momentum,
        current_price,
        previous_price,
        volume_24h,
        average_volume,
        &SentimentConfig::default(),
    )
}

/// Weighted average of the price, momentum and book signals, damped by volume
/// confidence and clamped to [-1, 1].
pub fn compose_sentiment_with(
    book_imbalance: f64,
    momentum: &TradeMomentum,
    current_price: f64,
    previous_price: f64,
    volume_24h: f64,
    average_volume: f64,
    config: &SentimentConfig,
) -> MarketSentiment {
    let factors = SentimentFactors {
        price: bounded(safe_ratio(current_price - previous_price, previous_price)),
        momentum: bounded(momentum.momentum_ratio),
        book: bounded(book_imbalance),
        volume: bounded(safe_ratio(volume_24h - average_volume, average_volume)),
    };

    let weights = config.weights.normalised();
    let directional = factors.price * weights.price
        + factors.momentum * weights.momentum
        + factors.book * weights.book;

    let confidence = (1.0 + factors.volume) / 2.0;
    let score = bounded(directional * confidence);

    MarketSentiment {
        score,
        label: SentimentLabel::from(config.band.classify(score)),
        confidence,
        factors,
    }
}
