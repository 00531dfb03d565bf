//! Spread, depth and imbalance for one side of a binary market's book.

use crate::{
    signal::{bounded, safe_ratio},
    types::OrderBookLevel,
};
use itertools::Itertools;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

/// Top-of-book and depth summary.
///
/// `spread` and `mid` are `None` unless both sides have at least one level. A
/// one-sided book has no spread; it is never reported as zero.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct BookMetrics {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub mid: Option<Decimal>,
    /// Σ bid quantity over the levels considered
    pub bid_depth: f64,
    /// Σ ask quantity over the levels considered
    pub ask_depth: f64,
    /// (bid_depth - ask_depth) / total, in [-1, 1]
    pub imbalance: f64,
}

impl BookMetrics {
    /// True if neither side had any level.
    pub fn is_empty(&self) -> bool {
        self.best_bid.is_none() && self.best_ask.is_none()
    }

    /// Calculate spread as a percentage of mid price
    pub fn spread_percentage(&self) -> Option<f64> {
        let spread = self.spread?;
        let mid = self.mid?;

        if mid > Decimal::ZERO {
            ((spread / mid) * Decimal::ONE_HUNDRED).to_f64()
        } else {
            None
        }
    }

    /// Bid share of total depth as a percentage (50 when the book is empty).
    pub fn bid_pressure_pct(&self) -> f64 {
        let total = self.bid_depth + self.ask_depth;
        if total > 0.0 {
            self.bid_depth / total * 100.0
        } else {
            50.0
        }
    }
}

/// Metrics over every level on both sides. Level ordering is irrelevant.
pub fn compute_book_metrics(bids: &[OrderBookLevel], asks: &[OrderBookLevel]) -> BookMetrics {
    metrics_over(bids.iter(), asks.iter(), best_bid(bids), best_ask(asks))
}

/// Metrics with depth restricted to the best `depth` levels per side.
///
/// Best bid, best ask, spread and mid are unaffected by `depth`.
pub fn compute_depth_metrics(
    bids: &[OrderBookLevel],
    asks: &[OrderBookLevel],
    depth: usize,
) -> BookMetrics {
    let top_bids = bids
        .iter()
        .sorted_by(|a, b| b.price.cmp(&a.price))
        .take(depth);
    let top_asks = asks
        .iter()
        .sorted_by(|a, b| a.price.cmp(&b.price))
        .take(depth);

    metrics_over(top_bids, top_asks, best_bid(bids), best_ask(asks))
}

fn best_bid(bids: &[OrderBookLevel]) -> Option<Decimal> {
    bids.iter().map(|level| level.price).max()
}

fn best_ask(asks: &[OrderBookLevel]) -> Option<Decimal> {
    asks.iter().map(|level| level.price).min()
}

fn metrics_over<'a>(
    bids: impl Iterator<Item = &'a OrderBookLevel>,
    asks: impl Iterator<Item = &'a OrderBookLevel>,
    best_bid: Option<Decimal>,
    best_ask: Option<Decimal>,
) -> BookMetrics {
    let bid_depth: f64 = bids.map(OrderBookLevel::quantity_f64).sum();
    let ask_depth: f64 = asks.map(OrderBookLevel::quantity_f64).sum();

    let (spread, mid) = match (best_bid, best_ask) {
        (Some(bid), Some(ask)) => (Some(ask - bid), Some((bid + ask) / Decimal::from(2))),
        _ => (None, None),
    };

    BookMetrics {
        best_bid,
        best_ask,
        spread,
        mid,
        bid_depth,
        ask_depth,
        imbalance: bounded(safe_ratio(bid_depth - ask_depth, bid_depth + ask_depth)),
    }
}
