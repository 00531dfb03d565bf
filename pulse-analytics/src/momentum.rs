//! Sliding-window trade momentum.
//!
//! Every call is a fresh reduction over the trades inside the look-back window at
//! the supplied `now`; no accumulator state is carried between calls, so calling
//! twice with the same inputs yields identical output.

use crate::{
    config::{MomentumConfig, ReferenceQuantity},
    signal::{Band, bounded, safe_ratio},
    types::{Side, Trade},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Net direction of trade flow in the window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    Buy,
    Sell,
    #[default]
    Neutral,
}

impl From<Band> for FlowDirection {
    fn from(band: Band) -> Self {
        match band {
            Band::Above => FlowDirection::Buy,
            Band::Below => FlowDirection::Sell,
            Band::Within => FlowDirection::Neutral,
        }
    }
}

/// Trade enriched with its size relative to the window's reference quantity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProcessedTrade {
    pub trade: Trade,
    pub relative_size: f64,
    pub is_whale: bool,
}

/// Buy/sell notional for a single outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct OutcomeFlow {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_count: usize,
    pub sell_count: usize,
}

impl OutcomeFlow {
    pub fn total_volume(&self) -> f64 {
        self.buy_volume + self.sell_volume
    }

    pub fn net_volume(&self) -> f64 {
        self.buy_volume - self.sell_volume
    }

    fn add(&mut self, side: Side, notional: f64) {
        match side {
            Side::Buy => {
                self.buy_volume += notional;
                self.buy_count += 1;
            }
            Side::Sell => {
                self.sell_volume += notional;
                self.sell_count += 1;
            }
        }
    }
}

/// Snapshot summarising every trade inside the look-back window at one instant.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TradeMomentum {
    pub window_secs: u32,
    /// Σ price x quantity over buys
    pub buy_volume: f64,
    /// Σ price x quantity over sells
    pub sell_volume: f64,
    pub net_volume: f64,
    pub buy_count: usize,
    pub sell_count: usize,
    pub trade_count: usize,
    /// Net flow over total flow, in [-1, 1]
    pub momentum_ratio: f64,
    pub direction: FlowDirection,
    /// Trades per minute over the whole window
    pub velocity: f64,
    /// Trades per minute over the most recent half of the window
    pub recent_velocity: f64,
    pub is_accelerating: bool,
    pub has_whale: bool,
    pub whale_count: usize,
    /// Median or mean in-window quantity used for relative sizing
    pub reference_quantity: f64,
    /// Flow broken down per outcome label
    pub outcomes: BTreeMap<SmolStr, OutcomeFlow>,
}

impl TradeMomentum {
    /// Neutral "no activity" snapshot.
    pub fn empty(window_secs: u32) -> Self {
        Self {
            window_secs,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trade_count == 0
    }

    /// Buy share of total notional as a percentage (50 when there is no flow).
    pub fn buy_pressure_pct(&self) -> f64 {
        let total = self.buy_volume + self.sell_volume;
        if total > 0.0 {
            self.buy_volume / total * 100.0
        } else {
            50.0
        }
    }

    /// Outcome with the most notional traded in the window. Ties go to the
    /// lexicographically smaller label.
    pub fn leading_outcome(&self) -> Option<(&SmolStr, &OutcomeFlow)> {
        self.outcomes.iter().max_by(|a, b| {
            a.1.total_volume()
                .total_cmp(&b.1.total_volume())
                .then_with(|| b.0.cmp(a.0))
        })
    }
}

/// Momentum over `window_secs` with default thresholds.
pub fn compute_momentum(
    trades: &[Trade],
    window_secs: u32,
    whale_threshold: f64,
    now: DateTime<Utc>,
) -> TradeMomentum {
    compute_momentum_with(trades, &MomentumConfig::new(window_secs, whale_threshold), now)
}

/// Momentum over the configured window.
pub fn compute_momentum_with(
    trades: &[Trade],
    config: &MomentumConfig,
    now: DateTime<Utc>,
) -> TradeMomentum {
    let processed = process_window(trades, config, now);
    if processed.is_empty() {
        return TradeMomentum::empty(config.window_secs);
    }

    let mut momentum = TradeMomentum::empty(config.window_secs);
    momentum.trade_count = processed.len();
    momentum.reference_quantity = reference_of(&processed, config.reference);

    let midpoint = now - ChronoDuration::milliseconds(i64::from(config.window_secs) * 500);
    let mut recent_count = 0usize;

    for ProcessedTrade { trade, is_whale, .. } in &processed {
        let notional = trade.notional();
        match trade.side {
            Side::Buy => {
                momentum.buy_volume += notional;
                momentum.buy_count += 1;
            }
            Side::Sell => {
                momentum.sell_volume += notional;
                momentum.sell_count += 1;
            }
        }

        momentum
            .outcomes
            .entry(trade.outcome.clone())
            .or_default()
            .add(trade.side, notional);

        if *is_whale {
            momentum.whale_count += 1;
        }
        if trade.timestamp >= midpoint {
            recent_count += 1;
        }
    }

    momentum.net_volume = momentum.buy_volume - momentum.sell_volume;
    momentum.momentum_ratio = bounded(safe_ratio(
        momentum.net_volume,
        momentum.buy_volume + momentum.sell_volume,
    ));
    momentum.direction = FlowDirection::from(config.band.classify(momentum.momentum_ratio));
    momentum.has_whale = momentum.whale_count > 0;

    let window_mins = f64::from(config.window_secs) / 60.0;
    let half_mins = window_mins / 2.0;
    momentum.velocity = safe_ratio(momentum.trade_count as f64, window_mins);
    momentum.recent_velocity = safe_ratio(recent_count as f64, half_mins);

    // Too few trades to split meaningfully
    if momentum.trade_count >= config.min_trades_for_acceleration {
        let older_count = momentum.trade_count - recent_count;
        let older_velocity = safe_ratio(older_count as f64, half_mins);
        momentum.is_accelerating =
            momentum.recent_velocity > older_velocity * config.acceleration_factor;
    }

    momentum
}

/// Trades inside the window at `now`, each sized relative to the window's
/// reference quantity, in input order.
///
/// The reference is taken from the same set being classified, so a single large
/// trade in a sparse window raises the reference and can suppress its own whale
/// flag.
pub fn process_window(
    trades: &[Trade],
    config: &MomentumConfig,
    now: DateTime<Utc>,
) -> Vec<ProcessedTrade> {
    let cutoff = now - ChronoDuration::seconds(i64::from(config.window_secs));
    let in_window: Vec<&Trade> = trades
        .iter()
        .filter(|trade| trade.timestamp >= cutoff)
        .collect();

    let quantities: Vec<f64> = in_window.iter().map(|trade| trade.quantity_f64()).collect();
    let reference = reference_quantity(&quantities, config.reference);

    in_window
        .into_iter()
        .map(|trade| {
            let relative_size = safe_ratio(trade.quantity_f64(), reference);
            ProcessedTrade {
                trade: trade.clone(),
                relative_size,
                is_whale: relative_size >= config.whale_threshold,
            }
        })
        .collect()
}

/// Median or mean of `quantities`; 0 when empty.
pub fn reference_quantity(quantities: &[f64], method: ReferenceQuantity) -> f64 {
    if quantities.is_empty() {
        return 0.0;
    }

    match method {
        ReferenceQuantity::Mean => quantities.iter().sum::<f64>() / quantities.len() as f64,
        ReferenceQuantity::Median => {
            let sorted = quantities
                .iter()
                .copied()
                .sorted_by(|a, b| a.total_cmp(b))
                .collect::<Vec<_>>();
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
    }
}

fn reference_of(processed: &[ProcessedTrade], method: ReferenceQuantity) -> f64 {
    let quantities: Vec<f64> = processed
        .iter()
        .map(|processed| processed.trade.quantity_f64())
        .collect();
    reference_quantity(&quantities, method)
}
