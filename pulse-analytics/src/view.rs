//! Caller-owned analytics state for one market.

use crate::{
    book::{BookMetrics, compute_book_metrics, compute_depth_metrics},
    config::AnalyticsConfig,
    momentum::{ProcessedTrade, TradeMomentum, compute_momentum_with, process_window},
    reconcile::TradeTape,
    sentiment::{MarketSentiment, compose_sentiment_with},
    types::{OrderBook, RawTrade, Trade},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{debug, warn};

/// Scalar market context feeding the price and volume sentiment factors.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct MarketContext {
    pub current_price: f64,
    /// Reference price the change is measured against (eg/ 24h ago)
    pub previous_price: f64,
    pub volume_24h: f64,
    pub average_volume: f64,
}

impl MarketContext {
    /// Context carrying no price change or volume signal at `price`.
    pub fn neutral(price: f64) -> Self {
        Self {
            current_price: price,
            previous_price: price,
            volume_24h: 0.0,
            average_volume: 0.0,
        }
    }
}

/// One complete analytics snapshot of a market at `computed_at`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketPulse {
    pub market_id: SmolStr,
    pub computed_at: DateTime<Utc>,
    /// Reconciled tape, newest first
    pub trades: Vec<Trade>,
    /// Trades inside the momentum window with relative sizing
    pub processed: Vec<ProcessedTrade>,
    pub momentum: TradeMomentum,
    pub book: BookMetrics,
    pub sentiment: MarketSentiment,
    /// False when the window held no trades; momentum is then a placeholder
    pub has_trades: bool,
    /// False when no book levels were available; book metrics are then a placeholder
    pub has_book: bool,
    /// False when no market context has loaded; price and volume factors are then 0
    pub has_context: bool,
}

/// Convert boundary trades into strict [`Trade`]s, dropping and logging any
/// that fail validation.
///
/// Dropped trades never enter the tape, including trades whose side cannot be
/// resolved from a multi-outcome label.
pub fn ingest_trades<I>(raw: I) -> Vec<Trade>
where
    I: IntoIterator<Item = RawTrade>,
{
    raw.into_iter()
        .filter_map(|raw| match Trade::try_from(raw) {
            Ok(trade) => Some(trade),
            Err(error) => {
                warn!(%error, trade_id = ?error.trade_id(), "dropping malformed trade");
                None
            }
        })
        .collect()
}

/// Holds the trade tape, latest book and context for one market view.
///
/// Created when a view opens and dropped (or [`cleared`](Self::clear)) when it
/// closes. Every analytics output is recomputed from held data by
/// [`pulse`](Self::pulse).
#[derive(Debug, Clone)]
pub struct MarketView {
    market_id: SmolStr,
    config: AnalyticsConfig,
    tape: TradeTape,
    book: Option<OrderBook>,
    context: Option<MarketContext>,
    /// Latest streamed price, overriding the context's current price
    last_price: Option<f64>,
}

impl MarketView {
    pub fn new(market_id: impl Into<SmolStr>, config: AnalyticsConfig) -> Self {
        let tape = TradeTape::new(config.trade_cap, config.retention_secs);
        Self {
            market_id: market_id.into(),
            config,
            tape,
            book: None,
            context: None,
            last_price: None,
        }
    }

    pub fn market_id(&self) -> &SmolStr {
        &self.market_id
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Context the price and volume factors are computed from.
    ///
    /// Without a loaded context the reference price equals the latest price, so
    /// those factors stay neutral instead of reading a change from zero.
    pub fn context(&self) -> MarketContext {
        match self.context {
            Some(mut context) => {
                if let Some(price) = self.last_price {
                    context.current_price = price;
                }
                context
            }
            None => MarketContext::neutral(self.last_price.unwrap_or(0.0)),
        }
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn book(&self) -> Option<&OrderBook> {
        self.book.as_ref()
    }

    /// Replace the REST trade snapshot.
    pub fn apply_trade_snapshot(&mut self, raw: Vec<RawTrade>, now: DateTime<Utc>) {
        self.tape.apply_snapshot(ingest_trades(raw), now);
    }

    /// Add one streamed trade. Returns false if the trade was malformed.
    pub fn push_trade(&mut self, raw: RawTrade, now: DateTime<Utc>) -> bool {
        match ingest_trades([raw]).pop() {
            Some(trade) => {
                self.tape.push_stream(trade, now);
                true
            }
            None => false,
        }
    }

    /// Replace the held order book, discarding malformed levels.
    pub fn apply_book(&mut self, mut book: OrderBook) {
        let dropped = book.retain_valid();
        if dropped > 0 {
            warn!(market_id = %self.market_id, dropped, "dropped malformed book levels");
        }
        debug!(
            market_id = %self.market_id,
            sequence = ?book.sequence,
            "applying order book"
        );
        self.book = Some(book);
    }

    /// Latest traded or quoted price, leaving the reference price untouched.
    pub fn update_price(&mut self, price: f64) {
        if price.is_finite() {
            self.last_price = Some(price);
        }
    }

    /// Replace the held context; its current price supersedes earlier price updates.
    pub fn set_context(&mut self, context: MarketContext) {
        self.context = Some(context);
        self.last_price = None;
    }

    /// Trades not yet reported by a previous call.
    pub fn take_new_trades(&mut self) -> Vec<Trade> {
        self.tape.take_new()
    }

    pub fn trades(&self) -> &[Trade] {
        self.tape.trades()
    }

    /// Recompute every analytics output from held data at `now`.
    pub fn pulse(&self, now: DateTime<Utc>) -> MarketPulse {
        let trades = self.tape.trades();
        let processed = process_window(trades, &self.config.momentum, now);
        let momentum = compute_momentum_with(trades, &self.config.momentum, now);
        let book = self.book_metrics();
        let context = self.context();

        let sentiment = compose_sentiment_with(
            book.imbalance,
            &momentum,
            context.current_price,
            context.previous_price,
            context.volume_24h,
            context.average_volume,
            &self.config.sentiment,
        );

        MarketPulse {
            market_id: self.market_id.clone(),
            computed_at: now,
            trades: trades.to_vec(),
            processed,
            has_trades: !momentum.is_empty(),
            has_book: !book.is_empty(),
            has_context: self.has_context(),
            momentum,
            book,
            sentiment,
        }
    }

    /// Drop all held state.
    pub fn clear(&mut self) {
        self.tape.clear();
        self.book = None;
        self.context = None;
        self.last_price = None;
    }

    fn book_metrics(&self) -> BookMetrics {
        let Some(book) = &self.book else {
            return BookMetrics::default();
        };

        let (bids, asks) = book.side(self.config.book_side);
        match self.config.book_depth {
            Some(depth) => compute_depth_metrics(bids, asks, depth),
            None => compute_book_metrics(bids, asks),
        }
    }
}
