//! Pulse Analytics - prediction market microstructure analytics
//!
//! Turns raw trade and order book data for a single market into:
//! - a deduplicated, newest-first trade tape merged from a REST snapshot and a
//!   live stream ([`reconcile`], [`TradeTape`])
//! - window-scoped trade flow momentum with whale detection ([`compute_momentum`])
//! - spread, depth and imbalance metrics ([`compute_book_metrics`])
//! - a bounded composite sentiment score ([`compose_sentiment`])
//!
//! Every analytics function is synchronous, I/O free and takes an explicit `now`,
//! so identical inputs always produce identical outputs. Per-market state lives in
//! caller-owned values ([`TradeTape`], [`MarketView`]) rather than module caches.
pub mod book;
pub mod config;
pub mod error;
pub mod momentum;
pub mod reconcile;
pub mod sentiment;
pub mod signal;
pub mod types;
pub mod view;

pub use book::{BookMetrics, compute_book_metrics, compute_depth_metrics};
pub use config::{
    AnalyticsConfig, MomentumConfig, ReferenceQuantity, SentimentConfig, SentimentWeights,
};
pub use error::{ConfigError, IngestError};
pub use momentum::{
    FlowDirection, OutcomeFlow, ProcessedTrade, TradeMomentum, compute_momentum,
    compute_momentum_with, process_window,
};
pub use reconcile::{TradeTape, reconcile};
pub use sentiment::{
    MarketSentiment, SentimentFactors, SentimentLabel, compose_sentiment, compose_sentiment_with,
};
pub use signal::{Band, SignalBand};
pub use types::{BookSide, OrderBook, OrderBookLevel, RawTrade, Side, SideSource, Trade};
pub use view::{MarketContext, MarketPulse, MarketView, ingest_trades};
