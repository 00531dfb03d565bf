/// Pulse Feed - backend collaborators for pulse-analytics
///
/// Keeps a [`MarketView`](pulse_analytics::MarketView) fed for one market:
/// - REST polling of trades, order book and market stats
/// - a reconnecting WebSocket stream of trades, book snapshots and prices
/// - a runner that merges both and publishes a fresh `MarketPulse` after each update
pub mod config;
pub mod error;
pub mod rest;
pub mod runner;
pub mod stream;
pub mod wire;

pub use config::FeedConfig;
pub use error::FeedError;
pub use rest::RestClient;
pub use runner::MarketRunner;
pub use stream::{ConnectionStatus, FeedEvent, StreamClient, StreamConfig};
pub use wire::{ClientMessage, MarketStats, Platform, ServerMessage, Subscription};
