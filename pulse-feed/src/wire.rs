//! Backend REST and WebSocket message shapes.

use chrono::{DateTime, Utc};
use pulse_analytics::{MarketContext, OrderBook, OrderBookLevel, RawTrade};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

/// Prediction market venue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[display("kalshi")]
    Kalshi,
    #[default]
    #[display("polymarket")]
    Polymarket,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Kalshi => "kalshi",
            Platform::Polymarket => "polymarket",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kalshi" | "k" => Ok(Platform::Kalshi),
            "polymarket" | "poly" | "p" => Ok(Platform::Polymarket),
            _ => Err(format!("unknown platform: {}", s)),
        }
    }
}

/// Per-market stream subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subscription {
    Price {
        platform: Platform,
        market_id: SmolStr,
    },
    OrderBook {
        platform: Platform,
        market_id: SmolStr,
    },
    Trades {
        platform: Platform,
        market_id: SmolStr,
    },
}

impl Subscription {
    /// Trades, order book and price subscriptions for one market.
    pub fn all_for(platform: Platform, market_id: &SmolStr) -> Vec<Self> {
        vec![
            Subscription::Trades {
                platform,
                market_id: market_id.clone(),
            },
            Subscription::OrderBook {
                platform,
                market_id: market_id.clone(),
            },
            Subscription::Price {
                platform,
                market_id: market_id.clone(),
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { subscription: Subscription },
    Unsubscribe { subscription: Subscription },
    Ping { timestamp: i64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBookUpdateType {
    Snapshot,
    Delta,
}

/// Messages pushed by the backend stream. Unknown message types decode to
/// [`ServerMessage::Ignore`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed {
        subscription: serde_json::Value,
    },
    Unsubscribed {
        subscription: serde_json::Value,
    },
    PriceUpdate {
        platform: Platform,
        market_id: SmolStr,
        yes_price: Decimal,
        no_price: Decimal,
        timestamp: DateTime<Utc>,
    },
    OrderBookUpdate {
        platform: Platform,
        market_id: SmolStr,
        update_type: OrderBookUpdateType,
        #[serde(default)]
        yes_bids: Vec<OrderBookLevel>,
        #[serde(default)]
        yes_asks: Vec<OrderBookLevel>,
        #[serde(default)]
        no_bids: Vec<OrderBookLevel>,
        #[serde(default)]
        no_asks: Vec<OrderBookLevel>,
        timestamp: DateTime<Utc>,
    },
    TradeUpdate {
        platform: Platform,
        market_id: SmolStr,
        trade: RawTrade,
    },
    Error {
        code: SmolStr,
        message: String,
    },
    Pong {
        #[serde(default)]
        client_timestamp: i64,
        #[serde(default)]
        server_timestamp: i64,
    },
    ConnectionStatus {
        platform: Platform,
        status: SmolStr,
    },
    #[serde(other)]
    Ignore,
}

impl ServerMessage {
    /// Market the message refers to, if it is market scoped.
    pub fn market_id(&self) -> Option<&SmolStr> {
        match self {
            ServerMessage::PriceUpdate { market_id, .. }
            | ServerMessage::OrderBookUpdate { market_id, .. }
            | ServerMessage::TradeUpdate { market_id, .. } => Some(market_id),
            _ => None,
        }
    }
}

/// `GET /markets/{platform}/{id}/trades` response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeHistory {
    #[serde(default)]
    pub market_id: SmolStr,
    #[serde(default)]
    pub platform: Option<Platform>,
    pub trades: Vec<RawTrade>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Aggregate statistics for one market over a timeframe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketStats {
    pub market_id: SmolStr,
    #[serde(default)]
    pub platform: Option<Platform>,
    pub yes_price: Decimal,
    #[serde(default)]
    pub no_price: Decimal,
    /// Absolute yes price change over the timeframe
    #[serde(default)]
    pub price_change: Decimal,
    #[serde(default)]
    pub price_change_percent: Decimal,
    /// Σ price x quantity over the timeframe
    #[serde(default)]
    pub volume: Decimal,
    #[serde(default)]
    pub yes_txn_count: u32,
    #[serde(default)]
    pub no_txn_count: u32,
}

/// `GET /markets/stats` response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StatsResponse {
    pub stats: Vec<MarketStats>,
    #[serde(default)]
    pub timeframe: Option<SmolStr>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl StatsResponse {
    pub fn find(&self, market_id: &str) -> Option<&MarketStats> {
        self.stats.iter().find(|stats| stats.market_id == market_id)
    }
}

/// Build sentiment context from daily and (optionally) weekly stats.
///
/// Average volume is the weekly volume spread over seven days. Without weekly
/// stats the daily volume is its own average, which leaves the volume factor
/// neutral.
pub fn market_context(day: &MarketStats, week: Option<&MarketStats>) -> MarketContext {
    let volume_24h = day.volume.to_f64().unwrap_or(0.0);
    let average_volume = week
        .and_then(|week| (week.volume / Decimal::from(7)).to_f64())
        .unwrap_or(volume_24h);

    MarketContext {
        current_price: day.yes_price.to_f64().unwrap_or(0.0),
        previous_price: (day.yes_price - day.price_change).to_f64().unwrap_or(0.0),
        volume_24h,
        average_volume,
    }
}

/// Convert a book snapshot message into an [`OrderBook`]. Deltas are not
/// snapshots and yield `None`.
pub fn snapshot_book(message: ServerMessage) -> Option<OrderBook> {
    match message {
        ServerMessage::OrderBookUpdate {
            market_id,
            update_type: OrderBookUpdateType::Snapshot,
            yes_bids,
            yes_asks,
            no_bids,
            no_asks,
            timestamp,
            ..
        } => Some(OrderBook {
            market_id,
            timestamp: Some(timestamp),
            yes_bids,
            yes_asks,
            no_bids,
            no_asks,
            sequence: None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_message_serialize() {
        let message = ClientMessage::Subscribe {
            subscription: Subscription::OrderBook {
                platform: Platform::Kalshi,
                market_id: SmolStr::new("KXBTC-24"),
            },
        };

        let actual = serde_json::to_value(&message).unwrap();
        let expected = serde_json::json!({
            "type": "subscribe",
            "subscription": {
                "type": "order_book",
                "platform": "kalshi",
                "market_id": "KXBTC-24"
            }
        });
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_server_message_deserialize() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: trade update
                input: r#"{"type":"trade_update","platform":"polymarket","market_id":"m-1",
                    "trade":{"id":"t-1","market_id":"m-1","platform":"polymarket",
                    "timestamp":"2024-05-01T12:00:00Z","price":"0.41","quantity":"12",
                    "outcome":"yes","side":"buy"}}"#,
                expected: "trade_update",
            },
            TestCase {
                // TC1: price update
                input: r#"{"type":"price_update","platform":"kalshi","market_id":"m-1",
                    "yes_price":"0.55","no_price":"0.45","timestamp":"2024-05-01T12:00:00Z"}"#,
                expected: "price_update",
            },
            TestCase {
                // TC2: error
                input: r#"{"type":"error","code":"market_not_found","message":"no such market"}"#,
                expected: "error",
            },
            TestCase {
                // TC3: unknown type is ignored
                input: r#"{"type":"news_update","item":{"title":"x"}}"#,
                expected: "ignore",
            },
            TestCase {
                // TC4: subscription confirmation for a non-market subscription
                input: r#"{"type":"subscribed","subscription":{"type":"global_news"}}"#,
                expected: "subscribed",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let message: ServerMessage = serde_json::from_str(test.input).unwrap();
            let actual = match message {
                ServerMessage::TradeUpdate { .. } => "trade_update",
                ServerMessage::PriceUpdate { .. } => "price_update",
                ServerMessage::Error { .. } => "error",
                ServerMessage::Subscribed { .. } => "subscribed",
                ServerMessage::Ignore => "ignore",
                _ => "other",
            };
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_snapshot_book() {
        let input = r#"{"type":"order_book_update","platform":"polymarket","market_id":"m-1",
            "update_type":"snapshot","yes_bids":[{"price":"0.40","quantity":"100"}],
            "yes_asks":[{"price":"0.42","quantity":"75","order_count":3}],
            "no_bids":[],"no_asks":[],"timestamp":"2024-05-01T12:00:00Z"}"#;

        let message: ServerMessage = serde_json::from_str(input).unwrap();
        assert_eq!(message.market_id().map(SmolStr::as_str), Some("m-1"));

        let book = snapshot_book(message).unwrap();
        assert_eq!(book.yes_bids[0].price, dec!(0.40));
        assert_eq!(book.yes_asks[0].order_count, Some(3));

        let delta = input.replace("snapshot", "delta");
        let message: ServerMessage = serde_json::from_str(&delta).unwrap();
        assert!(snapshot_book(message).is_none());
    }

    #[test]
    fn test_market_context_from_stats() {
        let input = r#"{"stats":[{"market_id":"m-1","platform":"polymarket","yes_price":"0.60",
            "no_price":"0.40","price_change":"0.10","price_change_percent":"20",
            "volume":"1400","yes_txn_count":10,"no_txn_count":4,"timeframe":"24h"}],
            "sparklines":{},"timeframe":"24h","count":1}"#;
        let day: StatsResponse = serde_json::from_str(input).unwrap();

        let week = MarketStats {
            volume: dec!(7000),
            ..day.stats[0].clone()
        };

        let context = market_context(day.find("m-1").unwrap(), Some(&week));
        assert!((context.current_price - 0.6).abs() < 1e-12);
        assert!((context.previous_price - 0.5).abs() < 1e-12);
        assert_eq!(context.volume_24h, 1400.0);
        assert_eq!(context.average_volume, 1000.0);

        let context = market_context(&day.stats[0], None);
        assert_eq!(context.average_volume, context.volume_24h);
        assert!(day.find("m-2").is_none());
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("Kalshi".parse::<Platform>(), Ok(Platform::Kalshi));
        assert_eq!("poly".parse::<Platform>(), Ok(Platform::Polymarket));
        assert!("binance".parse::<Platform>().is_err());
        assert_eq!(Platform::Polymarket.to_string(), "polymarket");
    }

    #[test]
    fn test_platform_display_matches_wire_name() {
        for platform in [Platform::Kalshi, Platform::Polymarket] {
            let wire = serde_json::to_value(platform).unwrap();
            assert_eq!(platform.to_string(), platform.as_str());
            assert_eq!(wire, serde_json::Value::from(platform.as_str()));
            assert_eq!(platform.to_string().parse::<Platform>(), Ok(platform));
        }
    }
}
