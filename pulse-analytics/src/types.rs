//! Core data types for prediction market trades and order books.
//!
//! Upstream payloads arrive as [`RawTrade`]s whose `side` may be absent. They are
//! converted into strict [`Trade`]s exactly once, at ingestion, so every analytics
//! consumer downstream works with a definite [`Side`].

use crate::error::IngestError;
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Order side (Buy or Sell) from the taker's perspective.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "Buy", alias = "BUY")]
    Buy,
    #[serde(alias = "Sell", alias = "SELL")]
    Sell,
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }

    /// Check if this is a buy
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Check if this is a sell
    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }

    /// Infer a buy-equivalent side from a binary outcome label.
    ///
    /// "yes" maps to [`Side::Buy`] and "no" to [`Side::Sell`]. This conflates
    /// outcome direction with trade direction (a sell of YES and a buy of NO can be
    /// the same economic position), so it is an approximation for colouring and
    /// flow only. Any other label yields `None`.
    pub fn from_outcome(outcome: &str) -> Option<Self> {
        if outcome.eq_ignore_ascii_case("yes") {
            Some(Side::Buy)
        } else if outcome.eq_ignore_ascii_case("no") {
            Some(Side::Sell)
        } else {
            None
        }
    }
}

/// Where a [`Trade`]'s side came from.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum SideSource {
    /// Reported by the venue.
    #[default]
    Reported,
    /// Inferred from the outcome label; see [`Side::from_outcome`].
    InferredFromOutcome,
}

/// Trade as delivered by the REST snapshot or the live stream.
///
/// Prices and quantities accept both JSON numbers and strings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawTrade {
    #[serde(default)]
    pub id: Option<SmolStr>,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub outcome: Option<SmolStr>,
    #[serde(default)]
    pub transaction_hash: Option<SmolStr>,
}

/// An executed trade on one market outcome. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Trade {
    /// Globally unique trade id; primary dedup key
    pub id: SmolStr,
    /// Execution time on the source clock
    pub timestamp: DateTime<Utc>,
    /// Probability-as-price in [0, 1]
    pub price: Decimal,
    /// Quantity traded (>= 0)
    pub quantity: Decimal,
    pub side: Side,
    pub side_source: SideSource,
    /// Outcome label the trade applies to (eg/ "yes", "no", a candidate name)
    pub outcome: SmolStr,
}

impl Trade {
    /// Notional value of the trade (price x quantity).
    pub fn notional(&self) -> f64 {
        (self.price * self.quantity).to_f64().unwrap_or(0.0)
    }

    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(0.0)
    }

    pub fn quantity_f64(&self) -> f64 {
        self.quantity.to_f64().unwrap_or(0.0)
    }

    /// True if the side was inferred rather than reported.
    pub fn is_side_inferred(&self) -> bool {
        self.side_source == SideSource::InferredFromOutcome
    }
}

/// Validate a boundary trade and resolve its side.
///
/// A trade with no reported side and an outcome other than "yes"/"no" fails with
/// [`IngestError::UnresolvableSide`]. Ingestion drops such trades, so they are
/// missing from the reconciled tape as well as from directional flow.
impl TryFrom<RawTrade> for Trade {
    type Error = IngestError;

    fn try_from(raw: RawTrade) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .or(raw.transaction_hash.filter(|hash| !hash.is_empty()))
            .ok_or(IngestError::MissingId)?;

        if raw.price < Decimal::ZERO || raw.price > Decimal::ONE {
            return Err(IngestError::PriceOutOfRange {
                id,
                price: raw.price,
            });
        }

        if raw.quantity < Decimal::ZERO {
            return Err(IngestError::NegativeQuantity {
                id,
                quantity: raw.quantity,
            });
        }

        let inferred = raw.outcome.as_deref().and_then(Side::from_outcome);
        let (side, side_source) = match (raw.side, inferred) {
            (Some(side), _) => (side, SideSource::Reported),
            (None, Some(side)) => (side, SideSource::InferredFromOutcome),
            (None, None) => {
                return Err(IngestError::UnresolvableSide {
                    id,
                    outcome: raw.outcome,
                });
            }
        };

        Ok(Self {
            id,
            timestamp: raw.timestamp,
            price: raw.price,
            quantity: raw.quantity,
            side,
            side_source,
            outcome: raw.outcome.unwrap_or_else(|| SmolStr::new_static("yes")),
        })
    }
}

/// Resting order aggregate at one price.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct OrderBookLevel {
    /// Price level in [0, 1]
    pub price: Decimal,
    /// Total quantity at this level
    pub quantity: Decimal,
    /// Number of orders at this level, if the venue reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_count: Option<u32>,
}

impl OrderBookLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self {
            price,
            quantity,
            order_count: None,
        }
    }

    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(0.0)
    }

    pub fn quantity_f64(&self) -> f64 {
        self.quantity.to_f64().unwrap_or(0.0)
    }

    /// Check the level is a well formed probability-priced aggregate.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.price < Decimal::ZERO || self.price > Decimal::ONE {
            return Err(IngestError::LevelPriceOutOfRange { price: self.price });
        }
        if self.quantity < Decimal::ZERO {
            return Err(IngestError::LevelNegativeQuantity {
                price: self.price,
                quantity: self.quantity,
            });
        }
        Ok(())
    }
}

/// Which outcome token of a binary market a book side belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    #[default]
    Yes,
    No,
}

/// Order book snapshot for a prediction market.
///
/// Bids are conventionally best (highest) first and asks best (lowest) first, but
/// metrics never rely on that ordering.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct OrderBook {
    #[serde(default)]
    pub market_id: SmolStr,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub yes_bids: Vec<OrderBookLevel>,
    #[serde(default)]
    pub yes_asks: Vec<OrderBookLevel>,
    #[serde(default)]
    pub no_bids: Vec<OrderBookLevel>,
    #[serde(default)]
    pub no_asks: Vec<OrderBookLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl OrderBook {
    /// (bids, asks) for the requested outcome token.
    pub fn side(&self, side: BookSide) -> (&[OrderBookLevel], &[OrderBookLevel]) {
        match side {
            BookSide::Yes => (&self.yes_bids, &self.yes_asks),
            BookSide::No => (&self.no_bids, &self.no_asks),
        }
    }

    /// True if no levels exist on any side.
    pub fn is_empty(&self) -> bool {
        self.yes_bids.is_empty()
            && self.yes_asks.is_empty()
            && self.no_bids.is_empty()
            && self.no_asks.is_empty()
    }

    /// Drop malformed levels, returning how many were removed.
    pub fn retain_valid(&mut self) -> usize {
        let before = self.level_count();
        for levels in [
            &mut self.yes_bids,
            &mut self.yes_asks,
            &mut self.no_bids,
            &mut self.no_asks,
        ] {
            levels.retain(|level| level.validate().is_ok());
        }
        before - self.level_count()
    }

    fn level_count(&self) -> usize {
        self.yes_bids.len() + self.yes_asks.len() + self.no_bids.len() + self.no_asks.len()
    }
}
