//! Per-market task merging REST polls and stream events into analytics pulses.

use crate::{
    config::FeedConfig,
    error::FeedError,
    rest::RestClient,
    stream::{ConnectionStatus, FeedEvent, StreamClient},
};
use chrono::{DateTime, Utc};
use pulse_analytics::{MarketPulse, MarketView};
use rust_decimal::prelude::ToPrimitive;
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{debug, info, warn};

/// Owns one [`MarketView`] and keeps it fed from the backend.
pub struct MarketRunner {
    config: FeedConfig,
    rest: RestClient,
    view: MarketView,
    connection: ConnectionStatus,
}

impl MarketRunner {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        config.validate()?;
        let rest = RestClient::new(&config.api_url, config.platform)?;
        let view = MarketView::new(config.market_id.clone(), config.analytics.clone());

        Ok(Self {
            config,
            rest,
            view,
            connection: ConnectionStatus::Disconnected,
        })
    }

    pub fn view(&self) -> &MarketView {
        &self.view
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Spawn the runner, returning a receiver of pulses. Dropping the receiver
    /// stops the runner.
    pub fn start(self) -> mpsc::Receiver<MarketPulse> {
        let (pulse_tx, pulse_rx) = mpsc::channel(self.config.channel_buffer_size);
        tokio::spawn(self.run(pulse_tx));
        pulse_rx
    }

    /// Recompute and publish a pulse after every poll or stream event, until
    /// `pulse_tx` closes.
    pub async fn run(mut self, pulse_tx: mpsc::Sender<MarketPulse>) {
        info!(
            platform = %self.config.platform,
            market_id = %self.config.market_id,
            "starting market runner"
        );

        let mut events = StreamClient::new(self.config.stream_config()).start();

        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut context_poll = tokio::time::interval(self.config.context_interval);
        context_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = pulse_tx.closed() => break,
                _ = poll.tick() => self.poll_market().await,
                _ = context_poll.tick() => self.poll_context().await,
                event = events.recv() => match event {
                    Some(event) => self.apply_event(event, Utc::now()),
                    None => {
                        warn!("stream client stopped");
                        break;
                    }
                },
            }

            let pulse = self.view.pulse(Utc::now());
            if pulse_tx.send(pulse).await.is_err() {
                break;
            }
        }

        info!(market_id = %self.config.market_id, "market runner stopped");
        self.view.clear();
    }

    /// Apply one stream event to the held view.
    pub fn apply_event(&mut self, event: FeedEvent, now: DateTime<Utc>) {
        match event {
            FeedEvent::Trade(raw) => {
                self.view.push_trade(raw, now);
            }
            FeedEvent::Book(book) => self.view.apply_book(book),
            FeedEvent::Price { yes_price, .. } => {
                if let Some(price) = yes_price.to_f64() {
                    self.view.update_price(price);
                }
            }
            FeedEvent::Status(status) => {
                debug!(?status, "stream connection status");
                self.connection = status;
            }
        }
    }

    async fn poll_market(&mut self) {
        let market_id = self.config.market_id.as_str();
        let (trades, book) = tokio::join!(
            self.rest.fetch_trades(market_id, self.config.trade_limit),
            self.rest.fetch_order_book(market_id),
        );

        // Failures keep the previously held data
        match trades {
            Ok(trades) => self.view.apply_trade_snapshot(trades, Utc::now()),
            Err(error) => warn!(%error, market_id, "failed to fetch trades"),
        }
        match book {
            Ok(book) => self.view.apply_book(book),
            Err(error) => warn!(%error, market_id, "failed to fetch order book"),
        }
    }

    async fn poll_context(&mut self) {
        match self.rest.fetch_market_context(&self.config.market_id).await {
            Ok(context) => self.view.set_context(context),
            Err(error) => warn!(
                %error,
                market_id = %self.config.market_id,
                "failed to fetch market context"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Platform;
    use chrono::TimeZone;
    use pulse_analytics::{OrderBook, OrderBookLevel, RawTrade, Side};
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;
    use std::time::Duration;

    fn runner() -> MarketRunner {
        let config = FeedConfig::new(Platform::Polymarket, "m-1")
            .with_api_url("http://127.0.0.1:9/api")
            .with_ws_url("ws://127.0.0.1:9/ws")
            .with_reconnect_delay(Duration::from_millis(10));
        MarketRunner::new(config).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(MarketRunner::new(FeedConfig::default()).is_err());
        assert!(
            MarketRunner::new(FeedConfig::new(Platform::Kalshi, "m-1").with_api_url("::")).is_err()
        );
    }

    #[test]
    fn test_apply_events() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut runner = runner();

        runner.apply_event(FeedEvent::Status(ConnectionStatus::Connected), now);
        assert_eq!(runner.connection(), ConnectionStatus::Connected);

        runner.apply_event(
            FeedEvent::Trade(RawTrade {
                id: Some(SmolStr::new("t-1")),
                timestamp: now,
                price: dec!(0.55),
                quantity: dec!(10),
                side: Some(Side::Sell),
                outcome: Some(SmolStr::new("yes")),
                transaction_hash: None,
            }),
            now,
        );
        runner.apply_event(
            FeedEvent::Book(OrderBook {
                yes_bids: vec![OrderBookLevel::new(dec!(0.54), dec!(50))],
                yes_asks: vec![OrderBookLevel::new(dec!(0.56), dec!(50))],
                ..Default::default()
            }),
            now,
        );
        runner.apply_event(
            FeedEvent::Price {
                yes_price: dec!(0.55),
                timestamp: now,
            },
            now,
        );

        let pulse = runner.view().pulse(now);
        assert_eq!(pulse.trades.len(), 1);
        assert_eq!(pulse.momentum.sell_count, 1);
        assert_eq!(pulse.book.imbalance, 0.0);
        assert!((runner.view().context().current_price - 0.55).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_run_stops_when_receiver_dropped() {
        let (pulse_tx, pulse_rx) = mpsc::channel(1);
        drop(pulse_rx);

        tokio::time::timeout(Duration::from_secs(10), runner().run(pulse_tx))
            .await
            .unwrap();
    }
}
