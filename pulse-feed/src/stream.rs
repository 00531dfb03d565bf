/// WebSocket client for the backend market stream
///
/// Provides automatic reconnection, heartbeat, per-market subscriptions and
/// message decoding into [`FeedEvent`]s.
use crate::{
    error::FeedError,
    wire::{ClientMessage, Platform, ServerMessage, Subscription, snapshot_book},
};
use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt, StreamExt};
use pulse_analytics::{OrderBook, RawTrade};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Stream client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// WebSocket server URL
    pub url: String,
    /// Market whose events are forwarded
    pub market_id: SmolStr,
    /// Subscriptions sent after every (re)connect
    pub subscriptions: Vec<Subscription>,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
    /// Reconnection delay after disconnect
    pub reconnect_delay: Duration,
    /// Maximum channel buffer size for events
    pub channel_buffer_size: usize,
}

impl StreamConfig {
    /// Subscribe to trades, order book and price for one market
    pub fn new(url: impl Into<String>, platform: Platform, market_id: SmolStr) -> Self {
        Self {
            url: url.into(),
            subscriptions: Subscription::all_for(platform, &market_id),
            market_id,
            ping_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            channel_buffer_size: 1000,
        }
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Decoded stream event for the configured market.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Trade(RawTrade),
    Book(OrderBook),
    Price {
        yes_price: Decimal,
        timestamp: DateTime<Utc>,
    },
    Status(ConnectionStatus),
}

/// WebSocket client for one market's stream
pub struct StreamClient {
    config: StreamConfig,
}

impl StreamClient {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Start the connection loop.
    ///
    /// The loop runs until the returned receiver is dropped.
    pub fn start(self) -> mpsc::Receiver<FeedEvent> {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_buffer_size);

        tokio::spawn(async move {
            run_stream_loop(self.config, event_tx).await;
        });

        event_rx
    }
}

/// Map a server message to an event for `market_id`, if it carries one.
pub fn to_event(message: ServerMessage, market_id: &str) -> Option<FeedEvent> {
    if message
        .market_id()
        .is_some_and(|message_market| message_market != market_id)
    {
        return None;
    }

    match message {
        ServerMessage::TradeUpdate { trade, .. } => Some(FeedEvent::Trade(trade)),
        ServerMessage::PriceUpdate {
            yes_price,
            timestamp,
            ..
        } => Some(FeedEvent::Price {
            yes_price,
            timestamp,
        }),
        message @ ServerMessage::OrderBookUpdate { .. } => {
            let book = snapshot_book(message);
            if book.is_none() {
                debug!(market_id, "ignoring order book delta");
            }
            book.map(FeedEvent::Book)
        }
        ServerMessage::Subscribed { subscription } => {
            info!(%subscription, "subscription confirmed");
            None
        }
        ServerMessage::Error { code, message } => {
            warn!(%code, %message, "stream error");
            None
        }
        ServerMessage::ConnectionStatus { platform, status } => {
            debug!(%platform, %status, "venue connection status");
            None
        }
        _ => None,
    }
}

/// Main WebSocket connection loop with auto-reconnect
async fn run_stream_loop(config: StreamConfig, event_tx: mpsc::Sender<FeedEvent>) {
    info!(url = %config.url, market_id = %config.market_id, "starting stream client");

    loop {
        // Receiver dropped, nobody left to notify
        if event_tx
            .send(FeedEvent::Status(ConnectionStatus::Reconnecting))
            .await
            .is_err()
        {
            debug!("event receiver dropped, stopping stream client");
            return;
        }

        match connect_async(&config.url).await {
            Ok((mut ws_stream, _)) => {
                info!(url = %config.url, "connected to stream");
                let _ = event_tx
                    .send(FeedEvent::Status(ConnectionStatus::Connected))
                    .await;

                if let Err(error) = subscribe(&mut ws_stream, &config.subscriptions).await {
                    error!(%error, "failed to subscribe");
                }

                let (mut write, mut read) = ws_stream.split();

                // Spawn ping task to keep connection alive
                let ping_interval = config.ping_interval;
                let (ping_shutdown_tx, mut ping_shutdown_rx) = mpsc::channel::<()>(1);

                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(ping_interval);
                    loop {
                        tokio::select! {
                            _ = interval.tick() => {
                                if write.send(Message::Ping(vec![].into())).await.is_err() {
                                    debug!("failed to send ping, connection likely dead");
                                    break;
                                }
                            }
                            _ = ping_shutdown_rx.recv() => {
                                debug!("ping task shutting down");
                                break;
                            }
                        }
                    }
                });

                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(message) => {
                                    let Some(event) = to_event(message, &config.market_id) else {
                                        continue;
                                    };
                                    if event_tx.send(event).await.is_err() {
                                        debug!("event receiver dropped, stopping stream client");
                                        let _ = ping_shutdown_tx.send(()).await;
                                        return;
                                    }
                                }
                                Err(error) => {
                                    error!(%error, "failed to parse message");
                                    debug!(raw = %text.as_str(), "unparsed message");
                                }
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!("server closed connection");
                            break;
                        }
                        Ok(_) => {
                            // Heartbeat messages - tungstenite handles these automatically
                        }
                        Err(error) => {
                            let error = FeedError::from(error);
                            error!(%error, "stream error");
                            if error.is_terminal() {
                                break;
                            }
                        }
                    }
                }

                // Stop ping task
                let _ = ping_shutdown_tx.send(()).await;
                let _ = event_tx
                    .send(FeedEvent::Status(ConnectionStatus::Disconnected))
                    .await;
                warn!("connection closed, will reconnect");
            }
            Err(error) => {
                let error = FeedError::from(error);
                error!(url = %config.url, %error, "failed to connect");
                let _ = event_tx
                    .send(FeedEvent::Status(ConnectionStatus::Disconnected))
                    .await;
            }
        }

        debug!(delay = ?config.reconnect_delay, "waiting before reconnecting");
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn subscribe<S>(sink: &mut S, subscriptions: &[Subscription]) -> Result<(), FeedError>
where
    S: Sink<Message> + Unpin,
    <S as Sink<Message>>::Error: Into<FeedError>,
{
    for subscription in subscriptions {
        let payload = serde_json::to_string(&ClientMessage::Subscribe {
            subscription: subscription.clone(),
        })
        .map_err(|error| FeedError::Decode {
            context: "subscription".to_string(),
            reason: error.to_string(),
        })?;

        sink.send(Message::text(payload)).await.map_err(Into::into)?;
    }
    Ok(())
}
