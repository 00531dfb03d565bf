use crate::{error::FeedError, stream::StreamConfig, wire::Platform};
use pulse_analytics::AnalyticsConfig;
use smol_str::SmolStr;
use std::{str::FromStr, time::Duration};

/// Market feed configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Backend REST base url (eg/ "http://127.0.0.1:3001/api")
    pub api_url: String,
    /// Backend WebSocket url
    pub ws_url: String,
    pub platform: Platform,
    pub market_id: SmolStr,
    /// Trades and order book REST poll interval
    pub poll_interval: Duration,
    /// Market stats (price change, volume) poll interval
    pub context_interval: Duration,
    /// Maximum trades requested per REST poll
    pub trade_limit: usize,
    /// Ping interval to keep the stream alive
    pub ping_interval: Duration,
    /// Reconnection delay after the stream disconnects
    pub reconnect_delay: Duration,
    /// Maximum channel buffer size for stream events and pulses
    pub channel_buffer_size: usize,
    pub analytics: AnalyticsConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3001/api".to_string(),
            ws_url: "ws://127.0.0.1:3001/ws".to_string(),
            platform: Platform::default(),
            market_id: SmolStr::default(),
            poll_interval: Duration::from_secs(5),
            context_interval: Duration::from_secs(60),
            trade_limit: 100,
            ping_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            channel_buffer_size: 1000,
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Create a new configuration for one market
    pub fn new(platform: Platform, market_id: impl Into<SmolStr>) -> Self {
        Self {
            platform,
            market_id: market_id.into(),
            ..Default::default()
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_context_interval(mut self, interval: Duration) -> Self {
        self.context_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_analytics(mut self, analytics: AnalyticsConfig) -> Self {
        self.analytics = analytics;
        self
    }

    /// Stream settings derived from this configuration.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::new(self.ws_url.clone(), self.platform, self.market_id.clone())
            .with_ping_interval(self.ping_interval)
            .with_reconnect_delay(self.reconnect_delay)
            .with_channel_buffer_size(self.channel_buffer_size)
    }

    pub fn validate(&self) -> Result<(), FeedError> {
        if self.market_id.is_empty() {
            return Err(FeedError::Config("market id must be set".to_string()));
        }
        if self.poll_interval.is_zero() || self.context_interval.is_zero() {
            return Err(FeedError::Config("poll intervals must be non-zero".to_string()));
        }
        if self.ping_interval.is_zero() {
            return Err(FeedError::Config("ping interval must be non-zero".to_string()));
        }
        if self.channel_buffer_size == 0 {
            return Err(FeedError::Config("channel buffer size must be non-zero".to_string()));
        }
        self.analytics.validate()?;
        Ok(())
    }

    /// Defaults overridden by `PULSE_*` environment variables.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`, keyed by `PULSE_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FeedError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            analytics: AnalyticsConfig::from_lookup(&lookup)?,
            ..Default::default()
        };

        if let Some(url) = lookup("PULSE_API_URL") {
            config.api_url = url;
        }
        if let Some(url) = lookup("PULSE_WS_URL") {
            config.ws_url = url;
        }
        if let Some(platform) = parse_var(&lookup, "PULSE_PLATFORM")? {
            config.platform = platform;
        }
        if let Some(market_id) = lookup("PULSE_MARKET_ID") {
            config.market_id = SmolStr::new(market_id.trim());
        }
        if let Some(secs) = parse_var(&lookup, "PULSE_POLL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "PULSE_CONTEXT_POLL_SECS")? {
            config.context_interval = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_var(&lookup, "PULSE_TRADE_LIMIT")? {
            config.trade_limit = limit;
        }
        if let Some(secs) = parse_var(&lookup, "PULSE_RECONNECT_SECS")? {
            config.reconnect_delay = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, FeedError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| FeedError::Config(format!("failed to parse {key}={value}")))
        })
        .transpose()
}
