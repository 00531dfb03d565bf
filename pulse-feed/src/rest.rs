//! REST client for the backend market endpoints.

use crate::{
    error::FeedError,
    wire::{Platform, StatsResponse, TradeHistory, market_context},
};
use pulse_analytics::{MarketContext, OrderBook, RawTrade};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base: Url,
    platform: Platform,
}

impl RestClient {
    pub fn new(base: &str, platform: Platform) -> Result<Self, FeedError> {
        let base = Url::parse(base).map_err(|error| FeedError::Url {
            url: base.to_string(),
            reason: error.to_string(),
        })?;

        if base.cannot_be_a_base() {
            return Err(FeedError::Url {
                url: base.to_string(),
                reason: "cannot be a base url".to_string(),
            });
        }

        Ok(Self {
            http: Client::new(),
            base,
            platform,
        })
    }

    /// Most recent trades for `market_id`, as delivered.
    pub async fn fetch_trades(
        &self,
        market_id: &str,
        limit: usize,
    ) -> Result<Vec<RawTrade>, FeedError> {
        let mut url = self.endpoint(&["markets", self.platform.as_str(), market_id, "trades"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());

        let history: TradeHistory = self.get_json(url).await?;
        debug!(market_id, trades = history.trades.len(), "fetched trades");
        Ok(history.trades)
    }

    pub async fn fetch_order_book(&self, market_id: &str) -> Result<OrderBook, FeedError> {
        let url = self.endpoint(&["markets", self.platform.as_str(), market_id, "orderbook"])?;
        self.get_json(url).await
    }

    /// Market stats for every market on the platform over `timeframe` ("24h", "7d").
    pub async fn fetch_stats(&self, timeframe: &str) -> Result<StatsResponse, FeedError> {
        let mut url = self.endpoint(&["markets", "stats"])?;
        url.query_pairs_mut()
            .append_pair("timeframe", timeframe)
            .append_pair("platform", self.platform.as_str());

        self.get_json(url).await
    }

    /// Price change and volume context from the daily and weekly stats.
    ///
    /// Weekly stats are optional; without them the volume factor stays neutral.
    pub async fn fetch_market_context(&self, market_id: &str) -> Result<MarketContext, FeedError> {
        let (day, week) = tokio::join!(self.fetch_stats("24h"), self.fetch_stats("7d"));

        let day = day?;
        let day = day.find(market_id).ok_or_else(|| FeedError::MarketNotFound {
            market_id: market_id.to_string(),
            timeframe: "24h".to_string(),
        })?;

        let week = match &week {
            Ok(week) => week.find(market_id),
            Err(error) => {
                debug!(%error, "weekly stats unavailable");
                None
            }
        };

        Ok(market_context(day, week))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FeedError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FeedError::Url {
                url: self.base.to_string(),
                reason: "cannot be a base url".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T>(&self, url: Url) -> Result<T, FeedError>
    where
        T: DeserializeOwned,
    {
        let response = self.http.get(url.clone()).send().await?;
        if let Err(status_error) = response.error_for_status_ref() {
            return Err(FeedError::from(status_error));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| FeedError::Decode {
            context: url.path().to_string(),
            reason: error.to_string(),
        })
    }
}
