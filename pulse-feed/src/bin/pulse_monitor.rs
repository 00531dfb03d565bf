/// Pulse Monitor - streams live analytics for one prediction market
///
/// Configured through `PULSE_*` environment variables (at minimum
/// `PULSE_MARKET_ID`), logs one line per recomputed pulse.
use pulse_analytics::MarketPulse;
use pulse_feed::{FeedConfig, MarketRunner};
use rustls::crypto::ring::default_provider;
use std::error::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();

    init_logging();

    let config = FeedConfig::from_env()?;
    info!(
        platform = %config.platform,
        market_id = %config.market_id,
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        "starting pulse monitor"
    );

    let mut pulses = MarketRunner::new(config)?.start();

    loop {
        tokio::select! {
            pulse = pulses.recv() => match pulse {
                Some(pulse) => log_pulse(&pulse),
                None => {
                    warn!("market runner stopped");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn log_pulse(pulse: &MarketPulse) {
    let momentum = &pulse.momentum;
    let book = &pulse.book;
    let sentiment = &pulse.sentiment;

    info!(
        market_id = %pulse.market_id,
        trades = pulse.trades.len(),
        window_trades = momentum.trade_count,
        direction = %momentum.direction,
        momentum_ratio = momentum.momentum_ratio,
        velocity = momentum.velocity,
        accelerating = momentum.is_accelerating,
        whales = momentum.whale_count,
        leading_outcome = ?momentum.leading_outcome().map(|(label, _)| label),
        spread = ?book.spread,
        imbalance = book.imbalance,
        sentiment = %sentiment.label,
        score = sentiment.score,
        confidence = sentiment.confidence,
        has_trades = pulse.has_trades,
        has_book = pulse.has_book,
        has_context = pulse.has_context,
        "market pulse"
    );
}

/// Initialize logging, as JSON when `PULSE_LOG_JSON` is set
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if std::env::var("PULSE_LOG_JSON").is_ok_and(|value| value != "0" && value != "false") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
