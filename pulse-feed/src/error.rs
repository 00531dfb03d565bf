use pulse_analytics::ConfigError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// All errors generated in `pulse-feed`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("invalid url {url}: {reason}")]
    Url { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("failed to decode {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("connection closed: {0}")]
    Disconnected(String),

    #[error("market {market_id} missing from {timeframe} stats")]
    MarketNotFound { market_id: String, timeframe: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FeedError {
    /// Determine if an error requires the stream connection to be re-established.
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::Disconnected(_) => true,
            FeedError::Socket(error_msg) => {
                let error_lower = error_msg.to_lowercase();
                error_lower.contains("terminated")
                    || error_lower.contains("closed")
                    || error_lower.contains("timeout")
            }
            _ => false,
        }
    }
}

impl From<ConfigError> for FeedError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(value: reqwest::Error) -> Self {
        match (value.status(), value.url()) {
            (Some(status), Some(url)) => Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            },
            _ if value.is_decode() => Self::Decode {
                context: "HTTP response".to_string(),
                reason: value.to_string(),
            },
            _ => Self::Http(value.to_string()),
        }
    }
}

impl From<tungstenite::Error> for FeedError {
    fn from(value: tungstenite::Error) -> Self {
        match value {
            tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Io(_)
            | tungstenite::Error::Protocol(_) => Self::Disconnected(value.to_string()),
            other => Self::Socket(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_is_terminal() {
        struct TestCase {
            input: FeedError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: is terminal w/ FeedError::Disconnected
                input: FeedError::from(tungstenite::Error::ConnectionClosed),
                expected: true,
            },
            TestCase {
                // TC1: is terminal w/ FeedError::Socket containing "timeout"
                input: FeedError::Socket("read timeout: no data for 120 seconds".to_string()),
                expected: true,
            },
            TestCase {
                // TC2: is not terminal w/ FeedError::Socket (non-termination error)
                input: FeedError::Socket("frame too large".to_string()),
                expected: false,
            },
            TestCase {
                // TC3: is not terminal w/ FeedError::Decode
                input: FeedError::Decode {
                    context: "server message".to_string(),
                    reason: "missing field `type`".to_string(),
                },
                expected: false,
            },
            TestCase {
                // TC4: is not terminal w/ FeedError::Status
                input: FeedError::Status {
                    url: "http://127.0.0.1:3001/api/markets/stats".to_string(),
                    status: 503,
                },
                expected: false,
            },
            TestCase {
                // TC5: is terminal w/ FeedError::Socket containing "Terminated"
                input: FeedError::Socket("stream terminated with closing frame".to_string()),
                expected: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_from_config_error() {
        let error = FeedError::from(ConfigError::ZeroTradeCap);
        assert_eq!(
            error.to_string(),
            "invalid configuration: trade cap must be at least one"
        );
    }
}
