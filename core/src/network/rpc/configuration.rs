use crate::types::duration_millis_format;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff, FibonacciBackoff};

pub const LOCAL_ENDPOINT: &str = "http://127.0.0.1:9944";
pub const LOCAL_WS_ENDPOINT: &str = "ws://127.0.0.1:9944";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RPCConfig {
	/// WebSocket endpoint used for subscriptions (default: ws://127.0.0.1:9944).
	pub full_node_ws: String,
	/// HTTP endpoint used for requests (default: http://127.0.0.1:9944).
	pub full_node_http: String,
	/// Backoff of a single HTTP request, bounded by `retries`.
	/// (default:
	/// fibonacci:
	///     base: 1,
	///     max_delay: 10000,
	///     retries: 8,
	/// )
	pub retry: RetryConfig,
	/// Backoff between WebSocket reconnects. Never exhausted, `retries` is ignored.
	pub reconnect: RetryConfig,
}

impl Default for RPCConfig {
	fn default() -> Self {
		Self {
			full_node_ws: LOCAL_WS_ENDPOINT.into(),
			full_node_http: LOCAL_ENDPOINT.into(),
			retry: RetryConfig::Fibonacci(FibonacciConfig {
				base: 1,
				max_delay: Duration::from_millis(10000),
				retries: 8,
			}),
			reconnect: RetryConfig::Exponential(ExponentialConfig {
				base: 2,
				max_delay: Duration::from_millis(30000),
				retries: 0,
			}),
		}
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RetryConfig {
	#[serde(rename = "exponential")]
	Exponential(ExponentialConfig),

	#[serde(rename = "fibonacci")]
	Fibonacci(FibonacciConfig),
}

impl RetryConfig {
	/// Jittered delays, in seconds scale, capped at `max_delay`. Unbounded.
	pub fn backoff(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
		match self {
			RetryConfig::Exponential(config) => Box::new(
				ExponentialBackoff::from_millis(config.base)
					.factor(1000)
					.max_delay(config.max_delay)
					.map(jitter),
			),
			RetryConfig::Fibonacci(config) => Box::new(
				FibonacciBackoff::from_millis(config.base)
					.factor(1000)
					.max_delay(config.max_delay)
					.map(jitter),
			),
		}
	}

	fn retries(&self) -> usize {
		match self {
			RetryConfig::Exponential(config) => config.retries,
			RetryConfig::Fibonacci(config) => config.retries,
		}
	}
}

impl IntoIterator for RetryConfig {
	type Item = Duration;
	type IntoIter = std::vec::IntoIter<Self::Item>;

	fn into_iter(self) -> Self::IntoIter {
		self.backoff()
			.take(self.retries())
			.collect::<Vec<Duration>>()
			.into_iter()
	}
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExponentialConfig {
	pub base: u64,
	#[serde(with = "duration_millis_format")]
	pub max_delay: Duration,
	pub retries: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FibonacciConfig {
	pub base: u64,
	#[serde(with = "duration_millis_format")]
	pub max_delay: Duration,
	pub retries: usize,
}
