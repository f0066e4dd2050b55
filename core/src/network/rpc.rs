//! JSON-RPC 2.0 messages exchanged with a Substrate node.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
	fmt::{self, Display},
	sync::atomic::{AtomicU64, Ordering},
};

mod client;
pub mod configuration;
pub mod observers;
pub mod router;
pub mod transport;

pub use client::Client;

pub const STATE_GET_METADATA: &str = "state_getMetadata";
pub const STATE_GET_RUNTIME_VERSION: &str = "state_getRuntimeVersion";
pub const STATE_GET_STORAGE: &str = "state_getStorage";
pub const STATE_SUBSCRIBE_RUNTIME_VERSION: &str = "state_subscribeRuntimeVersion";
pub const CHAIN_GET_BLOCK_HASH: &str = "chain_getBlockHash";
pub const CHAIN_GET_FINALIZED_HEAD: &str = "chain_getFinalizedHead";
pub const CHAIN_GET_HEADER: &str = "chain_getHeader";
pub const CHAIN_SUBSCRIBE_FINALIZED_HEADS: &str = "chain_subscribeFinalizedHeads";
pub const SYSTEM_CHAIN: &str = "system_chain";
pub const AUTHOR_SUBMIT_EXTRINSIC: &str = "author_submitExtrinsic";

/// Request ids, increasing from 1. Owned by a single client or router.
#[derive(Debug, Default)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
	pub fn next(&self) -> u64 {
		self.0.fetch_add(1, Ordering::Relaxed) + 1
	}
}

/// Outbound call or subscription, without its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
	pub method: String,
	pub params: Vec<Value>,
	/// Acknowledged with a subscription id followed by notifications.
	pub is_subscription: bool,
}

impl Request {
	pub fn call(method: &str, params: Vec<Value>) -> Self {
		Self {
			method: method.to_string(),
			params,
			is_subscription: false,
		}
	}

	pub fn subscribe(method: &str) -> Self {
		Self {
			method: method.to_string(),
			params: vec![],
			is_subscription: true,
		}
	}

	pub fn to_json(&self, id: u64) -> Value {
		json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": self.method,
			"params": self.params,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl Display for RpcError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} (code {})", self.message, self.code)
	}
}

impl std::error::Error for RpcError {}

#[derive(Deserialize)]
struct RawMessage {
	id: Option<u64>,
	#[serde(default)]
	result: Option<Value>,
	error: Option<RpcError>,
	method: Option<String>,
	params: Option<RawParams>,
}

#[derive(Deserialize)]
struct RawParams {
	subscription: Option<Value>,
	#[serde(default)]
	result: Value,
}

/// Inbound frame: a response correlated by request id, or a subscription
/// notification correlated by subscription id.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	Response {
		id: u64,
		result: Result<Value, RpcError>,
	},
	Notification {
		method: String,
		subscription: Option<String>,
		result: Value,
	},
}

impl Message {
	pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
		let raw: RawMessage = serde_json::from_str(text)?;
		if let Some(id) = raw.id {
			let result = match raw.error {
				Some(error) => Err(error),
				None => Ok(raw.result.unwrap_or(Value::Null)),
			};
			return Ok(Message::Response { id, result });
		}

		let (subscription, result) = match raw.params {
			Some(params) => (params.subscription.and_then(subscription_id), params.result),
			None => (None, Value::Null),
		};
		Ok(Message::Notification {
			method: raw.method.unwrap_or_default(),
			subscription,
			result,
		})
	}
}

/// Nodes use strings, some older ones numbers.
pub fn subscription_id(value: Value) -> Option<String> {
	match value {
		Value::String(id) if !id.is_empty() => Some(id),
		Value::Number(id) => Some(id.to_string()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_owned_and_increasing() {
		let first = RequestIds::default();
		let second = RequestIds::default();
		assert_eq!((first.next(), first.next()), (1, 2));
		assert_eq!(second.next(), 1);
	}

	#[test]
	fn request_json() {
		let request = Request::call(CHAIN_GET_BLOCK_HASH, vec![json!(0)]);
		assert_eq!(
			request.to_json(3),
			json!({"jsonrpc": "2.0", "id": 3, "method": "chain_getBlockHash", "params": [0]})
		);
		assert!(Request::subscribe(CHAIN_SUBSCRIBE_FINALIZED_HEADS).is_subscription);
	}

	#[test]
	fn parse_response() {
		assert_eq!(
			Message::parse(r#"{"jsonrpc":"2.0","id":4,"result":"0xabcd"}"#).unwrap(),
			Message::Response {
				id: 4,
				result: Ok(json!("0xabcd"))
			}
		);
		assert_eq!(
			Message::parse(r#"{"jsonrpc":"2.0","id":5,"result":null}"#).unwrap(),
			Message::Response {
				id: 5,
				result: Ok(Value::Null)
			}
		);
		let Message::Response { result, .. } = Message::parse(
			r#"{"jsonrpc":"2.0","id":6,"error":{"code":-32601,"message":"Method not found"}}"#,
		)
		.unwrap() else {
			panic!("expected a response");
		};
		assert_eq!(result.unwrap_err().code, -32601);
	}

	#[test]
	fn parse_notification() {
		let text = r#"{"jsonrpc":"2.0","method":"chain_finalizedHead","params":{"subscription":"abc","result":{"number":"0x1"}}}"#;
		assert_eq!(
			Message::parse(text).unwrap(),
			Message::Notification {
				method: "chain_finalizedHead".to_string(),
				subscription: Some("abc".to_string()),
				result: json!({"number": "0x1"}),
			}
		);

		let text = r#"{"jsonrpc":"2.0","method":"chain_finalizedHead","params":{"result":1}}"#;
		assert!(matches!(
			Message::parse(text).unwrap(),
			Message::Notification { subscription: None, .. }
		));
		assert!(Message::parse("not json").is_err());
	}
}
