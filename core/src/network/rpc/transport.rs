//! Text frame transports used by the router.

use async_trait::async_trait;
use jsonrpsee::{
	client_transport::ws::{Url, WsTransportClientBuilder},
	core::client::{ReceivedMessage, TransportReceiverT, TransportSenderT},
};
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
	#[error("Cannot connect to {url}: {reason}")]
	Connect { url: String, reason: String },
	#[error("Cannot send frame: {0}")]
	Send(String),
	#[error("Cannot receive frame: {0}")]
	Receive(String),
	#[error("Connection closed")]
	Closed,
}

#[async_trait]
pub trait Transport: Send {
	async fn send(&mut self, text: String) -> Result<(), TransportError>;

	/// Next text frame. Control frames are handled by the transport.
	async fn receive(&mut self) -> Result<String, TransportError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
	async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;
}

pub struct WsTransport<S, R> {
	sender: S,
	receiver: R,
}

#[async_trait]
impl<S, R> Transport for WsTransport<S, R>
where
	S: TransportSenderT + Send,
	R: TransportReceiverT + Send,
{
	async fn send(&mut self, text: String) -> Result<(), TransportError> {
		self.sender
			.send(text)
			.await
			.map_err(|error| TransportError::Send(error.to_string()))
	}

	async fn receive(&mut self) -> Result<String, TransportError> {
		loop {
			let message = self
				.receiver
				.receive()
				.await
				.map_err(|error| TransportError::Receive(error.to_string()))?;
			match message {
				ReceivedMessage::Text(text) => return Ok(text),
				ReceivedMessage::Bytes(bytes) => {
					return String::from_utf8(bytes)
						.map_err(|error| TransportError::Receive(error.to_string()))
				},
				ReceivedMessage::Pong => trace!("Pong received"),
			}
		}
	}
}

/// Opens WebSocket connections to a full node.
pub struct WsConnector {
	url: String,
	connection_timeout: Duration,
}

impl WsConnector {
	pub fn new(url: &str) -> Self {
		Self {
			url: url.to_string(),
			connection_timeout: Duration::from_secs(10),
		}
	}

	fn connect_error(&self, reason: impl ToString) -> TransportError {
		TransportError::Connect {
			url: self.url.clone(),
			reason: reason.to_string(),
		}
	}
}

#[async_trait]
impl Connector for WsConnector {
	async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
		let url = Url::parse(&self.url).map_err(|error| self.connect_error(error))?;
		let (sender, receiver) = WsTransportClientBuilder::default()
			.connection_timeout(self.connection_timeout)
			.build(url)
			.await
			.map_err(|error| self.connect_error(error))?;
		Ok(Box::new(WsTransport { sender, receiver }))
	}
}
