//! Routes JSON-RPC responses and subscription notifications of one
//! WebSocket connection to the observers that asked for them.
//!
//! On every (re)connect each observer's requests are issued again and both
//! routing tables are rebuilt from scratch. Transport failures reconnect
//! with backoff, protocol violations stop the router.

use super::{
	configuration::RetryConfig,
	subscription_id,
	transport::{Connector, Transport, TransportError},
	Message, Request, RequestIds, RpcError,
};
use crate::shutdown::Controller;
use async_trait::async_trait;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error("{method} failed: {error}")]
	Rpc { method: String, error: RpcError },
	#[error("Header backfill failed: {0}")]
	Backfill(String),
	#[error("Runtime upgraded from spec version {from} to {to}")]
	RuntimeUpgrade { from: u32, to: u32 },
	#[error("Malformed frame: {0}")]
	MalformedFrame(String),
	#[error("Response to unknown request id {0}")]
	UnmatchedResponse(u64),
	#[error("Notification {0} carries no subscription id")]
	MissingSubscription(String),
	#[error("Subscription to {0} was not acknowledged with a subscription id")]
	InvalidAcknowledgement(String),
	#[error("Finalized header {number} does not descend from the last known block {last}")]
	BrokenAncestry { number: u32, last: u32 },
	#[error("Cannot decode {method} result: {reason}")]
	Decode { method: String, reason: String },
}

impl Error {
	/// Transient errors rebuild the connection, others stop the router.
	pub fn is_transient(&self) -> bool {
		matches!(
			self,
			Error::Transport(_)
				| Error::Rpc { .. }
				| Error::Backfill(_)
				| Error::RuntimeUpgrade { .. }
		)
	}

	pub fn decode(method: &str, reason: impl ToString) -> Self {
		Error::Decode {
			method: method.to_string(),
			reason: reason.to_string(),
		}
	}
}

/// Consumer of request results and subscription notifications.
#[async_trait]
pub trait Observer: Send + Sync {
	/// Requests to issue, called on every (re)connect.
	fn requests(&self) -> Vec<Request>;

	async fn observe(&self, request: &Request, result: Value) -> Result<(), Error>;
}

struct Route {
	request: Request,
	observer: Arc<dyn Observer>,
}

#[derive(Default)]
struct Routes {
	pending: HashMap<u64, Route>,
	subscriptions: HashMap<String, Route>,
}

impl Routes {
	async fn dispatch(&mut self, message: Message) -> Result<(), Error> {
		match message {
			Message::Response { id, result } => {
				let route = self
					.pending
					.remove(&id)
					.ok_or(Error::UnmatchedResponse(id))?;
				let result = result.map_err(|error| Error::Rpc {
					method: route.request.method.clone(),
					error,
				})?;
				route.observer.observe(&route.request, result).await
			},
			Message::Notification {
				method,
				subscription: None,
				..
			} => Err(Error::MissingSubscription(method)),
			Message::Notification {
				subscription: Some(subscription),
				result,
				..
			} => {
				let Some(route) = self.subscriptions.get(&subscription) else {
					warn!(%subscription, "Dropping notification of unknown subscription");
					return Ok(());
				};
				route.observer.observe(&route.request, result).await
			},
		}
	}
}

pub struct Router {
	connector: Box<dyn Connector>,
	observers: Vec<Arc<dyn Observer>>,
	ids: RequestIds,
	reconnect: RetryConfig,
	shutdown: Controller<String>,
}

impl Router {
	pub fn new(
		connector: Box<dyn Connector>,
		observers: Vec<Arc<dyn Observer>>,
		reconnect: RetryConfig,
		shutdown: Controller<String>,
	) -> Self {
		Self {
			connector,
			observers,
			ids: RequestIds::default(),
			reconnect,
			shutdown,
		}
	}

	/// Routes until shutdown (`Ok`) or until a fatal error.
	pub async fn run(self) -> Result<(), Error> {
		let mut backoff = self.reconnect.backoff();
		loop {
			let mut connected = false;
			let error = match self.shutdown.with_cancel(self.session(&mut connected)).await {
				Ok(error) => error,
				Err(reason) => {
					info!("Router stopped: {reason}");
					return Ok(());
				},
			};

			if !error.is_transient() {
				error!(%error, "Router failed");
				return Err(error);
			}
			if connected {
				backoff = self.reconnect.backoff();
			}

			let delay = backoff.next().unwrap_or(Duration::from_secs(1));
			warn!(%error, "Reconnecting in {delay:?}");
			if let Err(reason) = self.shutdown.with_cancel(tokio::time::sleep(delay)).await {
				info!("Router stopped: {reason}");
				return Ok(());
			}
		}
	}

	/// Runs one connection until it fails.
	async fn session(&self, connected: &mut bool) -> Error {
		let mut transport = match self.connector.connect().await {
			Ok(transport) => transport,
			Err(error) => return error.into(),
		};
		*connected = true;
		info!("Connected to the node");

		let mut routes = Routes::default();
		if let Err(error) = self.register(transport.as_mut(), &mut routes).await {
			return error;
		}
		loop {
			let message = match receive(transport.as_mut()).await {
				Ok(message) => message,
				Err(error) => return error,
			};
			if let Err(error) = routes.dispatch(message).await {
				return error;
			}
		}
	}

	async fn register(&self, transport: &mut dyn Transport, routes: &mut Routes) -> Result<(), Error> {
		for observer in &self.observers {
			for request in observer.requests() {
				let id = self.ids.next();
				transport.send(request.to_json(id).to_string()).await?;
				let route = Route {
					request,
					observer: observer.clone(),
				};
				if !route.request.is_subscription {
					routes.pending.insert(id, route);
					continue;
				}

				// notifications may arrive before the acknowledgement
				let mut queued = vec![];
				let subscription = loop {
					match receive(transport).await? {
						Message::Response { id: response, result } if response == id => {
							break acknowledged(&route.request.method, result)?
						},
						message => queued.push(message),
					}
				};
				debug!(method = %route.request.method, %subscription, "Subscribed");
				routes.subscriptions.insert(subscription, route);
				for message in queued {
					routes.dispatch(message).await?;
				}
			}
		}
		Ok(())
	}
}

async fn receive(transport: &mut dyn Transport) -> Result<Message, Error> {
	let text = transport.receive().await?;
	Message::parse(&text).map_err(|error| Error::MalformedFrame(error.to_string()))
}

fn acknowledged(method: &str, result: Result<Value, RpcError>) -> Result<String, Error> {
	let result = result.map_err(|error| Error::Rpc {
		method: method.to_string(),
		error,
	})?;
	subscription_id(result).ok_or_else(|| Error::InvalidAcknowledgement(method.to_string()))
}
