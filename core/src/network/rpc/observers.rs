//! Router observers keeping the latest chain state.

use super::{
	router::{Error, Observer},
	Request, CHAIN_GET_BLOCK_HASH, CHAIN_SUBSCRIBE_FINALIZED_HEADS, STATE_GET_METADATA,
	STATE_SUBSCRIBE_RUNTIME_VERSION,
};
use crate::{
	metadata::Metadata,
	types::{ChainState, Header, RuntimeVersion},
};
use async_trait::async_trait;
use color_eyre::Result;
use mockall::automock;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sp_core::H256;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Capacity of the finalized header fan-out, lagging receivers skip ahead.
pub const FINALIZED_HEADERS_CAPACITY: usize = 1024;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn parse<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, Error> {
	serde_json::from_value(result).map_err(|error| Error::decode(method, error))
}

/// Fetches headers by hash to close gaps between finalized heads.
#[async_trait]
#[automock]
pub trait HeaderSource: Send + Sync {
	async fn header(&self, hash: H256) -> Result<Header>;
}

#[derive(Default)]
struct Parts {
	metadata: Option<Arc<Metadata>>,
	runtime_version: Option<RuntimeVersion>,
	genesis_hash: Option<H256>,
	finalized_header: Option<Header>,
}

impl Parts {
	fn snapshot(&self) -> Option<ChainState> {
		Some(ChainState {
			metadata: self.metadata.clone()?,
			runtime_version: self.runtime_version.clone()?,
			genesis_hash: self.genesis_hash?,
			finalized_header: self.finalized_header.clone()?,
		})
	}
}

/// Latest complete [`ChainState`], replaced as a whole on every change.
pub struct LatestChainState {
	parts: Mutex<Parts>,
	sender: watch::Sender<Option<Arc<ChainState>>>,
}

impl Default for LatestChainState {
	fn default() -> Self {
		Self {
			parts: Mutex::new(Parts::default()),
			sender: watch::Sender::new(None),
		}
	}
}

impl LatestChainState {
	pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ChainState>>> {
		self.sender.subscribe()
	}

	pub fn current(&self) -> Option<Arc<ChainState>> {
		self.sender.borrow().clone()
	}

	/// Applies `change` and publishes a new snapshot once every part is known.
	fn update(&self, change: impl FnOnce(&mut Parts)) {
		let mut parts = lock(&self.parts);
		change(&mut parts);
		if let Some(state) = parts.snapshot() {
			self.sender.send_replace(Some(Arc::new(state)));
		}
	}
}

/// Metadata, genesis hash and runtime version.
pub struct ChainSnapshotObserver {
	state: Arc<LatestChainState>,
	/// Spec version seen on the current connection.
	spec_version: Mutex<Option<u32>>,
}

impl ChainSnapshotObserver {
	pub fn new(state: Arc<LatestChainState>) -> Self {
		Self {
			state,
			spec_version: Mutex::new(None),
		}
	}

	fn runtime_version(&self, version: RuntimeVersion) -> Result<(), Error> {
		let to = version.spec_version;
		let previous = lock(&self.spec_version).replace(to);
		match previous {
			Some(from) if from != to => {
				// metadata is refetched on reconnect
				self.state.update(|parts| {
					parts.metadata = None;
					parts.runtime_version = Some(version);
				});
				Err(Error::RuntimeUpgrade { from, to })
			},
			_ => {
				debug!(spec_version = to, "Runtime version received");
				self.state.update(|parts| parts.runtime_version = Some(version));
				Ok(())
			},
		}
	}
}

#[async_trait]
impl Observer for ChainSnapshotObserver {
	fn requests(&self) -> Vec<Request> {
		lock(&self.spec_version).take();
		vec![
			Request::call(STATE_GET_METADATA, vec![]),
			Request::call(CHAIN_GET_BLOCK_HASH, vec![json!(0)]),
			Request::subscribe(STATE_SUBSCRIBE_RUNTIME_VERSION),
		]
	}

	async fn observe(&self, request: &Request, result: Value) -> Result<(), Error> {
		let method = request.method.as_str();
		match method {
			STATE_GET_METADATA => {
				let encoded: String = parse(method, result)?;
				let metadata = Metadata::from_hex(&encoded).map_err(|error| Error::decode(method, error))?;
				info!(pallets = metadata.pallets().len(), "Runtime metadata loaded");
				self.state.update(|parts| parts.metadata = Some(Arc::new(metadata)));
				Ok(())
			},
			CHAIN_GET_BLOCK_HASH => {
				let genesis_hash: H256 = parse(method, result)?;
				info!(%genesis_hash, "Genesis hash received");
				self.state.update(|parts| parts.genesis_hash = Some(genesis_hash));
				Ok(())
			},
			STATE_SUBSCRIBE_RUNTIME_VERSION => self.runtime_version(parse(method, result)?),
			_ => Err(Error::decode(method, "unexpected method")),
		}
	}
}

/// Finalized heads in ascending order without gaps, fanned out on a
/// broadcast channel.
pub struct FinalizedHeadObserver {
	source: Arc<dyn HeaderSource>,
	state: Arc<LatestChainState>,
	last: Mutex<Option<Header>>,
	sender: broadcast::Sender<Header>,
}

impl FinalizedHeadObserver {
	pub fn new(source: Arc<dyn HeaderSource>, state: Arc<LatestChainState>) -> Self {
		let (sender, _) = broadcast::channel(FINALIZED_HEADERS_CAPACITY);
		Self {
			source,
			state,
			last: Mutex::new(None),
			sender,
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Header> {
		self.sender.subscribe()
	}

	/// `header` preceded by the headers missed since the last known one.
	async fn with_missing(&self, header: Header) -> Result<Vec<Header>, Error> {
		let last = lock(&self.last).clone();
		let Some(last) = last else {
			return Ok(vec![header]);
		};
		if header.number <= last.number {
			debug!(number = header.number, last = last.number, "Ignoring stale finalized header");
			return Ok(vec![]);
		}

		let number = header.number;
		let gap = number - last.number - 1;
		let mut headers = vec![header];
		if gap == 0 {
			return Ok(headers);
		}

		warn!(number, last = last.number, gap, "Finalized headers missed, backfilling");
		let broken = Error::BrokenAncestry {
			number,
			last: last.number,
		};
		for _ in 0..gap {
			let child = headers.last().ok_or_else(|| Error::Backfill("empty backfill".to_string()))?;
			let expected = child.number - 1;
			let parent = self
				.source
				.header(child.parent_hash)
				.await
				.map_err(|error| Error::Backfill(format!("{error:#}")))?;
			if parent.number != expected {
				return Err(broken);
			}
			headers.push(parent);
		}
		if headers.last().map(|header| header.parent_hash) != Some(last.hash()) {
			return Err(broken);
		}

		headers.reverse();
		Ok(headers)
	}
}

#[async_trait]
impl Observer for FinalizedHeadObserver {
	fn requests(&self) -> Vec<Request> {
		vec![Request::subscribe(CHAIN_SUBSCRIBE_FINALIZED_HEADS)]
	}

	async fn observe(&self, request: &Request, result: Value) -> Result<(), Error> {
		let header: Header = parse(&request.method, result)?;
		let headers = self.with_missing(header).await?;
		let Some(newest) = headers.last().cloned() else {
			return Ok(());
		};

		*lock(&self.last) = Some(newest.clone());
		self.state
			.update(|parts| parts.finalized_header = Some(newest));
		for header in headers {
			debug!(number = header.number, "Finalized header");
			// no receivers is fine
			let _ = self.sender.send(header);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		metadata::fixtures,
		network::rpc::{
			router::{tests::reconnect, Router},
			transport::tests::{notification, response, ScriptedConnector},
		},
		shutdown::Controller,
		types::tests::header,
	};
	use color_eyre::eyre::eyre;
	use std::{collections::HashMap, time::Duration};
	use tokio::{sync::mpsc, time::timeout};

	/// Linked headers `first..=last`, each pointing to the hash of the previous one.
	fn chain(first: u32, last: u32) -> Vec<Header> {
		let mut parent = H256::repeat_byte(0xaa);
		let mut headers = vec![];
		for number in first..=last {
			let header = header(number, parent);
			parent = header.hash();
			headers.push(header);
		}
		headers
	}

	fn source(headers: &[Header]) -> MockHeaderSource {
		let by_hash: HashMap<H256, Header> = headers
			.iter()
			.map(|header| (header.hash(), header.clone()))
			.collect();
		let mut source = MockHeaderSource::new();
		source.expect_header().returning(move |hash| {
			let header = by_hash.get(&hash).cloned();
			Box::pin(async move { header.ok_or_else(|| eyre!("unknown block {hash:?}")) })
		});
		source
	}

	fn finalized_heads() -> Request {
		Request::subscribe(CHAIN_SUBSCRIBE_FINALIZED_HEADS)
	}

	async fn observe(observer: &FinalizedHeadObserver, header: &Header) -> Result<(), Error> {
		observer
			.observe(&finalized_heads(), serde_json::to_value(header).unwrap())
			.await
	}

	fn received(receiver: &mut broadcast::Receiver<Header>) -> Vec<u32> {
		let mut numbers = vec![];
		while let Ok(header) = receiver.try_recv() {
			numbers.push(header.number);
		}
		numbers
	}

	#[tokio::test]
	async fn gap_is_backfilled_in_order() {
		let headers = chain(5, 9);
		let observer = FinalizedHeadObserver::new(
			Arc::new(source(&headers[1..4])),
			Arc::new(LatestChainState::default()),
		);
		let mut receiver = observer.subscribe();

		observe(&observer, &headers[0]).await.unwrap();
		observe(&observer, &headers[4]).await.unwrap();
		assert_eq!(received(&mut receiver), vec![5, 6, 7, 8, 9]);

		// already known
		observe(&observer, &headers[4]).await.unwrap();
		observe(&observer, &headers[2]).await.unwrap();
		assert!(received(&mut receiver).is_empty());
	}

	#[tokio::test]
	async fn consecutive_heads_need_no_source() {
		let headers = chain(1, 3);
		let mut source = MockHeaderSource::new();
		source.expect_header().never();
		let observer = FinalizedHeadObserver::new(Arc::new(source), Arc::new(LatestChainState::default()));
		let mut receiver = observer.subscribe();

		for header in &headers {
			observe(&observer, header).await.unwrap();
		}
		assert_eq!(received(&mut receiver), vec![1, 2, 3]);
	}

	#[tokio::test]
	async fn unavailable_source_fails_transiently() {
		let headers = chain(5, 9);
		let observer = FinalizedHeadObserver::new(
			Arc::new(source(&headers[2..4])),
			Arc::new(LatestChainState::default()),
		);
		let mut receiver = observer.subscribe();

		observe(&observer, &headers[0]).await.unwrap();
		let error = observe(&observer, &headers[4]).await.unwrap_err();
		assert!(matches!(error, Error::Backfill(_)));
		assert!(error.is_transient());
		assert_eq!(received(&mut receiver), vec![5]);

		// nothing was emitted, so the next head retries the whole gap
		let observer_last = lock(&observer.last).as_ref().map(|header| header.number);
		assert_eq!(observer_last, Some(5));
	}

	#[tokio::test]
	async fn foreign_chain_is_fatal() {
		let known = chain(5, 5);
		let fork = {
			// linked onto an unknown block 5
			let mut parent = H256::repeat_byte(0xbb);
			chain(6, 9)
				.into_iter()
				.map(|mut header| {
					header.parent_hash = parent;
					parent = header.hash();
					header
				})
				.collect::<Vec<_>>()
		};
		let observer = FinalizedHeadObserver::new(
			Arc::new(source(&fork[..3])),
			Arc::new(LatestChainState::default()),
		);

		observe(&observer, &known[0]).await.unwrap();
		let error = observe(&observer, &fork[3]).await.unwrap_err();
		assert!(matches!(error, Error::BrokenAncestry { number: 9, last: 5 }));
		assert!(!error.is_transient());
	}

	#[tokio::test]
	async fn router_delivers_gap_exactly_once() {
		let headers = chain(5, 9);
		let state = Arc::new(LatestChainState::default());
		let observer = Arc::new(FinalizedHeadObserver::new(
			Arc::new(source(&headers[1..4])),
			state.clone(),
		));
		let mut receiver = observer.subscribe();
		let (push, pushed) = mpsc::unbounded_channel();
		let connector =
			ScriptedConnector::new(|id, _, _| vec![response(id, json!("heads"))], vec![pushed]);
		let shutdown = Controller::new();
		let router = Router::new(
			Box::new(connector),
			vec![observer.clone() as Arc<dyn Observer>],
			reconnect(),
			shutdown.clone(),
		);
		let task = tokio::spawn(router.run());

		for header in [&headers[0], &headers[4]] {
			let header = serde_json::to_value(header).unwrap();
			push.send(notification("chain_finalizedHead", "heads", header))
				.unwrap();
		}
		let mut numbers = vec![];
		while numbers.len() < 5 {
			let header = timeout(Duration::from_secs(5), receiver.recv()).await.unwrap();
			numbers.push(header.unwrap().number);
		}
		assert_eq!(numbers, vec![5, 6, 7, 8, 9]);

		shutdown.trigger_shutdown("test".to_string()).unwrap();
		assert!(timeout(Duration::from_secs(5), task).await.unwrap().unwrap().is_ok());
		assert!(receiver.try_recv().is_err());
	}

	fn runtime_version(spec_version: u32) -> Value {
		json!({
			"specName": "node",
			"implName": "node",
			"authoringVersion": 1,
			"specVersion": spec_version,
			"implVersion": 1,
			"apis": [],
			"transactionVersion": 1,
		})
	}

	#[tokio::test]
	async fn snapshot_is_published_once_complete() {
		let state = Arc::new(LatestChainState::default());
		let snapshot = ChainSnapshotObserver::new(state.clone());
		let heads = FinalizedHeadObserver::new(Arc::new(MockHeaderSource::new()), state.clone());
		let mut watcher = state.subscribe();
		let requests = snapshot.requests();
		assert_eq!(requests.len(), 3);

		let metadata = format!("0x{}", hex::encode(fixtures::metadata_bytes()));
		snapshot.observe(&requests[0], json!(metadata)).await.unwrap();
		snapshot
			.observe(&requests[1], json!(format!("0x{}", "91".repeat(32))))
			.await
			.unwrap();
		snapshot.observe(&requests[2], runtime_version(100)).await.unwrap();
		assert!(state.current().is_none());

		observe(&heads, &chain(101, 101)[0]).await.unwrap();
		assert!(watcher.has_changed().unwrap());
		let current = watcher.borrow_and_update().clone().unwrap();
		assert_eq!(current.runtime_version.spec_version, 100);
		assert_eq!(current.genesis_hash, H256::repeat_byte(0x91));
		assert_eq!(current.finalized_header.number, 101);
		assert!(current.metadata.pallet("balances").is_ok());
	}

	#[tokio::test]
	async fn runtime_upgrade_forces_rebuild() {
		let state = Arc::new(LatestChainState::default());
		let snapshot = ChainSnapshotObserver::new(state.clone());
		let requests = snapshot.requests();
		let subscription = &requests[2];

		snapshot.observe(subscription, runtime_version(100)).await.unwrap();
		snapshot.observe(subscription, runtime_version(100)).await.unwrap();
		let error = snapshot
			.observe(subscription, runtime_version(101))
			.await
			.unwrap_err();
		assert!(matches!(error, Error::RuntimeUpgrade { from: 100, to: 101 }));
		assert!(error.is_transient());

		// the rebuilt connection starts from the new version
		let requests = snapshot.requests();
		assert!(snapshot.observe(&requests[2], runtime_version(101)).await.is_ok());
	}

	#[tokio::test]
	async fn undecodable_metadata_is_fatal() {
		let snapshot = ChainSnapshotObserver::new(Arc::new(LatestChainState::default()));
		let requests = snapshot.requests();
		let error = snapshot
			.observe(&requests[0], json!("0x00112233"))
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Decode { .. }));
		assert!(!error.is_transient());
	}
}
