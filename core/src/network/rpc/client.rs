use super::{
	configuration::{RPCConfig, RetryConfig},
	observers::HeaderSource,
	Message, Request, RequestIds, AUTHOR_SUBMIT_EXTRINSIC, CHAIN_GET_BLOCK_HASH,
	CHAIN_GET_FINALIZED_HEAD, CHAIN_GET_HEADER, STATE_GET_METADATA, STATE_GET_RUNTIME_VERSION,
	STATE_GET_STORAGE, SYSTEM_CHAIN,
};
use crate::{
	address::Address,
	extrinsic::SignedExtrinsic,
	metadata::Metadata,
	shutdown::Controller,
	storage::{self, AccountInfo, EventRecord},
	types::{ChainState, Header, RuntimeVersion},
};
use async_trait::async_trait;
use color_eyre::{
	eyre::{eyre, WrapErr},
	Result,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sp_core::{Bytes, H256};
use std::sync::Arc;
use tokio_retry::Retry;
use tracing::{debug, info};

/// JSON-RPC over HTTP. Clones share the request id counter.
#[derive(Clone)]
pub struct Client {
	http: reqwest::Client,
	endpoint: String,
	ids: Arc<RequestIds>,
	retry_config: RetryConfig,
	shutdown: Controller<String>,
}

fn at_block(at: Option<H256>) -> Vec<Value> {
	at.map(|hash| vec![json!(hash)]).unwrap_or_default()
}

impl Client {
	pub fn new(config: &RPCConfig, shutdown: Controller<String>) -> Self {
		Self {
			http: reqwest::Client::new(),
			endpoint: config.full_node_http.clone(),
			ids: Default::default(),
			retry_config: config.retry.clone(),
			shutdown,
		}
	}

	async fn request<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
		let id = self.ids.next();
		let text = self
			.http
			.post(&self.endpoint)
			.json(&Request::call(method, params).to_json(id))
			.send()
			.await?
			.error_for_status()?
			.text()
			.await?;

		match Message::parse(&text).wrap_err_with(|| format!("Malformed {method} response"))? {
			Message::Response {
				id: response,
				result,
			} if response == id => {
				let result = result.map_err(|error| eyre!("{method} failed: {error}"))?;
				serde_json::from_value(result).wrap_err_with(|| format!("Cannot decode {method} result"))
			},
			_ => Err(eyre!("{method} response does not answer request {id}")),
		}
	}

	async fn with_retries<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
		match self
			.shutdown
			.with_cancel(Retry::spawn(self.retry_config.clone(), || {
				self.request(method, params.clone())
			}))
			.await
		{
			Ok(result) => result,
			Err(reason) => Err(eyre!(
				"RPC call {method} retry strategy halted due to shutdown: {reason}"
			)),
		}
	}

	pub async fn get_metadata(&self, at: Option<H256>) -> Result<Metadata> {
		let encoded: String = self.with_retries(STATE_GET_METADATA, at_block(at)).await?;
		Metadata::from_hex(&encoded).wrap_err("Cannot decode runtime metadata")
	}

	pub async fn get_block_hash(&self, block_number: u32) -> Result<H256> {
		let hash: Option<H256> = self
			.with_retries(CHAIN_GET_BLOCK_HASH, vec![json!(block_number)])
			.await?;
		hash.ok_or_else(|| eyre!("Block {block_number} not found"))
	}

	pub async fn get_genesis_hash(&self) -> Result<H256> {
		self.get_block_hash(0).await
	}

	pub async fn get_finalized_head_hash(&self) -> Result<H256> {
		self.with_retries(CHAIN_GET_FINALIZED_HEAD, vec![]).await
	}

	pub async fn get_header_by_hash(&self, block_hash: H256) -> Result<Header> {
		let header: Option<Header> = self
			.with_retries(CHAIN_GET_HEADER, vec![json!(block_hash)])
			.await?;
		header.ok_or_else(|| eyre!("Header {block_hash:?} not found"))
	}

	pub async fn get_runtime_version(&self, at: Option<H256>) -> Result<RuntimeVersion> {
		self.with_retries(STATE_GET_RUNTIME_VERSION, at_block(at))
			.await
	}

	pub async fn get_system_chain(&self) -> Result<String> {
		self.with_retries(SYSTEM_CHAIN, vec![]).await
	}

	/// Raw storage value, [`None`] if the key holds nothing.
	pub async fn get_storage(&self, key: &[u8], at: Option<H256>) -> Result<Option<Vec<u8>>> {
		let mut params = vec![json!(format!("0x{}", hex::encode(key)))];
		params.extend(at_block(at));
		let value: Option<Bytes> = self.with_retries(STATE_GET_STORAGE, params).await?;
		Ok(value.map(|bytes| bytes.0))
	}

	/// Storage value decoded with `parse`, [`None`] if the key holds nothing.
	pub async fn get_storage_value<T, E>(
		&self,
		key: &[u8],
		at: Option<H256>,
		parse: impl FnOnce(&[u8]) -> Result<T, E>,
	) -> Result<Option<T>>
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		let Some(bytes) = self.get_storage(key, at).await? else {
			return Ok(None);
		};
		let value = parse(&bytes).wrap_err("Cannot decode storage value")?;
		Ok(Some(value))
	}

	/// [`None`] for accounts that hold nothing.
	pub async fn get_account_info(
		&self,
		metadata: &Metadata,
		address: &Address,
	) -> Result<Option<AccountInfo>> {
		let key = storage::account_info_key(metadata, address)?;
		self.get_storage_value(&key, None, AccountInfo::decode)
			.await
	}

	pub async fn get_system_events(&self, metadata: &Metadata, at: H256) -> Result<Vec<EventRecord>> {
		let key = storage::events_key(metadata)?;
		let events = self
			.get_storage_value(&key, Some(at), |bytes| storage::decode_events(metadata, bytes))
			.await?;
		Ok(events.unwrap_or_default())
	}

	/// Chain state at the latest finalized block.
	pub async fn get_chain_state(&self) -> Result<ChainState> {
		let genesis_hash = self.get_genesis_hash().await?;
		let head = self.get_finalized_head_hash().await?;
		let finalized_header = self.get_header_by_hash(head).await?;
		let runtime_version = self.get_runtime_version(Some(head)).await?;
		let metadata = self.get_metadata(Some(head)).await?;
		info!(
			number = finalized_header.number,
			spec_version = runtime_version.spec_version,
			"Chain state fetched"
		);

		Ok(ChainState {
			metadata: Arc::new(metadata),
			runtime_version,
			genesis_hash,
			finalized_header,
		})
	}

	/// Submits once, a failed submission is not retried.
	pub async fn submit_extrinsic(&self, extrinsic: &SignedExtrinsic) -> Result<String> {
		let encoded = extrinsic.to_hex()?;
		debug!(nonce = extrinsic.nonce(), "Submitting extrinsic");
		match self
			.shutdown
			.with_cancel(self.request(AUTHOR_SUBMIT_EXTRINSIC, vec![json!(encoded)]))
			.await
		{
			Ok(result) => result,
			Err(reason) => Err(eyre!("Extrinsic submission halted due to shutdown: {reason}")),
		}
	}
}

#[async_trait]
impl HeaderSource for Client {
	async fn header(&self, hash: H256) -> Result<Header> {
		self.get_header_by_hash(hash).await
	}
}
