//! Shared chain structs and configuration helpers.
use crate::{
	address::Address,
	crypto::{Signer, Sr25519Signer},
	metadata::Metadata,
	scale::ScaleWriter,
};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use sp_core::{Bytes, H256};
use sp_crypto_hashing::blake2_256;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
	#[serde(default)]
	pub apis: Vec<(String, u32)>,
	pub authoring_version: u32,
	pub impl_name: String,
	pub impl_version: u32,
	pub spec_name: String,
	pub spec_version: u32,
	pub transaction_version: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Digest {
	pub logs: Vec<Bytes>,
}

/// Block header as returned by `chain_getHeader`.
///
/// Digest logs are kept as their raw SCALE encoding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Header {
	pub parent_hash: H256,
	#[serde(with = "hex_number_format")]
	pub number: u32,
	pub state_root: H256,
	pub extrinsics_root: H256,
	#[serde(default)]
	pub digest: Digest,
}

impl Header {
	pub fn encode(&self) -> Vec<u8> {
		let mut writer = ScaleWriter::new();
		writer
			.write_bytes(self.parent_hash.as_bytes())
			.write_compact(self.number.into())
			.write_bytes(self.state_root.as_bytes())
			.write_bytes(self.extrinsics_root.as_bytes())
			.write_length(self.digest.logs.len());
		for log in &self.digest.logs {
			writer.write_bytes(log);
		}
		writer.into_inner()
	}

	/// Block hash, `blake2_256` of the encoded header.
	pub fn hash(&self) -> H256 {
		H256::from(blake2_256(&self.encode()))
	}
}

/// Read-only context for building signed extrinsics.
///
/// Replaced as a whole whenever any part changes.
#[derive(Debug, Clone)]
pub struct ChainState {
	pub metadata: Arc<Metadata>,
	pub runtime_version: RuntimeVersion,
	pub genesis_hash: H256,
	pub finalized_header: Header,
}

#[derive(Clone)]
pub struct IdentityConfig {
	/// Account keypair. (secret is generated if it is not configured)
	pub signer: Arc<Sr25519Signer>,
	/// SS58 address
	pub address: Address,
	/// Hex encoded public key
	pub public_key: String,
}

pub fn load_or_init_suri(path: &str) -> Result<String> {
	#[derive(Default, Serialize, Deserialize)]
	struct Config {
		pub secret_uri: Option<String>,
	}

	let mut config: Config = confy::load_path(path)?;
	info!("Identity loaded from {path}");

	if let Some(suri) = config.secret_uri {
		return Ok(suri);
	};

	let (_, phrase) = Sr25519Signer::generate();
	config.secret_uri = Some(phrase.clone());
	confy::store_path(path, &config)?;
	Ok(phrase)
}

impl IdentityConfig {
	pub fn from_suri(suri: String, password: Option<String>) -> Result<Self> {
		let signer = Sr25519Signer::from_uri(&suri, password.as_deref())
			.map_err(|error| eyre!("Cannot load identity: {error}"))?;
		let address = signer.address();
		let public_key = hex::encode(signer.public_key());

		Ok(IdentityConfig {
			signer: Arc::new(signer),
			address,
			public_key,
		})
	}
}

pub mod hex_number_format {
	use serde::{de, Deserializer, Serializer};
	use std::fmt;

	pub fn serialize<S>(number: &u32, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&format!("{number:#x}"))
	}

	struct NumberVisitor;

	impl de::Visitor<'_> for NumberVisitor {
		type Value = u32;

		fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
			formatter.write_str("a hex encoded or numeric block number")
		}

		fn visit_u64<E: de::Error>(self, value: u64) -> Result<u32, E> {
			u32::try_from(value).map_err(E::custom)
		}

		fn visit_str<E: de::Error>(self, value: &str) -> Result<u32, E> {
			let digits = value.trim_start_matches("0x");
			u32::from_str_radix(digits, 16).map_err(E::custom)
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(NumberVisitor)
	}
}

pub mod tracing_level_format {
	use serde::{self, Deserialize, Deserializer, Serializer};
	use std::str::FromStr;
	use tracing::Level;

	pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&level.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		Level::from_str(&value).map_err(serde::de::Error::custom)
	}
}

pub mod duration_millis_format {
	use super::Duration;
	use serde::{self, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(duration.as_millis() as u64)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = u64::deserialize(deserializer)?;
		Ok(Duration::from_millis(value))
	}
}

/// Parses a `0x` prefixed 32 byte hash.
pub fn parse_hash(value: &str) -> Result<H256> {
	let bytes = hex::decode(value.trim_start_matches("0x"))?;
	if bytes.len() != 32 {
		return Err(eyre!("Expected a 32 byte hash, got {} bytes", bytes.len()));
	}
	Ok(H256::from_slice(&bytes))
}
