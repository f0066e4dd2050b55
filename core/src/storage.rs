//! Storage keys and the storage values the client reads directly.

use crate::{
	address::Address,
	metadata::{self, Metadata, Value},
	scale::{self, ScaleReader},
};
use serde::Serialize;
use sp_crypto_hashing::{blake2_128, blake2_256, twox_128, twox_256, twox_64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum StorageHasher {
	Blake2_128,
	Blake2_256,
	Blake2_128Concat,
	Twox128,
	Twox256,
	Twox64Concat,
	Identity,
}

impl StorageHasher {
	pub fn from_tag(tag: u8) -> Option<Self> {
		use StorageHasher::*;
		let hasher = match tag {
			0 => Blake2_128,
			1 => Blake2_256,
			2 => Blake2_128Concat,
			3 => Twox128,
			4 => Twox256,
			5 => Twox64Concat,
			6 => Identity,
			_ => return None,
		};
		Some(hasher)
	}

	pub fn hash(&self, data: &[u8]) -> Vec<u8> {
		match self {
			StorageHasher::Blake2_128 => blake2_128(data).to_vec(),
			StorageHasher::Blake2_256 => blake2_256(data).to_vec(),
			StorageHasher::Blake2_128Concat => [&blake2_128(data)[..], data].concat(),
			StorageHasher::Twox128 => twox_128(data).to_vec(),
			StorageHasher::Twox256 => twox_256(data).to_vec(),
			StorageHasher::Twox64Concat => [&twox_64(data)[..], data].concat(),
			StorageHasher::Identity => data.to_vec(),
		}
	}
}

/// `twox128(pallet) ++ twox128(item)`
pub fn storage_prefix(pallet: &str, item: &str) -> Vec<u8> {
	[twox_128(pallet.as_bytes()), twox_128(item.as_bytes())].concat()
}

/// Builds the key of a storage item, hashing each encoded map key with the
/// hasher the metadata declares for it.
pub fn storage_key(
	metadata: &Metadata,
	pallet: &str,
	item: &str,
	keys: &[&[u8]],
) -> Result<Vec<u8>, metadata::Error> {
	let (prefix, entry) = metadata.storage_entry(pallet, item)?;
	let hashers = entry.hashers();
	if hashers.len() != keys.len() {
		return Err(metadata::Error::UnexpectedShape(format!(
			"storage {pallet}.{item} expects {} keys, got {}",
			hashers.len(),
			keys.len()
		)));
	}

	let mut key = storage_prefix(prefix, &entry.name);
	for (hasher, encoded) in hashers.iter().zip(keys) {
		key.extend(hasher.hash(encoded));
	}
	Ok(key)
}

pub fn account_info_key(metadata: &Metadata, address: &Address) -> Result<Vec<u8>, metadata::Error> {
	storage_key(metadata, "System", "Account", &[address.raw()])
}

pub fn events_key(metadata: &Metadata) -> Result<Vec<u8>, metadata::Error> {
	storage_key(metadata, "System", "Events", &[])
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountData {
	pub free: u128,
	pub reserved: u128,
	pub frozen: u128,
	pub flags: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
	pub nonce: u32,
	pub consumers: u32,
	pub providers: u32,
	pub sufficients: u32,
	pub data: AccountData,
}

impl AccountInfo {
	pub fn decode(bytes: &[u8]) -> scale::Result<Self> {
		let mut reader = ScaleReader::new(bytes);
		let info = Self {
			nonce: reader.read_u32()?,
			consumers: reader.read_u32()?,
			providers: reader.read_u32()?,
			sufficients: reader.read_u32()?,
			data: AccountData {
				free: reader.read_u128()?,
				reserved: reader.read_u128()?,
				frozen: reader.read_u128()?,
				flags: reader.read_u128()?,
			},
		};
		reader.finish()?;
		Ok(info)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
	ApplyExtrinsic(u32),
	Finalization,
	Initialization,
}

impl Phase {
	fn decode(reader: &mut ScaleReader) -> scale::Result<Self> {
		match reader.read_u8()? {
			0 => Ok(Phase::ApplyExtrinsic(reader.read_u32()?)),
			1 => Ok(Phase::Finalization),
			2 => Ok(Phase::Initialization),
			other => Err(scale::Error::InvalidEncoding(format!("{other} is not a phase"))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
	pub phase: Phase,
	pub pallet: String,
	pub event: String,
	pub fields: Option<Value>,
	#[serde(with = "hex_hashes")]
	pub topics: Vec<[u8; 32]>,
}

impl EventRecord {
	pub fn is(&self, pallet: &str, event: &str) -> bool {
		self.pallet == pallet && self.event == event
	}
}

/// Decodes the `System.Events` storage value.
pub fn decode_events(metadata: &Metadata, bytes: &[u8]) -> Result<Vec<EventRecord>, metadata::Error> {
	let mut reader = ScaleReader::new(bytes);
	let events = reader.read_vec(|reader| -> Result<EventRecord, metadata::Error> {
		let phase = Phase::decode(reader)?;
		let pallet_index = reader.read_u8()?;
		let event_index = reader.read_u8()?;
		let event = metadata.event_by_index(pallet_index, event_index)?;
		let fields = metadata.decode_fields(&event.variant.fields, reader)?;
		let topics = reader.read_vec(|reader| reader.read_array::<32>())?;
		Ok(EventRecord {
			phase,
			pallet: event.pallet.name.clone(),
			event: event.name().to_string(),
			fields,
			topics,
		})
	})?;
	reader.finish()?;
	Ok(events)
}

mod hex_hashes {
	use serde::Serializer;

	pub fn serialize<S>(hashes: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_seq(hashes.iter().map(|hash| format!("0x{}", hex::encode(hash))))
	}
}
