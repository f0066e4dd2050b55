//! SS58 account address codec.
//!
//! An address is the Base58 (Bitcoin alphabet) rendering of
//! `prefix ++ public key ++ checksum`, where the checksum is the first two
//! bytes of `blake2b_512("SS58PRE" ++ prefix ++ public key)`. Prefixes
//! below 64 take one byte, larger ones the two byte form flagged by bit
//! `0x40` of the first byte.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sp_crypto_hashing::blake2_512;
use std::{
	fmt::{self, Display},
	hash::{Hash, Hasher},
	str::FromStr,
};

/// Generic Substrate network prefix.
pub const DEFAULT_NETWORK_PREFIX: u16 = 42;
/// Largest prefix the two byte form can carry.
pub const MAX_NETWORK_PREFIX: u16 = 0x3fff;
pub const PUBLIC_KEY_LENGTH: usize = 32;

const CHECKSUM_CONTEXT: &[u8; 7] = b"SS58PRE";
const CHECKSUM_LENGTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Address is not valid Base58: {0}")]
	InvalidBase58(String),
	#[error("Invalid address: expected a {PUBLIC_KEY_LENGTH} byte public key, found {0} bytes")]
	InvalidAddress(usize),
	#[error("Address checksum does not match")]
	InvalidChecksum,
	#[error("Network prefix {0} exceeds {MAX_NETWORK_PREFIX}")]
	InvalidPrefix(u16),
}

/// Account address: the raw public key and its checksummed display form.
///
/// Two addresses are equal when their raw keys are equal, the display string
/// depends on the network prefix.
#[derive(Debug, Clone, Eq)]
pub struct Address {
	display: String,
	raw: [u8; PUBLIC_KEY_LENGTH],
}

impl Address {
	/// Address of `public_key` on the generic Substrate network.
	pub fn from_public(public_key: [u8; PUBLIC_KEY_LENGTH]) -> Self {
		Self::encode(public_key, DEFAULT_NETWORK_PREFIX)
	}

	pub fn with_prefix(public_key: [u8; PUBLIC_KEY_LENGTH], prefix: u16) -> Result<Self, Error> {
		if prefix > MAX_NETWORK_PREFIX {
			return Err(Error::InvalidPrefix(prefix));
		}
		Ok(Self::encode(public_key, prefix))
	}

	fn encode(public_key: [u8; PUBLIC_KEY_LENGTH], prefix: u16) -> Self {
		let mut payload = prefix_bytes(prefix);
		payload.extend_from_slice(&public_key);
		let checksum = checksum(&payload);
		payload.extend_from_slice(&checksum);

		Self {
			display: bs58::encode(payload).into_string(),
			raw: public_key,
		}
	}

	/// Decodes an SS58 string and verifies its checksum.
	pub fn parse(value: &str) -> Result<Self, Error> {
		let (decoded, prefix_len) = decode_payload(value)?;
		let (body, actual) = decoded.split_at(decoded.len() - CHECKSUM_LENGTH);
		if checksum(body) != actual {
			return Err(Error::InvalidChecksum);
		}
		Self::from_body(value, &body[prefix_len..])
	}

	/// Decodes an SS58 string checking only the payload length.
	///
	/// Accepts addresses produced by encoders that compute the checksum
	/// differently.
	pub fn parse_unverified(value: &str) -> Result<Self, Error> {
		let (decoded, prefix_len) = decode_payload(value)?;
		Self::from_body(value, &decoded[prefix_len..decoded.len() - CHECKSUM_LENGTH])
	}

	pub fn raw(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
		&self.raw
	}

	pub fn as_str(&self) -> &str {
		&self.display
	}

	fn from_body(value: &str, key: &[u8]) -> Result<Self, Error> {
		let raw = <[u8; PUBLIC_KEY_LENGTH]>::try_from(key)
			.map_err(|_| Error::InvalidAddress(key.len()))?;
		Ok(Self {
			display: value.to_string(),
			raw,
		})
	}
}

/// `prefix` must not exceed [`MAX_NETWORK_PREFIX`].
fn prefix_bytes(prefix: u16) -> Vec<u8> {
	if prefix < 64 {
		return vec![prefix as u8];
	}
	let first = ((prefix & 0b0000_0000_1111_1100) >> 2) as u8 | 0b0100_0000;
	let second = (prefix >> 8) as u8 | ((prefix & 0b0000_0000_0000_0011) as u8) << 6;
	vec![first, second]
}

/// Returns the Base58 decoded bytes and the length of the network prefix.
fn decode_payload(value: &str) -> Result<(Vec<u8>, usize), Error> {
	let decoded = bs58::decode(value)
		.into_vec()
		.map_err(|error| Error::InvalidBase58(error.to_string()))?;
	let Some(first) = decoded.first() else {
		return Err(Error::InvalidAddress(0));
	};
	let prefix_len = if first & 0b0100_0000 != 0 { 2 } else { 1 };
	if decoded.len() < prefix_len + CHECKSUM_LENGTH {
		return Err(Error::InvalidAddress(0));
	}
	Ok((decoded, prefix_len))
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LENGTH] {
	let mut preimage = Vec::with_capacity(CHECKSUM_CONTEXT.len() + payload.len());
	preimage.extend_from_slice(CHECKSUM_CONTEXT);
	preimage.extend_from_slice(payload);
	let hash = blake2_512(&preimage);
	[hash[0], hash[1]]
}

impl PartialEq for Address {
	fn eq(&self, other: &Self) -> bool {
		self.raw == other.raw
	}
}

impl Hash for Address {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.raw.hash(state)
	}
}

impl Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.display)
	}
}

impl FromStr for Address {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		Self::parse(value)
	}
}

impl From<[u8; PUBLIC_KEY_LENGTH]> for Address {
	fn from(public_key: [u8; PUBLIC_KEY_LENGTH]) -> Self {
		Self::from_public(public_key)
	}
}

impl Serialize for Address {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.display)
	}
}

impl<'de> Deserialize<'de> for Address {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = String::deserialize(deserializer)?;
		Self::parse(&value).map_err(serde::de::Error::custom)
	}
}
