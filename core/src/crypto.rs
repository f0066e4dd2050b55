//! Signing capability used by extrinsic construction.
//!
//! The signature primitives come from `sp-core`; this module only adapts
//! them to the [`Signer`] interface and the on-chain signature scheme tags.

use crate::address::{Address, PUBLIC_KEY_LENGTH};
use sp_core::{crypto::ByteArray, ed25519, sr25519, Pair};
use strum::Display;

pub const SIGNATURE_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Invalid secret: {0}")]
	InvalidSecret(String),
}

/// Signature scheme discriminant, as used by `MultiSignature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[repr(u8)]
pub enum SignatureScheme {
	Ed25519 = 0,
	Sr25519 = 1,
	Ecdsa = 2,
}

impl SignatureScheme {
	pub fn discriminant(self) -> u8 {
		self as u8
	}

	pub fn from_discriminant(value: u8) -> Option<Self> {
		match value {
			0 => Some(Self::Ed25519),
			1 => Some(Self::Sr25519),
			2 => Some(Self::Ecdsa),
			_ => None,
		}
	}
}

/// Keypair able to sign messages on behalf of an account.
pub trait Signer: Send + Sync {
	fn scheme(&self) -> SignatureScheme;

	fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH];

	fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH];

	fn address(&self) -> Address {
		Address::from_public(self.public_key())
	}
}

/// Verifies `signature` of `message` made by `public_key`.
///
/// ECDSA keys are 33 bytes long and cannot be expressed here, so ECDSA
/// signatures never verify.
pub fn verify(
	scheme: SignatureScheme,
	public_key: &[u8; PUBLIC_KEY_LENGTH],
	message: &[u8],
	signature: &[u8; SIGNATURE_LENGTH],
) -> bool {
	match scheme {
		SignatureScheme::Sr25519 => sr25519::Pair::verify(
			&sr25519::Signature::from_raw(*signature),
			message,
			&sr25519::Public::from_raw(*public_key),
		),
		SignatureScheme::Ed25519 => ed25519::Pair::verify(
			&ed25519::Signature::from_raw(*signature),
			message,
			&ed25519::Public::from_raw(*public_key),
		),
		SignatureScheme::Ecdsa => false,
	}
}

fn to_public_key(public: &impl ByteArray) -> [u8; PUBLIC_KEY_LENGTH] {
	let mut raw = [0u8; PUBLIC_KEY_LENGTH];
	raw.copy_from_slice(public.as_slice());
	raw
}

fn to_signature(signature: &impl AsRef<[u8]>) -> [u8; SIGNATURE_LENGTH] {
	let mut raw = [0u8; SIGNATURE_LENGTH];
	raw.copy_from_slice(signature.as_ref());
	raw
}

/// Schnorrkel keypair, signing in the `substrate` context.
#[derive(Clone)]
pub struct Sr25519Signer {
	pair: sr25519::Pair,
}

impl Sr25519Signer {
	/// Keypair from a 32 byte mini secret key.
	pub fn from_seed(seed: &[u8; 32]) -> Self {
		Self {
			pair: sr25519::Pair::from_seed(seed),
		}
	}

	/// Keypair from a BIP-39 mnemonic.
	pub fn from_phrase(phrase: &str, password: Option<&str>) -> Result<Self, Error> {
		let (pair, _) = sr25519::Pair::from_phrase(phrase, password)
			.map_err(|error| Error::InvalidSecret(format!("{error:?}")))?;
		Ok(Self { pair })
	}

	/// Keypair from a secret URI such as `//Alice` or `<phrase>//hard/soft`.
	pub fn from_uri(uri: &str, password: Option<&str>) -> Result<Self, Error> {
		let pair = sr25519::Pair::from_string(uri, password)
			.map_err(|error| Error::InvalidSecret(format!("{error:?}")))?;
		Ok(Self { pair })
	}

	/// Generates a fresh keypair, returning it with its mnemonic.
	pub fn generate() -> (Self, String) {
		let (pair, phrase, _) = sr25519::Pair::generate_with_phrase(None);
		(Self { pair }, phrase)
	}
}

impl Signer for Sr25519Signer {
	fn scheme(&self) -> SignatureScheme {
		SignatureScheme::Sr25519
	}

	fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
		to_public_key(&self.pair.public())
	}

	fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
		to_signature(&self.pair.sign(message))
	}
}

/// Ed25519 keypair; signatures are deterministic.
#[derive(Clone)]
pub struct Ed25519Signer {
	pair: ed25519::Pair,
}

impl Ed25519Signer {
	pub fn from_seed(seed: &[u8; 32]) -> Self {
		Self {
			pair: ed25519::Pair::from_seed(seed),
		}
	}

	pub fn from_uri(uri: &str, password: Option<&str>) -> Result<Self, Error> {
		let pair = ed25519::Pair::from_string(uri, password)
			.map_err(|error| Error::InvalidSecret(format!("{error:?}")))?;
		Ok(Self { pair })
	}
}

impl Signer for Ed25519Signer {
	fn scheme(&self) -> SignatureScheme {
		SignatureScheme::Ed25519
	}

	fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
		to_public_key(&self.pair.public())
	}

	fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
		to_signature(&self.pair.sign(message))
	}
}
