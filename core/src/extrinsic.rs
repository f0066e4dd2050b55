//! Signed extrinsic construction.
//!
//! The signature payload is
//! `call ++ era ++ compact(nonce) ++ compact(tip) ++ spec_version ++
//! transaction_version ++ genesis_hash ++ checkpoint`, and the envelope is
//! `compact(len) ++ 0x84 ++ address ++ scheme ++ signature ++ era ++
//! compact(nonce) ++ compact(tip) ++ call`.

mod calls;
mod decode;

use crate::{
	address::PUBLIC_KEY_LENGTH,
	crypto::{SignatureScheme, Signer, SIGNATURE_LENGTH},
	era::Era,
	metadata::{self, ExtrinsicMetadata},
	scale::{self, ScaleReader, ScaleWriter},
	types::ChainState,
};
use sp_core::H256;
use sp_crypto_hashing::blake2_256;
use tracing::debug;

pub use calls::{encode_call, BalanceTransfer, Call, ExpectedArg, ExpectedType, Remark};
pub use decode::{DecodedExtrinsic, ExtrinsicSignature};

pub const EXTRINSIC_FORMAT_VERSION: u8 = 4;
pub const DEFAULT_MORTAL_PERIOD: u64 = 64;

const SIGNED_FLAG: u8 = 0b1000_0000;
const VERSION_MASK: u8 = 0b0111_1111;
/// Longer payloads are signed through their `blake2_256` hash.
const MAX_UNHASHED_PAYLOAD_LENGTH: usize = 256;

/// Signed extensions whose data the payload layout above covers.
const SUPPORTED_SIGNED_EXTENSIONS: [&str; 9] = [
	"CheckNonZeroSender",
	"CheckSpecVersion",
	"CheckTxVersion",
	"CheckGenesis",
	"CheckMortality",
	"CheckEra",
	"CheckNonce",
	"CheckWeight",
	"ChargeTransactionPayment",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Runtime assumption failed: {0}")]
	RuntimeAssumptionFailed(String),
	#[error("Length prefix {declared} does not match the {actual} bytes that follow it")]
	LengthMismatch { declared: usize, actual: usize },
	#[error("Unsupported extrinsic format version {0}")]
	UnsupportedVersion(u8),
	#[error(transparent)]
	Metadata(#[from] metadata::Error),
	#[error(transparent)]
	Scale(#[from] scale::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mortality {
	Immortal,
	/// Valid for about this many blocks after the latest finalized block.
	Mortal(u64),
}

impl Default for Mortality {
	fn default() -> Self {
		Mortality::Mortal(DEFAULT_MORTAL_PERIOD)
	}
}

/// Checks that the runtime uses the extrinsic format this module produces.
pub fn verify_extrinsic_format(extrinsic: &ExtrinsicMetadata) -> Result<(), Error> {
	if extrinsic.version != EXTRINSIC_FORMAT_VERSION {
		return Err(Error::RuntimeAssumptionFailed(format!(
			"extrinsic format version {}",
			extrinsic.version
		)));
	}
	if let Some(unknown) = extrinsic
		.signed_extensions
		.iter()
		.find(|extension| !SUPPORTED_SIGNED_EXTENSIONS.contains(&extension.identifier.as_str()))
	{
		return Err(Error::RuntimeAssumptionFailed(format!(
			"unsupported signed extension {}",
			unknown.identifier
		)));
	}
	Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload<'a> {
	pub call: &'a [u8],
	pub era: Era,
	pub nonce: u32,
	pub tip: u128,
	pub spec_version: u32,
	pub transaction_version: u32,
	pub genesis_hash: H256,
	/// Genesis hash for immortal transactions, otherwise the hash of the
	/// block the era was computed from.
	pub checkpoint: H256,
}

impl SignaturePayload<'_> {
	pub fn encode(&self) -> Vec<u8> {
		let mut writer = ScaleWriter::new();
		writer.write_bytes(self.call);
		self.era.encode_to(&mut writer);
		writer
			.write_compact(self.nonce.into())
			.write_compact(self.tip)
			.write_u32(self.spec_version)
			.write_u32(self.transaction_version)
			.write_bytes(self.genesis_hash.as_bytes())
			.write_bytes(self.checkpoint.as_bytes());
		writer.into_inner()
	}

	/// Bytes handed to the signer.
	pub fn signing_bytes(&self) -> Vec<u8> {
		let payload = self.encode();
		if payload.len() > MAX_UNHASHED_PAYLOAD_LENGTH {
			return blake2_256(&payload).to_vec();
		}
		payload
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedExtrinsic {
	address_index: u8,
	public_key: [u8; PUBLIC_KEY_LENGTH],
	scheme: SignatureScheme,
	signature: [u8; SIGNATURE_LENGTH],
	era: Era,
	nonce: u32,
	tip: u128,
	call: Vec<u8>,
}

impl SignedExtrinsic {
	/// Signs `call` against the given chain state.
	///
	/// Mortal eras start at the parent of the latest finalized header, whose
	/// hash is known without hashing the header.
	pub fn create(
		state: &ChainState,
		signer: &dyn Signer,
		nonce: u32,
		tip: u128,
		mortality: Mortality,
		call: &dyn Call,
	) -> Result<Self, Error> {
		let metadata = &state.metadata;
		verify_extrinsic_format(metadata.extrinsic())?;
		let call = encode_call(metadata, call)?;

		let (era, checkpoint) = match mortality {
			Mortality::Immortal => (Era::Immortal, state.genesis_hash),
			Mortality::Mortal(period) => {
				let header = &state.finalized_header;
				let reference = header.number.saturating_sub(1);
				(Era::mortal(period, reference.into()), header.parent_hash)
			},
		};

		let payload = SignaturePayload {
			call: &call,
			era,
			nonce,
			tip,
			spec_version: state.runtime_version.spec_version,
			transaction_version: state.runtime_version.transaction_version,
			genesis_hash: state.genesis_hash,
			checkpoint,
		};
		let address_index = metadata.multi_address_id_index()?;
		Ok(Self::sign(address_index, signer, &payload))
	}

	/// Signs an already assembled payload.
	pub fn sign(address_index: u8, signer: &dyn Signer, payload: &SignaturePayload) -> Self {
		let signature = signer.sign(&payload.signing_bytes());
		debug!(
			signer = %signer.address(),
			nonce = payload.nonce,
			"Extrinsic signed"
		);
		Self {
			address_index,
			public_key: signer.public_key(),
			scheme: signer.scheme(),
			signature,
			era: payload.era,
			nonce: payload.nonce,
			tip: payload.tip,
			call: payload.call.to_vec(),
		}
	}

	pub fn era(&self) -> Era {
		self.era
	}

	pub fn nonce(&self) -> u32 {
		self.nonce
	}

	pub fn signature(&self) -> &[u8; SIGNATURE_LENGTH] {
		&self.signature
	}

	pub fn call(&self) -> &[u8] {
		&self.call
	}

	/// Length prefixed envelope, ready for submission.
	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		let mut body = ScaleWriter::new();
		body.write_u8(SIGNED_FLAG | EXTRINSIC_FORMAT_VERSION)
			.write_u8(self.address_index)
			.write_bytes(&self.public_key)
			.write_u8(self.scheme.discriminant())
			.write_bytes(&self.signature);
		self.era.encode_to(&mut body);
		body.write_compact(self.nonce.into())
			.write_compact(self.tip)
			.write_bytes(&self.call);

		length_prefixed(self.body_length(), body.as_bytes())
	}

	/// Body length summed from the parts, independent of the writer.
	fn body_length(&self) -> usize {
		let signature_block = 1 + PUBLIC_KEY_LENGTH + 1 + SIGNATURE_LENGTH;
		1 + signature_block +
			self.era.encode().len() +
			scale::encode_compact(self.nonce.into()).len() +
			scale::encode_compact(self.tip).len() +
			self.call.len()
	}

	/// `0x` prefixed hex of the envelope.
	pub fn to_hex(&self) -> Result<String, Error> {
		Ok(format!("0x{}", hex::encode(self.encode()?)))
	}

	/// Transaction hash as reported by the node.
	pub fn hash(&self) -> Result<H256, Error> {
		Ok(H256::from(blake2_256(&self.encode()?)))
	}
}

/// Prefixes `body` with `declared` after checking that they agree.
fn length_prefixed(declared: usize, body: &[u8]) -> Result<Vec<u8>, Error> {
	if declared != body.len() {
		return Err(Error::LengthMismatch {
			declared,
			actual: body.len(),
		});
	}
	let mut envelope = ScaleWriter::new();
	envelope.write_length(declared).write_bytes(body);
	Ok(envelope.into_inner())
}

/// Fails unless the compact length prefix covers exactly the rest of `bytes`.
pub(crate) fn check_length_prefix(bytes: &[u8]) -> Result<(), Error> {
	let mut reader = ScaleReader::new(bytes);
	let declared = reader.read_length()?;
	let actual = reader.remaining();
	if declared != actual {
		return Err(Error::LengthMismatch { declared, actual });
	}
	Ok(())
}
