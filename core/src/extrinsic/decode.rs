use super::{check_length_prefix, Error, EXTRINSIC_FORMAT_VERSION, SIGNED_FLAG, VERSION_MASK};
use crate::{
	address::Address,
	crypto::{SignatureScheme, SIGNATURE_LENGTH},
	era::Era,
	metadata::{self, Metadata, Value},
	scale::{self, ScaleReader},
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtrinsicSignature {
	pub address: Address,
	#[serde(serialize_with = "serialize_scheme")]
	pub scheme: SignatureScheme,
	#[serde(serialize_with = "serialize_signature")]
	pub signature: [u8; SIGNATURE_LENGTH],
	#[serde(skip)]
	pub era: Era,
	pub nonce: u128,
	pub tip: u128,
}

impl ExtrinsicSignature {
	fn decode(metadata: &Metadata, reader: &mut ScaleReader) -> Result<Self, Error> {
		let address_index = reader.read_u8()?;
		if address_index != metadata.multi_address_id_index()? {
			return Err(metadata::Error::NotImplemented(format!(
				"multi address variant {address_index}"
			))
			.into());
		}
		let address = Address::from_public(reader.read_array()?);

		let scheme_index = reader.read_u8()?;
		let scheme = match SignatureScheme::from_discriminant(scheme_index) {
			Some(SignatureScheme::Ecdsa) => {
				return Err(metadata::Error::NotImplemented("ECDSA signatures".to_string()).into())
			},
			Some(scheme) => scheme,
			None => {
				return Err(scale::Error::InvalidEncoding(format!(
					"{scheme_index} is not a signature scheme"
				))
				.into())
			},
		};

		Ok(Self {
			address,
			scheme,
			signature: reader.read_array()?,
			era: Era::decode(reader)?,
			nonce: reader.read_compact_big()?,
			tip: reader.read_compact_big()?,
		})
	}
}

/// Extrinsic decoded through the runtime metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedExtrinsic {
	pub signature: Option<ExtrinsicSignature>,
	pub pallet: String,
	pub call: String,
	pub args: Vec<(String, Value)>,
}

impl DecodedExtrinsic {
	pub fn decode(metadata: &Metadata, bytes: &[u8]) -> Result<Self, Error> {
		check_length_prefix(bytes)?;
		let mut reader = ScaleReader::new(bytes);
		reader.read_length()?;

		let version = reader.read_u8()?;
		if version & VERSION_MASK != EXTRINSIC_FORMAT_VERSION {
			return Err(Error::UnsupportedVersion(version & VERSION_MASK));
		}
		let signature = if version & SIGNED_FLAG != 0 {
			Some(ExtrinsicSignature::decode(metadata, &mut reader)?)
		} else {
			None
		};

		let pallet_index = reader.read_u8()?;
		let call_index = reader.read_u8()?;
		let call = metadata.call_by_index(pallet_index, call_index)?;
		let mut args = Vec::with_capacity(call.variant.fields.len());
		for (position, field) in call.variant.fields.iter().enumerate() {
			let name = field
				.name
				.clone()
				.unwrap_or_else(|| position.to_string());
			args.push((name, metadata.decode_field(field, &mut reader)?));
		}
		reader.finish()?;

		Ok(Self {
			signature,
			pallet: call.pallet.name.clone(),
			call: call.name().to_string(),
			args,
		})
	}

	pub fn arg(&self, name: &str) -> Option<&Value> {
		self.args
			.iter()
			.find(|(arg, _)| arg == name)
			.map(|(_, value)| value)
	}

	pub fn is_signed(&self) -> bool {
		self.signature.is_some()
	}
}

fn serialize_scheme<S: serde::Serializer>(
	scheme: &SignatureScheme,
	serializer: S,
) -> Result<S::Ok, S::Error> {
	serializer.collect_str(scheme)
}

fn serialize_signature<S: serde::Serializer>(
	signature: &[u8; SIGNATURE_LENGTH],
	serializer: S,
) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&format!("0x{}", hex::encode(signature)))
}
