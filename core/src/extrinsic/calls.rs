//! Calls the client knows how to encode.
//!
//! Every call declares the argument shape it encodes for. The shape is
//! checked against the runtime metadata before anything gets signed, so a
//! runtime that changed a call signature is detected instead of receiving
//! mis-encoded arguments.

use super::Error;
use crate::{
	address::Address,
	metadata::{
		Metadata, PalletVariant, Primitive, TypeDef, TypeId, ACCOUNT_ID_PATH, MULTI_ADDRESS_PATH,
	},
	scale::ScaleWriter,
};
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
	Primitive(Primitive),
	Compact(Primitive),
	/// `Vec<u8>`
	Bytes,
	AccountId,
	/// Multi address with an `Id` variant holding an account id.
	MultiAddress,
}

impl Display for ExpectedType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExpectedType::Primitive(primitive) => write!(f, "{primitive}"),
			ExpectedType::Compact(primitive) => write!(f, "Compact<{primitive}>"),
			ExpectedType::Bytes => f.write_str("Vec<u8>"),
			ExpectedType::AccountId => f.write_str(ACCOUNT_ID_PATH),
			ExpectedType::MultiAddress => f.write_str(MULTI_ADDRESS_PATH),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedArg {
	pub name: &'static str,
	pub ty: ExpectedType,
}

impl ExpectedArg {
	pub const fn new(name: &'static str, ty: ExpectedType) -> Self {
		Self { name, ty }
	}
}

pub trait Call {
	fn pallet(&self) -> &str;

	fn name(&self) -> &str;

	/// Positional arguments, as the call is declared in the runtime.
	fn expected_args(&self) -> Vec<ExpectedArg>;

	fn encode_args(&self, metadata: &Metadata, writer: &mut ScaleWriter) -> Result<(), Error>;
}

/// Encodes `pallet index ++ call index ++ arguments` after checking the
/// call's declared arguments against the metadata.
pub fn encode_call(metadata: &Metadata, call: &dyn Call) -> Result<Vec<u8>, Error> {
	let resolved = metadata.find_call(call.pallet(), call.name())?;
	verify_args(metadata, resolved, &call.expected_args())?;

	let mut writer = ScaleWriter::new();
	writer.write_u8(resolved.pallet_index()).write_u8(resolved.index());
	call.encode_args(metadata, &mut writer)?;
	Ok(writer.into_inner())
}

fn verify_args(
	metadata: &Metadata,
	call: PalletVariant<'_>,
	expected: &[ExpectedArg],
) -> Result<(), Error> {
	let name = format!("{}.{}", call.pallet.name, call.name());
	let fields = &call.variant.fields;
	if fields.len() != expected.len() {
		return Err(Error::RuntimeAssumptionFailed(format!(
			"{name} takes {} arguments, expected {}",
			fields.len(),
			expected.len()
		)));
	}

	for (field, expected) in fields.iter().zip(expected) {
		if field.name.as_deref() != Some(expected.name) {
			return Err(Error::RuntimeAssumptionFailed(format!(
				"{name} argument {:?} found where {} was expected",
				field.name, expected.name
			)));
		}
		if !matches_type(metadata, field.ty, expected.ty)? {
			return Err(Error::RuntimeAssumptionFailed(format!(
				"{name} argument {} is not {}",
				expected.name, expected.ty
			)));
		}
	}
	Ok(())
}

fn matches_type(metadata: &Metadata, ty: TypeId, expected: ExpectedType) -> Result<bool, Error> {
	let resolved = metadata.resolve(ty)?;
	let matches = match (expected, &resolved.def) {
		(ExpectedType::AccountId, _) => resolved.path_string() == ACCOUNT_ID_PATH,
		(ExpectedType::MultiAddress, TypeDef::Variant(variants)) => {
			if resolved.path_string() != MULTI_ADDRESS_PATH {
				return Ok(false);
			}
			let Some(id) = variants.iter().find(|variant| variant.name == "Id") else {
				return Ok(false);
			};
			match id.fields.as_slice() {
				[field] => matches_type(metadata, field.ty, ExpectedType::AccountId)?,
				_ => false,
			}
		},
		(ExpectedType::Bytes, TypeDef::Sequence(element)) => {
			is_primitive(metadata, *element, Primitive::U8)?
		},
		(ExpectedType::Compact(primitive), TypeDef::Compact(inner)) => {
			is_primitive(metadata, *inner, primitive)?
		},
		(ExpectedType::Primitive(primitive), TypeDef::Primitive(actual)) => primitive == *actual,
		_ => false,
	};
	Ok(matches)
}

fn is_primitive(metadata: &Metadata, ty: TypeId, primitive: Primitive) -> Result<bool, Error> {
	Ok(metadata.resolve(ty)?.def == TypeDef::Primitive(primitive))
}

/// `Balances.transfer_keep_alive` or `Balances.transfer_allow_death`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceTransfer {
	pub dest: Address,
	pub value: u128,
	pub keep_alive: bool,
}

impl BalanceTransfer {
	const ARGS: [ExpectedArg; 2] = [
		ExpectedArg::new("dest", ExpectedType::MultiAddress),
		ExpectedArg::new("value", ExpectedType::Compact(Primitive::U128)),
	];

	/// Transfer that fails rather than reaping the sender account.
	pub fn keep_alive(dest: Address, value: u128) -> Self {
		Self {
			dest,
			value,
			keep_alive: true,
		}
	}

	pub fn allow_death(dest: Address, value: u128) -> Self {
		Self {
			dest,
			value,
			keep_alive: false,
		}
	}
}

impl Call for BalanceTransfer {
	fn pallet(&self) -> &str {
		"Balances"
	}

	fn name(&self) -> &str {
		if self.keep_alive {
			"transfer_keep_alive"
		} else {
			"transfer_allow_death"
		}
	}

	fn expected_args(&self) -> Vec<ExpectedArg> {
		Self::ARGS.to_vec()
	}

	fn encode_args(&self, metadata: &Metadata, writer: &mut ScaleWriter) -> Result<(), Error> {
		writer
			.write_u8(metadata.multi_address_id_index()?)
			.write_bytes(self.dest.raw())
			.write_compact(self.value);
		Ok(())
	}
}

/// `System.remark`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remark {
	pub remark: Vec<u8>,
}

impl Call for Remark {
	fn pallet(&self) -> &str {
		"System"
	}

	fn name(&self) -> &str {
		"remark"
	}

	fn expected_args(&self) -> Vec<ExpectedArg> {
		vec![ExpectedArg::new("remark", ExpectedType::Bytes)]
	}

	fn encode_args(&self, _: &Metadata, writer: &mut ScaleWriter) -> Result<(), Error> {
		writer.write_byte_vec(&self.remark);
		Ok(())
	}
}
