//! Runtime metadata (v14) registry.
//!
//! The registry is parsed once per runtime version and then only read. Every
//! type id referenced by the metadata is checked to exist at parse time, so
//! lookups by id can only fail for ids supplied by callers.

mod decode;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod types;
mod value;

use crate::{
	address,
	scale::{self, ScaleReader},
	storage::StorageHasher,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub use decode::{ACCOUNT_ID_PATH, MULTI_ADDRESS_PATH};
pub use types::{Field, Primitive, Type, TypeDef, TypeId, Variant};
pub use value::Value;

/// `meta` in little endian.
pub const MAGIC_NUMBER: u32 = 0x6174_656D;
pub const SUPPORTED_VERSION: u8 = 14;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Unsupported metadata: {0}")]
	UnsupportedMetadata(String),
	#[error("{0} not found")]
	NotFound(String),
	#[error("Not implemented: {0}")]
	NotImplemented(String),
	#[error("Unexpected shape: {0}")]
	UnexpectedShape(String),
	#[error("Unknown type id {0}")]
	UnknownType(TypeId),
	#[error("Value nested deeper than {0} levels")]
	TooDeep(usize),
	#[error(transparent)]
	Scale(#[from] scale::Error),
	#[error(transparent)]
	Address(#[from] address::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pallet {
	pub name: String,
	pub index: u8,
	pub storage: Option<PalletStorage>,
	pub calls: Option<TypeId>,
	pub event: Option<TypeId>,
	pub constants: Vec<Constant>,
	pub error: Option<TypeId>,
}

impl Pallet {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		let name = reader.read_string()?;
		let storage = reader.read_option(PalletStorage::decode)?;
		let calls = reader.read_option(types::decode_type_id)?;
		let event = reader.read_option(types::decode_type_id)?;
		let constants = reader.read_vec(Constant::decode)?;
		let error = reader.read_option(types::decode_type_id)?;
		let index = reader.read_u8()?;
		Ok(Self {
			name,
			index,
			storage,
			calls,
			event,
			constants,
			error,
		})
	}

	fn referenced_ids(&self) -> Vec<TypeId> {
		let mut ids: Vec<TypeId> = [self.calls, self.event, self.error]
			.into_iter()
			.flatten()
			.collect();
		ids.extend(self.constants.iter().map(|constant| constant.ty));
		if let Some(storage) = &self.storage {
			for entry in &storage.entries {
				match &entry.ty {
					StorageEntryType::Plain(value) => ids.push(*value),
					StorageEntryType::Map { key, value, .. } => ids.extend([*key, *value]),
				}
			}
		}
		ids
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalletStorage {
	pub prefix: String,
	pub entries: Vec<StorageEntry>,
}

impl PalletStorage {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		Ok(Self {
			prefix: reader.read_string()?,
			entries: reader.read_vec(StorageEntry::decode)?,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageModifier {
	Optional,
	Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEntryType {
	Plain(TypeId),
	Map {
		hashers: Vec<StorageHasher>,
		key: TypeId,
		value: TypeId,
	},
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
	pub name: String,
	pub modifier: StorageModifier,
	pub ty: StorageEntryType,
	pub default: Vec<u8>,
	pub docs: Vec<String>,
}

impl StorageEntry {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		let name = reader.read_string()?;
		let modifier = match reader.read_u8()? {
			0 => StorageModifier::Optional,
			1 => StorageModifier::Default,
			tag => {
				return Err(scale::Error::InvalidEncoding(format!(
					"storage modifier {tag}"
				))
				.into())
			},
		};
		let ty = match reader.read_u8()? {
			0 => StorageEntryType::Plain(types::decode_type_id(reader)?),
			1 => {
				let hashers = reader.read_vec(|r| -> Result<StorageHasher, Error> {
					let tag = r.read_u8()?;
					StorageHasher::from_tag(tag)
						.ok_or_else(|| Error::NotImplemented(format!("storage hasher {tag}")))
				})?;
				let key = types::decode_type_id(reader)?;
				let value = types::decode_type_id(reader)?;
				StorageEntryType::Map {
					hashers,
					key,
					value,
				}
			},
			tag => return Err(Error::NotImplemented(format!("storage entry type {tag}"))),
		};
		Ok(Self {
			name,
			modifier,
			ty,
			default: reader.read_byte_vec()?,
			docs: reader.read_vec(|r| r.read_string())?,
		})
	}

	pub fn value_type(&self) -> TypeId {
		match &self.ty {
			StorageEntryType::Plain(value) | StorageEntryType::Map { value, .. } => *value,
		}
	}

	pub fn hashers(&self) -> &[StorageHasher] {
		match &self.ty {
			StorageEntryType::Plain(_) => &[],
			StorageEntryType::Map { hashers, .. } => hashers,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
	pub name: String,
	pub ty: TypeId,
	pub value: Vec<u8>,
	pub docs: Vec<String>,
}

impl Constant {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		Ok(Self {
			name: reader.read_string()?,
			ty: types::decode_type_id(reader)?,
			value: reader.read_byte_vec()?,
			docs: reader.read_vec(|r| r.read_string())?,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicMetadata {
	pub ty: TypeId,
	pub version: u8,
	pub signed_extensions: Vec<SignedExtension>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedExtension {
	pub identifier: String,
	pub ty: TypeId,
	pub additional_signed: TypeId,
}

impl SignedExtension {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		Ok(Self {
			identifier: reader.read_string()?,
			ty: types::decode_type_id(reader)?,
			additional_signed: types::decode_type_id(reader)?,
		})
	}
}

/// Call or event variant together with the pallet that declares it.
#[derive(Debug, Clone, Copy)]
pub struct PalletVariant<'a> {
	pub pallet: &'a Pallet,
	pub variant: &'a Variant,
}

impl PalletVariant<'_> {
	pub fn pallet_index(&self) -> u8 {
		self.pallet.index
	}

	pub fn index(&self) -> u8 {
		self.variant.index
	}

	pub fn name(&self) -> &str {
		&self.variant.name
	}
}

#[derive(Debug, Clone)]
pub struct Metadata {
	types: HashMap<TypeId, Type>,
	paths: HashMap<String, TypeId>,
	pallets: Vec<Pallet>,
	pallets_by_name: HashMap<String, usize>,
	pallets_by_index: HashMap<u8, usize>,
	extrinsic: ExtrinsicMetadata,
	runtime_type: TypeId,
}

impl Metadata {
	/// Parses a metadata blob as returned by `state_getMetadata`.
	pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
		let mut reader = ScaleReader::new(bytes);
		let magic = reader.read_u32()?;
		if magic != MAGIC_NUMBER {
			return Err(Error::UnsupportedMetadata(format!(
				"magic number {magic:#010x}"
			)));
		}
		let version = reader.read_u8()?;
		if version != SUPPORTED_VERSION {
			return Err(Error::UnsupportedMetadata(format!("version {version}")));
		}

		let registry = reader.read_vec(Type::decode)?;
		let pallets = reader.read_vec(Pallet::decode)?;
		let extrinsic = ExtrinsicMetadata {
			ty: types::decode_type_id(&mut reader)?,
			version: reader.read_u8()?,
			signed_extensions: reader.read_vec(SignedExtension::decode)?,
		};
		let runtime_type = types::decode_type_id(&mut reader)?;
		reader.finish()?;

		let metadata = Self::new(registry, pallets, extrinsic, runtime_type)?;
		debug!(
			types = metadata.types.len(),
			pallets = metadata.pallets.len(),
			"Metadata parsed"
		);
		Ok(metadata)
	}

	/// Parses `0x` prefixed hex encoded metadata.
	pub fn from_hex(value: &str) -> Result<Self, Error> {
		let bytes = hex::decode(value.trim_start_matches("0x"))
			.map_err(|error| scale::Error::InvalidEncoding(error.to_string()))?;
		Self::decode(&bytes)
	}

	fn new(
		types: Vec<Type>,
		pallets: Vec<Pallet>,
		extrinsic: ExtrinsicMetadata,
		runtime_type: TypeId,
	) -> Result<Self, Error> {
		let mut paths = HashMap::new();
		for ty in types.iter().filter(|ty| !ty.path.is_empty()) {
			paths.entry(ty.path_string()).or_insert(ty.id);
		}
		let mut by_id = HashMap::with_capacity(types.len());
		for ty in types {
			if let TypeDef::Variant(variants) = &ty.def {
				let mut indices = HashSet::new();
				if let Some(duplicate) = variants.iter().find(|variant| !indices.insert(variant.index)) {
					return Err(Error::UnexpectedShape(format!(
						"type {} declares variant index {} twice",
						ty.id, duplicate.index
					)));
				}
			}
			let id = ty.id;
			if by_id.insert(id, ty).is_some() {
				return Err(Error::UnexpectedShape(format!("duplicate type id {id}")));
			}
		}

		let mut pallets_by_name = HashMap::new();
		let mut pallets_by_index = HashMap::new();
		for (position, pallet) in pallets.iter().enumerate() {
			if pallets_by_index.insert(pallet.index, position).is_some() {
				return Err(Error::UnexpectedShape(format!(
					"duplicate pallet index {}",
					pallet.index
				)));
			}
			if pallets_by_name
				.insert(pallet.name.to_lowercase(), position)
				.is_some()
			{
				return Err(Error::UnexpectedShape(format!(
					"duplicate pallet name {}",
					pallet.name
				)));
			}
		}

		let metadata = Self {
			types: by_id,
			paths,
			pallets,
			pallets_by_name,
			pallets_by_index,
			extrinsic,
			runtime_type,
		};
		metadata.validate()?;
		Ok(metadata)
	}

	fn validate(&self) -> Result<(), Error> {
		let mut referenced: Vec<TypeId> = self
			.types
			.values()
			.flat_map(|ty| {
				ty.def
					.referenced_ids()
					.into_iter()
					.chain(ty.params.iter().filter_map(|param| param.ty))
			})
			.collect();
		referenced.extend(self.pallets.iter().flat_map(Pallet::referenced_ids));
		referenced.push(self.extrinsic.ty);
		referenced.extend(
			self.extrinsic
				.signed_extensions
				.iter()
				.flat_map(|extension| [extension.ty, extension.additional_signed]),
		);
		referenced.push(self.runtime_type);

		if let Some(missing) = referenced.into_iter().find(|id| !self.types.contains_key(id)) {
			return Err(Error::UnknownType(missing));
		}

		for pallet in &self.pallets {
			for ty in [pallet.calls, pallet.event, pallet.error].into_iter().flatten() {
				self.variants(ty)?;
			}
		}
		Ok(())
	}

	pub fn resolve(&self, id: TypeId) -> Result<&Type, Error> {
		self.types.get(&id).ok_or(Error::UnknownType(id))
	}

	/// First type registered under `path`, e.g. `sp_core::crypto::AccountId32`.
	pub fn type_by_path(&self, path: &str) -> Option<&Type> {
		self.paths.get(path).and_then(|id| self.types.get(id))
	}

	pub fn types(&self) -> impl Iterator<Item = &Type> {
		self.types.values()
	}

	pub fn pallets(&self) -> &[Pallet] {
		&self.pallets
	}

	/// Pallet by name, ignoring case.
	pub fn pallet(&self, name: &str) -> Result<&Pallet, Error> {
		self.pallets_by_name
			.get(&name.to_lowercase())
			.map(|position| &self.pallets[*position])
			.ok_or_else(|| Error::NotFound(format!("pallet {name}")))
	}

	pub fn pallet_by_index(&self, index: u8) -> Result<&Pallet, Error> {
		self.pallets_by_index
			.get(&index)
			.map(|position| &self.pallets[*position])
			.ok_or_else(|| Error::NotFound(format!("pallet with index {index}")))
	}

	pub fn extrinsic(&self) -> &ExtrinsicMetadata {
		&self.extrinsic
	}

	pub fn runtime_type(&self) -> TypeId {
		self.runtime_type
	}

	/// Variants of an enum type.
	pub fn variants(&self, ty: TypeId) -> Result<&[Variant], Error> {
		match &self.resolve(ty)?.def {
			TypeDef::Variant(variants) => Ok(variants),
			other => Err(Error::UnexpectedShape(format!(
				"type {ty} is not a variant: {other:?}"
			))),
		}
	}

	pub fn find_call(&self, pallet: &str, call: &str) -> Result<PalletVariant<'_>, Error> {
		let pallet = self.pallet(pallet)?;
		let calls = self.pallet_variants(pallet, pallet.calls, "calls")?;
		find_variant(pallet, calls, |variant| variant.name == call)
			.ok_or_else(|| Error::NotFound(format!("call {}.{call}", pallet.name)))
	}

	pub fn call_by_index(&self, pallet: u8, call: u8) -> Result<PalletVariant<'_>, Error> {
		let pallet = self.pallet_by_index(pallet)?;
		let calls = self.pallet_variants(pallet, pallet.calls, "calls")?;
		find_variant(pallet, calls, |variant| variant.index == call)
			.ok_or_else(|| Error::NotFound(format!("call {call} of pallet {}", pallet.name)))
	}

	pub fn find_event(&self, pallet: &str, event: &str) -> Result<PalletVariant<'_>, Error> {
		let pallet = self.pallet(pallet)?;
		let events = self.pallet_variants(pallet, pallet.event, "events")?;
		find_variant(pallet, events, |variant| variant.name == event)
			.ok_or_else(|| Error::NotFound(format!("event {}.{event}", pallet.name)))
	}

	pub fn event_by_index(&self, pallet: u8, event: u8) -> Result<PalletVariant<'_>, Error> {
		let pallet = self.pallet_by_index(pallet)?;
		let events = self.pallet_variants(pallet, pallet.event, "events")?;
		find_variant(pallet, events, |variant| variant.index == event)
			.ok_or_else(|| Error::NotFound(format!("event {event} of pallet {}", pallet.name)))
	}

	/// Storage entry together with the storage prefix of its pallet.
	pub fn storage_entry(&self, pallet: &str, item: &str) -> Result<(&str, &StorageEntry), Error> {
		let pallet = self.pallet(pallet)?;
		let storage = pallet
			.storage
			.as_ref()
			.ok_or_else(|| Error::NotFound(format!("storage of pallet {}", pallet.name)))?;
		storage
			.entries
			.iter()
			.find(|entry| entry.name == item)
			.map(|entry| (storage.prefix.as_str(), entry))
			.ok_or_else(|| Error::NotFound(format!("storage {}.{item}", pallet.name)))
	}

	/// Decodes the value of a pallet constant.
	pub fn constant(&self, pallet: &str, name: &str) -> Result<Value, Error> {
		let pallet = self.pallet(pallet)?;
		let constant = pallet
			.constants
			.iter()
			.find(|constant| constant.name == name)
			.ok_or_else(|| Error::NotFound(format!("constant {}.{name}", pallet.name)))?;
		let mut reader = ScaleReader::new(&constant.value);
		let value = self.decode_value(constant.ty, &mut reader)?;
		reader.finish()?;
		Ok(value)
	}

	/// Index of the `Id` variant of the runtime's multi address type.
	pub fn multi_address_id_index(&self) -> Result<u8, Error> {
		let ty = self
			.type_by_path(MULTI_ADDRESS_PATH)
			.ok_or_else(|| Error::NotFound(format!("type {MULTI_ADDRESS_PATH}")))?;
		self.variants(ty.id)?
			.iter()
			.find(|variant| variant.name == "Id")
			.map(|variant| variant.index)
			.ok_or_else(|| Error::NotFound(format!("variant Id of {MULTI_ADDRESS_PATH}")))
	}

	fn pallet_variants(
		&self,
		pallet: &Pallet,
		ty: Option<TypeId>,
		kind: &str,
	) -> Result<&[Variant], Error> {
		let ty = ty.ok_or_else(|| Error::NotFound(format!("{kind} of pallet {}", pallet.name)))?;
		self.variants(ty)
	}
}

fn find_variant<'a>(
	pallet: &'a Pallet,
	variants: &'a [Variant],
	predicate: impl Fn(&Variant) -> bool,
) -> Option<PalletVariant<'a>> {
	variants
		.iter()
		.find(|variant| predicate(*variant))
		.map(|variant| PalletVariant { pallet, variant })
}
