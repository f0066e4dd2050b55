//! Portable type registry entries.

use super::Error;
use crate::scale::ScaleReader;
use strum::Display;

pub type TypeId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
	pub id: TypeId,
	pub path: Vec<String>,
	pub params: Vec<TypeParameter>,
	pub def: TypeDef,
	pub docs: Vec<String>,
}

impl Type {
	/// Module path joined with `::`, empty for anonymous types.
	pub fn path_string(&self) -> String {
		self.path.join("::")
	}

	/// Last segment of the path.
	pub fn name(&self) -> Option<&str> {
		self.path.last().map(String::as_str)
	}

	pub(crate) fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		let id = decode_type_id(reader)?;
		let path = reader.read_vec(|r| r.read_string())?;
		let params = reader.read_vec(TypeParameter::decode)?;
		let def = TypeDef::decode(reader)?;
		let docs = reader.read_vec(|r| r.read_string())?;
		Ok(Self {
			id,
			path,
			params,
			def,
			docs,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
	pub name: String,
	pub ty: Option<TypeId>,
}

impl TypeParameter {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		Ok(Self {
			name: reader.read_string()?,
			ty: reader.read_option(decode_type_id)?,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
	Composite(Vec<Field>),
	Variant(Vec<Variant>),
	Sequence(TypeId),
	Array { len: u32, ty: TypeId },
	Tuple(Vec<TypeId>),
	Primitive(Primitive),
	Compact(TypeId),
	BitSequence { store: TypeId, order: TypeId },
}

impl TypeDef {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		let def = match reader.read_u8()? {
			0 => TypeDef::Composite(reader.read_vec(Field::decode)?),
			1 => TypeDef::Variant(reader.read_vec(Variant::decode)?),
			2 => TypeDef::Sequence(decode_type_id(reader)?),
			3 => {
				let len = reader.read_u32()?;
				let ty = decode_type_id(reader)?;
				TypeDef::Array { len, ty }
			},
			4 => TypeDef::Tuple(reader.read_vec(decode_type_id)?),
			5 => {
				let tag = reader.read_u8()?;
				let primitive = Primitive::from_tag(tag)
					.ok_or_else(|| Error::NotImplemented(format!("primitive kind {tag}")))?;
				TypeDef::Primitive(primitive)
			},
			6 => TypeDef::Compact(decode_type_id(reader)?),
			7 => {
				let store = decode_type_id(reader)?;
				let order = decode_type_id(reader)?;
				TypeDef::BitSequence { store, order }
			},
			tag => return Err(Error::NotImplemented(format!("type definition tag {tag}"))),
		};
		Ok(def)
	}

	/// Every type id this definition refers to.
	pub fn referenced_ids(&self) -> Vec<TypeId> {
		match self {
			TypeDef::Composite(fields) => fields.iter().map(|field| field.ty).collect(),
			TypeDef::Variant(variants) => variants
				.iter()
				.flat_map(|variant| variant.fields.iter().map(|field| field.ty))
				.collect(),
			TypeDef::Sequence(ty) | TypeDef::Array { ty, .. } | TypeDef::Compact(ty) => vec![*ty],
			TypeDef::Tuple(ids) => ids.clone(),
			TypeDef::Primitive(_) => vec![],
			TypeDef::BitSequence { store, order } => vec![*store, *order],
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
	pub name: Option<String>,
	pub ty: TypeId,
	/// Type name as written in the runtime source, e.g. `T::Moment`.
	pub type_name: Option<String>,
	pub docs: Vec<String>,
}

impl Field {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		Ok(Self {
			name: reader.read_option(|r| r.read_string())?,
			ty: decode_type_id(reader)?,
			type_name: reader.read_option(|r| r.read_string())?,
			docs: reader.read_vec(|r| r.read_string())?,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
	pub name: String,
	pub fields: Vec<Field>,
	pub index: u8,
	pub docs: Vec<String>,
}

impl Variant {
	fn decode(reader: &mut ScaleReader) -> Result<Self, Error> {
		Ok(Self {
			name: reader.read_string()?,
			fields: reader.read_vec(Field::decode)?,
			index: reader.read_u8()?,
			docs: reader.read_vec(|r| r.read_string())?,
		})
	}
}

/// Primitive kinds, in registry tag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Primitive {
	Bool,
	Char,
	Str,
	U8,
	U16,
	U32,
	U64,
	U128,
	U256,
	I8,
	I16,
	I32,
	I64,
	I128,
	I256,
}

impl Primitive {
	pub fn from_tag(tag: u8) -> Option<Self> {
		use Primitive::*;
		let primitive = match tag {
			0 => Bool,
			1 => Char,
			2 => Str,
			3 => U8,
			4 => U16,
			5 => U32,
			6 => U64,
			7 => U128,
			8 => U256,
			9 => I8,
			10 => I16,
			11 => I32,
			12 => I64,
			13 => I128,
			14 => I256,
			_ => return None,
		};
		Some(primitive)
	}
}

pub(crate) fn decode_type_id(reader: &mut ScaleReader) -> Result<TypeId, Error> {
	Ok(reader.read_compact_u32()?)
}
