//! Dynamic decoding of SCALE values driven by the type registry.

use super::{
	types::{Field, Primitive, TypeDef, TypeId, Variant},
	Error, Metadata, Value,
};
use crate::{
	address::{Address, PUBLIC_KEY_LENGTH},
	scale::{self, ScaleReader},
};
use chrono::{TimeZone, Utc};

pub const ACCOUNT_ID_PATH: &str = "sp_core::crypto::AccountId32";
pub const MULTI_ADDRESS_PATH: &str = "sp_runtime::multiaddress::MultiAddress";

const MOMENT_TYPE_NAMES: [&str; 2] = ["T::Moment", "Moment"];
const ENGINE_ID_TYPE_NAME: &str = "ConsensusEngineId";

/// Deepest type nesting accepted before decoding fails.
pub const MAX_DEPTH: usize = 128;

impl Metadata {
	/// Decodes a value of type `ty` from the reader.
	pub fn decode_value(&self, ty: TypeId, reader: &mut ScaleReader) -> Result<Value, Error> {
		self.value_at(ty, reader, 0)
	}

	/// Decodes a single field, applying the type name hints.
	pub fn decode_field(&self, field: &Field, reader: &mut ScaleReader) -> Result<Value, Error> {
		self.field_at(field, reader, 0)
	}

	/// Decodes the fields of a composite or variant.
	///
	/// A single field is returned on its own, named fields as a map and unnamed
	/// fields as an index map. Returns `None` when there are no fields.
	pub fn decode_fields(
		&self,
		fields: &[Field],
		reader: &mut ScaleReader,
	) -> Result<Option<Value>, Error> {
		self.fields_at(fields, reader, 0)
	}

	fn value_at(&self, ty: TypeId, reader: &mut ScaleReader, depth: usize) -> Result<Value, Error> {
		if depth > MAX_DEPTH {
			return Err(Error::TooDeep(MAX_DEPTH));
		}
		let resolved = self.resolve(ty)?;
		match resolved.path_string().as_str() {
			ACCOUNT_ID_PATH => return decode_account_id(reader),
			MULTI_ADDRESS_PATH => return self.decode_multi_address(ty, reader),
			_ => {},
		}

		let depth = depth + 1;
		match &resolved.def {
			TypeDef::Composite(fields) => Ok(self
				.fields_at(fields, reader, depth)?
				.unwrap_or(Value::Indexed(vec![]))),
			TypeDef::Variant(variants) => self.decode_variant(ty, variants, reader, depth),
			TypeDef::Sequence(element) => {
				let len = reader.read_length()?;
				self.decode_elements(*element, len, reader, depth)
			},
			TypeDef::Array { len, ty: element } => {
				self.decode_elements(*element, *len as usize, reader, depth)
			},
			TypeDef::Tuple(elements) => elements
				.iter()
				.map(|element| self.value_at(*element, reader, depth))
				.collect::<Result<Vec<_>, _>>()
				.map(Value::Indexed),
			TypeDef::Primitive(primitive) => decode_primitive(*primitive, reader),
			TypeDef::Compact(_) => Ok(Value::Unsigned(reader.read_compact_big()?)),
			TypeDef::BitSequence { store, order } => self.decode_bits(*store, *order, reader),
		}
	}

	fn field_at(&self, field: &Field, reader: &mut ScaleReader, depth: usize) -> Result<Value, Error> {
		let type_name = field.type_name.as_deref().unwrap_or_default();
		if MOMENT_TYPE_NAMES.contains(&type_name) {
			return match self.value_at(field.ty, reader, depth)? {
				Value::Unsigned(millis) => to_timestamp(millis),
				other => Err(Error::UnexpectedShape(format!(
					"moment field decoded to {other:?}"
				))),
			};
		}

		if type_name == ENGINE_ID_TYPE_NAME {
			let id = reader.read_array::<4>()?;
			let id = String::from_utf8(id.to_vec()).map_err(|_| scale::Error::InvalidUtf8)?;
			return Ok(Value::String(id));
		}

		self.value_at(field.ty, reader, depth)
	}

	fn fields_at(
		&self,
		fields: &[Field],
		reader: &mut ScaleReader,
		depth: usize,
	) -> Result<Option<Value>, Error> {
		match fields {
			[] => Ok(None),
			[field] => self.field_at(field, reader, depth).map(Some),
			_ if fields.iter().all(|field| field.name.is_some()) => fields
				.iter()
				.map(|field| {
					let name = field.name.clone().unwrap_or_default();
					Ok((name, self.field_at(field, reader, depth)?))
				})
				.collect::<Result<Vec<_>, Error>>()
				.map(|fields| Some(Value::Named(fields))),
			_ if fields.iter().all(|field| field.name.is_none()) => fields
				.iter()
				.map(|field| self.field_at(field, reader, depth))
				.collect::<Result<Vec<_>, _>>()
				.map(|fields| Some(Value::Indexed(fields))),
			_ => Err(Error::UnexpectedShape(
				"composite mixes named and unnamed fields".to_string(),
			)),
		}
	}

	fn decode_variant(
		&self,
		ty: TypeId,
		variants: &[Variant],
		reader: &mut ScaleReader,
		depth: usize,
	) -> Result<Value, Error> {
		let index = reader.read_u8()?;
		let variant = variants
			.iter()
			.find(|variant| variant.index == index)
			.ok_or_else(|| {
				scale::Error::InvalidEncoding(format!("type {ty} has no variant with index {index}"))
			})?;

		Ok(Value::Variant {
			name: variant.name.clone(),
			fields: self
				.fields_at(&variant.fields, reader, depth)?
				.map(Box::new),
		})
	}

	fn decode_elements(
		&self,
		element: TypeId,
		len: usize,
		reader: &mut ScaleReader,
		depth: usize,
	) -> Result<Value, Error> {
		if matches!(
			self.resolve(element)?.def,
			TypeDef::Primitive(Primitive::U8)
		) {
			return Ok(Value::Bytes(reader.read_bytes(len)?.to_vec()));
		}

		let mut items = Vec::with_capacity(len.min(reader.remaining()));
		for _ in 0..len {
			let before = reader.remaining();
			items.push(self.value_at(element, reader, depth)?);
			// nothing consumed: the element type is zero sized
			if reader.remaining() == before && len > before {
				return Err(Error::UnexpectedShape(format!(
					"{len} elements of zero sized type {element} exceed the {before} remaining bytes"
				)));
			}
		}
		Ok(Value::List(items))
	}

	fn decode_multi_address(&self, ty: TypeId, reader: &mut ScaleReader) -> Result<Value, Error> {
		let index = reader.read_u8()?;
		if index != self.multi_address_id_index()? {
			return Err(Error::NotImplemented(format!(
				"multi address variant {index} of type {ty}"
			)));
		}
		decode_account_id(reader)
	}

	fn decode_bits(
		&self,
		store: TypeId,
		order: TypeId,
		reader: &mut ScaleReader,
	) -> Result<Value, Error> {
		if !matches!(self.resolve(store)?.def, TypeDef::Primitive(Primitive::U8)) {
			return Err(Error::NotImplemented(format!(
				"bit sequence with store type {store}"
			)));
		}
		let msb_first = match self.resolve(order)?.name() {
			Some("Lsb0") => false,
			Some("Msb0") => true,
			_ => {
				return Err(Error::NotImplemented(format!(
					"bit sequence with order type {order}"
				)))
			},
		};

		let len = reader.read_length()?;
		let bytes = reader.read_bytes(len.div_ceil(8))?;
		let bits = (0..len)
			.map(|bit| {
				let shift = if msb_first { 7 - bit % 8 } else { bit % 8 };
				bytes[bit / 8] & (1 << shift) != 0
			})
			.collect();
		Ok(Value::Bits(bits))
	}
}

fn decode_account_id(reader: &mut ScaleReader) -> Result<Value, Error> {
	let raw = reader.read_array::<PUBLIC_KEY_LENGTH>()?;
	Ok(Value::Address(Address::from_public(raw)))
}

fn to_timestamp(millis: u128) -> Result<Value, Error> {
	i64::try_from(millis)
		.ok()
		.and_then(|millis| Utc.timestamp_millis_opt(millis).single())
		.map(Value::Timestamp)
		.ok_or_else(|| scale::Error::Overflow("timestamp").into())
}

fn decode_primitive(primitive: Primitive, reader: &mut ScaleReader) -> Result<Value, Error> {
	let value = match primitive {
		Primitive::Bool => Value::Bool(reader.read_bool()?),
		Primitive::Char => Value::Char(reader.read_char()?),
		Primitive::Str => Value::String(reader.read_string()?),
		Primitive::U8 => Value::Unsigned(reader.read_u8()?.into()),
		Primitive::U16 => Value::Unsigned(reader.read_u16()?.into()),
		Primitive::U32 => Value::Unsigned(reader.read_u32()?.into()),
		Primitive::U64 => Value::Unsigned(reader.read_u64()?.into()),
		Primitive::U128 => Value::Unsigned(reader.read_u128()?),
		Primitive::U256 => Value::U256(reader.read_array()?),
		Primitive::I8 => Value::Signed(reader.read_i8()?.into()),
		Primitive::I16 => Value::Signed(reader.read_i16()?.into()),
		Primitive::I32 => Value::Signed(reader.read_i32()?.into()),
		Primitive::I64 => Value::Signed(reader.read_i64()?.into()),
		Primitive::I128 => Value::Signed(reader.read_i128()?),
		Primitive::I256 => return Err(Error::NotImplemented("i256".to_string())),
	};
	Ok(value)
}
