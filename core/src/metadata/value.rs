use crate::address::Address;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{ser::SerializeMap, Serialize, Serializer};

/// Dynamically decoded SCALE value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
	Bool(bool),
	Char(char),
	String(String),
	Unsigned(u128),
	Signed(i128),
	/// Little endian 256-bit unsigned integer.
	U256([u8; 32]),
	Bytes(Vec<u8>),
	Address(Address),
	Timestamp(DateTime<Utc>),
	Bits(Vec<bool>),
	List(Vec<Value>),
	/// Composite with named fields, in declaration order.
	Named(Vec<(String, Value)>),
	/// Composite with unnamed fields or a tuple.
	Indexed(Vec<Value>),
	/// Enum value; `fields` is `None` for variants without fields.
	Variant {
		name: String,
		fields: Option<Box<Value>>,
	},
}

impl Value {
	pub fn as_u128(&self) -> Option<u128> {
		match self {
			Value::Unsigned(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Value::Bytes(bytes) => Some(bytes),
			_ => None,
		}
	}

	pub fn as_address(&self) -> Option<&Address> {
		match self {
			Value::Address(address) => Some(address),
			_ => None,
		}
	}

	pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
		match self {
			Value::Timestamp(timestamp) => Some(*timestamp),
			_ => None,
		}
	}

	/// Variant name and its fields.
	pub fn as_variant(&self) -> Option<(&str, Option<&Value>)> {
		match self {
			Value::Variant { name, fields } => Some((name, fields.as_deref())),
			_ => None,
		}
	}

	/// Named field of a composite.
	pub fn field(&self, name: &str) -> Option<&Value> {
		match self {
			Value::Named(fields) => fields
				.iter()
				.find(|(field, _)| field == name)
				.map(|(_, value)| value),
			_ => None,
		}
	}

	/// Positional element of a list or an unnamed composite.
	pub fn get(&self, index: usize) -> Option<&Value> {
		match self {
			Value::List(items) | Value::Indexed(items) => items.get(index),
			_ => None,
		}
	}
}

fn hex_string(bytes: &[u8]) -> String {
	format!("0x{}", hex::encode(bytes))
}

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Value::Bool(value) => serializer.serialize_bool(*value),
			Value::Char(value) => serializer.serialize_char(*value),
			Value::String(value) => serializer.serialize_str(value),
			// JSON consumers lose precision above 64 bits
			Value::Unsigned(value) => match u64::try_from(*value) {
				Ok(value) => serializer.serialize_u64(value),
				Err(_) => serializer.serialize_str(&value.to_string()),
			},
			Value::Signed(value) => match i64::try_from(*value) {
				Ok(value) => serializer.serialize_i64(value),
				Err(_) => serializer.serialize_str(&value.to_string()),
			},
			Value::U256(value) => {
				let mut big_endian = *value;
				big_endian.reverse();
				serializer.serialize_str(&hex_string(&big_endian))
			},
			Value::Bytes(bytes) => serializer.serialize_str(&hex_string(bytes)),
			Value::Address(address) => serializer.serialize_str(address.as_str()),
			Value::Timestamp(timestamp) => {
				serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
			},
			Value::Bits(bits) => {
				let rendered: String = bits.iter().map(|bit| if *bit { '1' } else { '0' }).collect();
				serializer.serialize_str(&format!("0b{rendered}"))
			},
			Value::List(items) => items.serialize(serializer),
			Value::Named(fields) => {
				let mut map = serializer.serialize_map(Some(fields.len()))?;
				for (name, value) in fields {
					map.serialize_entry(name, value)?;
				}
				map.end()
			},
			Value::Indexed(items) => {
				let mut map = serializer.serialize_map(Some(items.len()))?;
				for (index, value) in items.iter().enumerate() {
					map.serialize_entry(&index.to_string(), value)?;
				}
				map.end()
			},
			Value::Variant { name, fields: None } => serializer.serialize_str(name),
			Value::Variant {
				name,
				fields: Some(fields),
			} => {
				let mut map = serializer.serialize_map(Some(1))?;
				map.serialize_entry(name, fields)?;
				map.end()
			},
		}
	}
}
