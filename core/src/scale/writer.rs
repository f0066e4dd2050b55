use super::{
	COMPACT_FOUR_BYTE_MAX, COMPACT_SINGLE_BYTE_MAX, COMPACT_TWO_BYTE_MAX, MODE_BIG_INTEGER,
	MODE_FOUR_BYTE, MODE_TWO_BYTE,
};

/// Append-only SCALE encoder.
#[derive(Debug, Clone, Default)]
pub struct ScaleWriter {
	buffer: Vec<u8>,
}

impl ScaleWriter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.buffer.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buffer.is_empty()
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.buffer
	}

	pub fn into_inner(self) -> Vec<u8> {
		self.buffer
	}

	pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
		self.buffer.extend_from_slice(bytes);
		self
	}

	pub fn write_u8(&mut self, value: u8) -> &mut Self {
		self.buffer.push(value);
		self
	}

	pub fn write_u16(&mut self, value: u16) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_u32(&mut self, value: u32) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_u64(&mut self, value: u64) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_u128(&mut self, value: u128) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_i8(&mut self, value: i8) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_i16(&mut self, value: i16) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_i32(&mut self, value: i32) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_i64(&mut self, value: i64) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_i128(&mut self, value: i128) -> &mut Self {
		self.write_bytes(&value.to_le_bytes())
	}

	pub fn write_bool(&mut self, value: bool) -> &mut Self {
		self.write_u8(u8::from(value))
	}

	pub fn write_optional_bool(&mut self, value: Option<bool>) -> &mut Self {
		self.write_u8(match value {
			None => 0,
			Some(false) => 1,
			Some(true) => 2,
		})
	}

	pub fn write_char(&mut self, value: char) -> &mut Self {
		self.write_u32(u32::from(value))
	}

	/// Writes `value` in the smallest compact mode that fits it.
	pub fn write_compact(&mut self, value: u128) -> &mut Self {
		match value {
			0..=COMPACT_SINGLE_BYTE_MAX => self.write_u8((value as u8) << 2),
			0..=COMPACT_TWO_BYTE_MAX => self.write_u16(((value as u16) << 2) | MODE_TWO_BYTE as u16),
			0..=COMPACT_FOUR_BYTE_MAX => {
				self.write_u32(((value as u32) << 2) | MODE_FOUR_BYTE as u32)
			},
			_ => {
				let bytes = value.to_le_bytes();
				let len = bytes.len() - bytes.iter().rev().take_while(|byte| **byte == 0).count();
				// values above the four byte range always need at least 4 bytes
				let len = len.max(4);
				self.write_u8((((len - 4) as u8) << 2) | MODE_BIG_INTEGER);
				self.write_bytes(&bytes[..len])
			},
		}
	}

	pub fn write_length(&mut self, len: usize) -> &mut Self {
		self.write_compact(len as u128)
	}

	/// Compact length prefixed byte vector.
	pub fn write_byte_vec(&mut self, bytes: &[u8]) -> &mut Self {
		self.write_length(bytes.len());
		self.write_bytes(bytes)
	}

	pub fn write_string(&mut self, value: &str) -> &mut Self {
		self.write_byte_vec(value.as_bytes())
	}

	pub fn write_option<T>(
		&mut self,
		value: Option<T>,
		write: impl FnOnce(&mut Self, T),
	) -> &mut Self {
		match value {
			None => self.write_u8(0),
			Some(value) => {
				self.write_u8(1);
				write(self, value);
				self
			},
		}
	}

	pub fn write_vec<I, T>(&mut self, items: I, mut write: impl FnMut(&mut Self, T)) -> &mut Self
	where
		I: IntoIterator<Item = T>,
		I::IntoIter: ExactSizeIterator,
	{
		let items = items.into_iter();
		self.write_length(items.len());
		for item in items {
			write(self, item);
		}
		self
	}
}
