use super::{Error, Result, MODE_BIG_INTEGER, MODE_FOUR_BYTE, MODE_SINGLE_BYTE, MODE_TWO_BYTE};

/// Forward-only reader over SCALE encoded bytes.
///
/// Every read consumes input; there is no way to seek back.
#[derive(Debug, Clone)]
pub struct ScaleReader<'a> {
	data: &'a [u8],
	offset: usize,
}

impl<'a> ScaleReader<'a> {
	pub fn new(data: &'a [u8]) -> Self {
		Self { data, offset: 0 }
	}

	/// Number of bytes consumed so far.
	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn remaining(&self) -> usize {
		self.data.len() - self.offset
	}

	pub fn is_empty(&self) -> bool {
		self.remaining() == 0
	}

	/// Fails if any input is left unread.
	pub fn finish(&self) -> Result<()> {
		if !self.is_empty() {
			return Err(Error::InvalidEncoding(format!(
				"{} trailing bytes at offset {}",
				self.remaining(),
				self.offset
			)));
		}
		Ok(())
	}

	pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
		if self.remaining() < len {
			return Err(Error::Truncated {
				offset: self.offset,
				needed: len - self.remaining(),
			});
		}
		let bytes = &self.data[self.offset..self.offset + len];
		self.offset += len;
		Ok(bytes)
	}

	pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
		let mut array = [0u8; N];
		array.copy_from_slice(self.read_bytes(N)?);
		Ok(array)
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		Ok(self.read_bytes(1)?[0])
	}

	pub fn read_u16(&mut self) -> Result<u16> {
		self.read_array().map(u16::from_le_bytes)
	}

	pub fn read_u32(&mut self) -> Result<u32> {
		self.read_array().map(u32::from_le_bytes)
	}

	pub fn read_u64(&mut self) -> Result<u64> {
		self.read_array().map(u64::from_le_bytes)
	}

	pub fn read_u128(&mut self) -> Result<u128> {
		self.read_array().map(u128::from_le_bytes)
	}

	pub fn read_i8(&mut self) -> Result<i8> {
		self.read_array().map(i8::from_le_bytes)
	}

	pub fn read_i16(&mut self) -> Result<i16> {
		self.read_array().map(i16::from_le_bytes)
	}

	pub fn read_i32(&mut self) -> Result<i32> {
		self.read_array().map(i32::from_le_bytes)
	}

	pub fn read_i64(&mut self) -> Result<i64> {
		self.read_array().map(i64::from_le_bytes)
	}

	pub fn read_i128(&mut self) -> Result<i128> {
		self.read_array().map(i128::from_le_bytes)
	}

	pub fn read_bool(&mut self) -> Result<bool> {
		match self.read_u8()? {
			0 => Ok(false),
			1 => Ok(true),
			other => Err(Error::InvalidEncoding(format!(
				"{other} is not a boolean"
			))),
		}
	}

	/// Optional booleans use a single byte: `0` none, `1` false, `2` true.
	pub fn read_optional_bool(&mut self) -> Result<Option<bool>> {
		match self.read_u8()? {
			0 => Ok(None),
			1 => Ok(Some(false)),
			2 => Ok(Some(true)),
			other => Err(Error::InvalidEncoding(format!(
				"{other} is not an optional boolean"
			))),
		}
	}

	pub fn read_char(&mut self) -> Result<char> {
		let code = self.read_u32()?;
		char::from_u32(code)
			.ok_or_else(|| Error::InvalidEncoding(format!("{code:#x} is not a char")))
	}

	/// Reads a compact integer in one of the three fixed modes.
	///
	/// Values in big-integer mode are rejected with [`Error::UseBigIntegerReader`]
	/// instead of being truncated.
	pub fn read_compact_u32(&mut self) -> Result<u32> {
		let first = self.peek()?;
		match first & 0b11 {
			MODE_SINGLE_BYTE => Ok(u32::from(self.read_u8()? >> 2)),
			MODE_TWO_BYTE => Ok(u32::from(self.read_u16()? >> 2)),
			MODE_FOUR_BYTE => Ok(self.read_u32()? >> 2),
			_ => Err(Error::UseBigIntegerReader),
		}
	}

	/// Reads a compact integer in any mode.
	pub fn read_compact_big(&mut self) -> Result<u128> {
		let first = self.peek()?;
		if first & 0b11 != MODE_BIG_INTEGER {
			return self.read_compact_u32().map(u128::from);
		}

		self.read_u8()?;
		let len = usize::from(first >> 2) + 4;
		let bytes = self.read_bytes(len)?;
		if len > 16 && bytes[16..].iter().any(|byte| *byte != 0) {
			return Err(Error::Overflow("u128"));
		}
		let mut value = [0u8; 16];
		let used = len.min(16);
		value[..used].copy_from_slice(&bytes[..used]);
		Ok(u128::from_le_bytes(value))
	}

	/// Compact integer used as a length or count.
	pub fn read_length(&mut self) -> Result<usize> {
		let len = self.read_compact_big()?;
		usize::try_from(len).map_err(|_| Error::Overflow("usize"))
	}

	/// Compact length prefixed byte vector.
	pub fn read_byte_vec(&mut self) -> Result<Vec<u8>> {
		let len = self.read_length()?;
		self.read_bytes(len).map(<[u8]>::to_vec)
	}

	/// Compact length prefixed UTF-8 string.
	pub fn read_string(&mut self) -> Result<String> {
		let len = self.read_length()?;
		let bytes = self.read_bytes(len)?;
		String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)
	}

	pub fn read_option<T, E>(
		&mut self,
		mut read: impl FnMut(&mut Self) -> std::result::Result<T, E>,
	) -> std::result::Result<Option<T>, E>
	where
		E: From<Error>,
	{
		match self.read_u8()? {
			0 => Ok(None),
			1 => read(self).map(Some),
			other => Err(Error::InvalidEncoding(format!("{other} is not an option tag")).into()),
		}
	}

	pub fn read_vec<T, E>(
		&mut self,
		mut read: impl FnMut(&mut Self) -> std::result::Result<T, E>,
	) -> std::result::Result<Vec<T>, E>
	where
		E: From<Error>,
	{
		let len = self.read_length()?;
		// zero sized elements are legal, so the count alone is not bounded by the input
		let mut items = Vec::with_capacity(len.min(self.remaining()));
		for _ in 0..len {
			items.push(read(self)?);
		}
		Ok(items)
	}

	fn peek(&self) -> Result<u8> {
		self.data.get(self.offset).copied().ok_or(Error::Truncated {
			offset: self.offset,
			needed: 1,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use hex_literal::hex;
	use test_case::test_case;

	#[test]
	fn fixed_width_integers() {
		let data = hex!("2a 3412 78563412 efcdab9078563412 ffffffffffffffffffffffffffffffff");
		let mut reader = ScaleReader::new(&data);
		assert_eq!(reader.read_u8().unwrap(), 0x2a);
		assert_eq!(reader.read_u16().unwrap(), 0x1234);
		assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
		assert_eq!(reader.read_u64().unwrap(), 0x1234_5678_90ab_cdef);
		assert_eq!(reader.read_u128().unwrap(), u128::MAX);
		assert!(reader.is_empty());
	}

	#[test]
	fn signed_integers() {
		let data = hex!("ff feff");
		let mut reader = ScaleReader::new(&data);
		assert_eq!(reader.read_i8().unwrap(), -1);
		assert_eq!(reader.read_i16().unwrap(), -2);
	}

	#[test]
	fn read_past_end_is_truncated() {
		let mut reader = ScaleReader::new(&[0x01, 0x02]);
		assert_eq!(
			reader.read_u32(),
			Err(Error::Truncated {
				offset: 0,
				needed: 2
			})
		);
	}

	#[test_case(0 => Ok(false))]
	#[test_case(1 => Ok(true))]
	#[test_case(2 => matches Err(Error::InvalidEncoding(_)))]
	fn booleans(byte: u8) -> Result<bool> {
		ScaleReader::new(&[byte]).read_bool()
	}

	#[test_case(0 => Ok(None))]
	#[test_case(1 => Ok(Some(false)))]
	#[test_case(2 => Ok(Some(true)))]
	#[test_case(3 => matches Err(Error::InvalidEncoding(_)))]
	fn optional_booleans(byte: u8) -> Result<Option<bool>> {
		ScaleReader::new(&[byte]).read_optional_bool()
	}

	#[test]
	fn plain_compact_rejects_big_integer_mode() {
		let data = hex!("0300000040");
		let mut reader = ScaleReader::new(&data);
		assert_eq!(reader.read_compact_u32(), Err(Error::UseBigIntegerReader));
		assert_eq!(reader.offset(), 0);
		assert_eq!(reader.read_compact_big().unwrap(), 0x4000_0000);
	}

	#[test]
	fn oversized_big_integer_overflows() {
		let mut data = vec![((17 - 4) << 2) | 0b11];
		data.extend([0xff; 17]);
		assert_eq!(
			ScaleReader::new(&data).read_compact_big(),
			Err(Error::Overflow("u128"))
		);
	}

	#[test]
	fn strings_and_vectors() {
		let data = hex!("14 68656c6c6f 08 0102 0c 010203");
		let mut reader = ScaleReader::new(&data);
		assert_eq!(reader.read_string().unwrap(), "hello");
		assert_eq!(reader.read_byte_vec().unwrap(), vec![1, 2]);
		let items: Vec<u8> = reader.read_vec(|r| r.read_u8()).unwrap();
		assert_eq!(items, vec![1, 2, 3]);
		reader.finish().unwrap();
	}

	#[test]
	fn invalid_utf8_string() {
		let data = hex!("08 c328");
		assert_eq!(ScaleReader::new(&data).read_string(), Err(Error::InvalidUtf8));
	}

	#[test]
	fn length_larger_than_input_is_truncated() {
		let data = hex!("10 0102");
		assert!(matches!(
			ScaleReader::new(&data).read_byte_vec(),
			Err(Error::Truncated { .. })
		));
	}

	#[test]
	fn options() {
		let data = hex!("00 01 2a 02");
		let mut reader = ScaleReader::new(&data);
		assert_eq!(reader.read_option(|r| r.read_u8()), Ok(None));
		assert_eq!(reader.read_option(|r| r.read_u8()), Ok(Some(0x2a)));
		assert!(matches!(
			reader.read_option(|r| r.read_u8()),
			Err(Error::InvalidEncoding(_))
		));
	}
}
