//! SCALE binary encoding.
//!
//! [`ScaleReader`] is a forward-only cursor over a byte buffer and [`ScaleWriter`]
//! an append-only buffer. Both implement the same set of encodings, including
//! the four compact integer modes.

mod reader;
mod writer;

pub use reader::ScaleReader;
pub use writer::ScaleWriter;

/// Compact mode selected by the two low bits of the first byte.
pub(crate) const MODE_SINGLE_BYTE: u8 = 0b00;
pub(crate) const MODE_TWO_BYTE: u8 = 0b01;
pub(crate) const MODE_FOUR_BYTE: u8 = 0b10;
pub(crate) const MODE_BIG_INTEGER: u8 = 0b11;

/// Largest values representable by each of the fixed compact modes.
pub const COMPACT_SINGLE_BYTE_MAX: u128 = 0x3F;
pub const COMPACT_TWO_BYTE_MAX: u128 = 0x3FFF;
pub const COMPACT_FOUR_BYTE_MAX: u128 = 0x3FFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Unexpected end of input: {needed} more bytes needed at offset {offset}")]
	Truncated { offset: usize, needed: usize },
	#[error("Invalid encoding: {0}")]
	InvalidEncoding(String),
	#[error("Compact value uses the big-integer mode, use the big-integer reader")]
	UseBigIntegerReader,
	#[error("Value does not fit into {0}")]
	Overflow(&'static str),
	#[error("Invalid UTF-8 string")]
	InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Encodes a single value as a compact integer.
pub fn encode_compact(value: u128) -> Vec<u8> {
	let mut writer = ScaleWriter::new();
	writer.write_compact(value);
	writer.into_inner()
}

/// Decodes a compact integer occupying the whole input.
pub fn decode_compact(data: &[u8]) -> Result<u128> {
	let mut reader = ScaleReader::new(data);
	let value = reader.read_compact_big()?;
	reader.finish()?;
	Ok(value)
}
