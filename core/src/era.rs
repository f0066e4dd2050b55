//! Transaction mortality.
//!
//! A mortal era is valid for `period` blocks starting at the block whose
//! number is congruent to `phase` modulo `period`. The wire form is two bytes:
//! the low nibble holds `trailing_zeros(period) - 1` clamped to `[1, 15]`, the
//! upper twelve bits hold `phase / quantize_factor`.

use crate::scale::{self, ScaleReader, ScaleWriter};

pub const MIN_PERIOD: u64 = 4;
pub const MAX_PERIOD: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
	Immortal,
	Mortal(MortalEra),
}

/// Power of two period with a phase below it, built by [`Era::mortal`] or
/// [`Era::decode`] only, so that every value survives the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MortalEra {
	period: u64,
	phase: u64,
}

impl MortalEra {
	pub fn period(&self) -> u64 {
		self.period
	}

	pub fn phase(&self) -> u64 {
		self.phase
	}
}

impl Era {
	pub fn immortal() -> Self {
		Era::Immortal
	}

	/// Era valid for roughly `period` blocks starting at `current`.
	///
	/// The period is rounded up to a power of two within
	/// `[MIN_PERIOD, MAX_PERIOD]` and the phase is quantized so that it fits
	/// into twelve bits.
	pub fn mortal(period: u64, current: u64) -> Self {
		let period = period
			.checked_next_power_of_two()
			.unwrap_or(MAX_PERIOD)
			.clamp(MIN_PERIOD, MAX_PERIOD);
		let phase = current % period;
		let quantize_factor = quantize_factor(period);
		let phase = phase / quantize_factor * quantize_factor;

		Era::Mortal(MortalEra { period, phase })
	}

	pub fn is_immortal(&self) -> bool {
		matches!(self, Era::Immortal)
	}

	pub fn period(&self) -> Option<u64> {
		match self {
			Era::Immortal => None,
			Era::Mortal(era) => Some(era.period),
		}
	}

	pub fn phase(&self) -> Option<u64> {
		match self {
			Era::Immortal => None,
			Era::Mortal(era) => Some(era.phase),
		}
	}

	/// First block of the era that contains `current`.
	pub fn birth(&self, current: u64) -> u64 {
		match self {
			Era::Immortal => 0,
			Era::Mortal(MortalEra { period, phase }) => {
				(current.max(*phase) - phase) / period * period + phase
			},
		}
	}

	/// First block at which a transaction in this era is no longer valid.
	pub fn death(&self, current: u64) -> u64 {
		match self {
			Era::Immortal => u64::MAX,
			Era::Mortal(era) => self.birth(current) + era.period,
		}
	}

	pub fn encode_to(&self, writer: &mut ScaleWriter) {
		match self {
			Era::Immortal => {
				writer.write_u8(0);
			},
			Era::Mortal(MortalEra { period, phase }) => {
				let low = (period.trailing_zeros().saturating_sub(1)).clamp(1, 15) as u16;
				let high = (phase / quantize_factor(*period)) as u16;
				writer.write_u16(low | (high << 4));
			},
		}
	}

	pub fn encode(&self) -> Vec<u8> {
		let mut writer = ScaleWriter::new();
		self.encode_to(&mut writer);
		writer.into_inner()
	}

	pub fn decode(reader: &mut ScaleReader) -> scale::Result<Self> {
		let first = reader.read_u8()?;
		if first == 0 {
			return Ok(Era::Immortal);
		}

		let encoded = u64::from(first) + (u64::from(reader.read_u8()?) << 8);
		let period = 2u64 << (encoded % (1 << 4));
		let phase = (encoded >> 4) * quantize_factor(period);
		if period < MIN_PERIOD || phase >= period {
			return Err(scale::Error::InvalidEncoding(format!(
				"invalid era period {period} and phase {phase}"
			)));
		}

		Ok(Era::Mortal(MortalEra { period, phase }))
	}
}

fn quantize_factor(period: u64) -> u64 {
	(period >> 12).max(1)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use test_case::test_case;

	fn decode(bytes: &[u8]) -> scale::Result<Era> {
		let mut reader = ScaleReader::new(bytes);
		let era = Era::decode(&mut reader)?;
		reader.finish()?;
		Ok(era)
	}

	#[test_case(64, 42 => (64, 42, "a502".to_string()) ; "small period")]
	#[test_case(32768, 20_000 => (32768, 20_000, "4e9c".to_string()) ; "quantized phase")]
	#[test_case(4, 0 => (4, 0, "0100".to_string()) ; "minimum period")]
	#[test_case(1, 5 => (4, 1, "1100".to_string()) ; "period clamped up")]
	#[test_case(100, 1000 => (128, 104, "8606".to_string()) ; "period rounded to power of two")]
	#[test_case(65536, (1 << 20) | 12345 => (65536, 12336, "3f30".to_string()) ; "maximum period")]
	#[test_case(200_000, 77 => (65536, 64, "4f00".to_string()) ; "period clamped down")]
	#[test_case(256, 1023 => (256, 255, "f70f".to_string()) ; "last phase")]
	fn mortal_vectors(period: u64, current: u64) -> (u64, u64, String) {
		let era = Era::mortal(period, current);
		let encoded = era.encode();
		assert_eq!(decode(&encoded).unwrap(), era);
		let Era::Mortal(mortal) = era else {
			panic!("Expected mortal era");
		};
		(mortal.period(), mortal.phase(), hex::encode(encoded))
	}

	#[test]
	fn immortal() {
		assert_eq!(Era::immortal().encode(), vec![0]);
		assert_eq!(decode(&[0]).unwrap(), Era::Immortal);
		assert_eq!(Era::Immortal.death(100), u64::MAX);
	}

	#[test]
	fn phase_outside_period_is_rejected() {
		// period 4 (low nibble 1) with phase 4
		assert!(matches!(
			decode(&[0x41, 0x00]),
			Err(scale::Error::InvalidEncoding(_))
		));
	}

	#[test]
	fn truncated_mortal_era() {
		assert!(matches!(
			decode(&[0x45]),
			Err(scale::Error::Truncated { .. })
		));
	}

	#[test]
	fn birth_and_death() {
		let era = Era::mortal(64, 100);
		assert_eq!((era.period(), era.phase()), (Some(64), Some(36)));
		assert_eq!(era.birth(100), 100);
		assert_eq!(era.birth(130), 100);
		assert_eq!(era.death(130), 164);
		assert_eq!(era.birth(164), 164);
	}

	#[test]
	fn every_decoded_era_encodes_back() {
		for word in 1..=u16::MAX {
			let bytes = word.to_le_bytes();
			let Ok(era) = decode(&bytes) else {
				continue;
			};
			let mortal = match era {
				Era::Mortal(mortal) => mortal,
				Era::Immortal => panic!("Expected mortal era for {bytes:?}"),
			};
			assert!(mortal.period().is_power_of_two());
			assert!(mortal.phase() < mortal.period());
			assert_eq!(era.encode(), bytes, "re-encoding {era:?}");
		}
	}

	proptest! {
		#[test]
		fn roundtrip(period in 1u64..=200_000, current in any::<u32>()) {
			let era = Era::mortal(period, u64::from(current));
			let Era::Mortal(MortalEra { period, phase }) = era else {
				unreachable!();
			};
			prop_assert!(period.is_power_of_two());
			prop_assert!((MIN_PERIOD..=MAX_PERIOD).contains(&period));
			prop_assert!(phase < period);
			prop_assert_eq!(decode(&era.encode()).unwrap(), era);
		}
	}
}
