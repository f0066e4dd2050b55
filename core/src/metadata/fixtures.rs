//! Small v14 metadata blob for tests, written with the SCALE writer.

use super::{
	Error, ExtrinsicMetadata, Field, Metadata, Pallet, Type, TypeDef, TypeId, Variant,
	MAGIC_NUMBER, SUPPORTED_VERSION,
};
use crate::scale::ScaleWriter;

pub mod types {
	use crate::metadata::TypeId;

	pub const U8: TypeId = 0;
	pub const BYTES_32: TypeId = 1;
	pub const ACCOUNT_ID: TypeId = 2;
	pub const U128: TypeId = 3;
	pub const COMPACT_BALANCE: TypeId = 4;
	pub const UNIT: TypeId = 5;
	pub const MULTI_ADDRESS: TypeId = 6;
	pub const BYTES: TypeId = 7;
	pub const BALANCES_CALL: TypeId = 8;
	pub const SYSTEM_CALL: TypeId = 9;
	pub const U64: TypeId = 10;
	pub const COMPACT_U64: TypeId = 11;
	pub const TIMESTAMP_CALL: TypeId = 12;
	pub const BOOL: TypeId = 13;
	pub const BALANCES_EVENT: TypeId = 14;
	pub const U32: TypeId = 15;
	pub const SYSTEM_EVENT: TypeId = 16;
	pub const DISPATCH_INFO: TypeId = 17;
	pub const H256: TypeId = 18;
	pub const DISPATCH_CLASS: TypeId = 19;
	pub const PAYS: TypeId = 20;
	pub const U32_BOOL: TypeId = 21;
	pub const BITS: TypeId = 22;
	pub const LSB0: TypeId = 23;
	pub const UNCHECKED_EXTRINSIC: TypeId = 24;
	pub const PHASE: TypeId = 25;
	pub const ENGINE_ID: TypeId = 26;
	pub const RUNTIME: TypeId = 27;
	pub const ACCOUNT_INFO: TypeId = 28;
	pub const U16: TypeId = 29;
	pub const ACCOUNT_DATA: TypeId = 30;
	pub const RUNTIME_EVENT: TypeId = 31;
	pub const EVENT_RECORD: TypeId = 32;
	pub const HASHES: TypeId = 33;
	pub const EVENT_RECORDS: TypeId = 34;
	pub const OPTION_U32: TypeId = 35;
	pub const PRE_DIGEST: TypeId = 36;
}

use types::*;

type FieldSpec<'a> = (Option<&'a str>, u32, Option<&'a str>);
type VariantSpec<'a> = (&'a str, u8, &'a [FieldSpec<'a>]);

const PRIMITIVE_BOOL: u8 = 0;
const PRIMITIVE_U8: u8 = 3;
const PRIMITIVE_U16: u8 = 4;
const PRIMITIVE_U32: u8 = 5;
const PRIMITIVE_U64: u8 = 6;
const PRIMITIVE_U128: u8 = 7;

pub const SIGNED_EXTENSIONS: [&str; 6] = [
	"CheckSpecVersion",
	"CheckTxVersion",
	"CheckGenesis",
	"CheckMortality",
	"CheckNonce",
	"ChargeTransactionPayment",
];

pub fn compact(value: u128) -> Vec<u8> {
	crate::scale::encode_compact(value)
}

fn write_fields(w: &mut ScaleWriter, fields: &[FieldSpec]) {
	w.write_vec(fields, |w, (name, ty, type_name)| {
		w.write_option(*name, |w, name| {
			w.write_string(name);
		});
		w.write_compact((*ty).into());
		w.write_option(*type_name, |w, type_name| {
			w.write_string(type_name);
		});
		w.write_length(0);
	});
}

struct Registry {
	types: Vec<Vec<u8>>,
}

impl Registry {
	fn add(&mut self, id: u32, path: &[&str], def: impl FnOnce(&mut ScaleWriter)) {
		let mut w = ScaleWriter::new();
		w.write_compact(id.into());
		w.write_vec(path, |w, segment| {
			w.write_string(segment);
		});
		// generic parameters
		w.write_length(0);
		def(&mut w);
		// docs
		w.write_length(0);
		self.types.push(w.into_inner());
	}

	fn composite(&mut self, id: u32, path: &[&str], fields: &[FieldSpec]) {
		self.add(id, path, |w| {
			w.write_u8(0);
			write_fields(w, fields);
		});
	}

	fn variant(&mut self, id: u32, path: &[&str], variants: &[VariantSpec]) {
		self.add(id, path, |w| {
			w.write_u8(1);
			w.write_vec(variants, |w, (name, index, fields)| {
				w.write_string(name);
				write_fields(w, fields);
				w.write_u8(*index);
				w.write_length(0);
			});
		});
	}

	fn sequence(&mut self, id: u32, element: u32) {
		self.add(id, &[], |w| {
			w.write_u8(2).write_compact(element.into());
		});
	}

	fn array(&mut self, id: u32, len: u32, element: u32) {
		self.add(id, &[], |w| {
			w.write_u8(3).write_u32(len).write_compact(element.into());
		});
	}

	fn tuple(&mut self, id: u32, elements: &[u32]) {
		self.add(id, &[], |w| {
			w.write_u8(4);
			w.write_vec(elements, |w, element| {
				w.write_compact((*element).into());
			});
		});
	}

	fn primitive(&mut self, id: u32, kind: u8) {
		self.add(id, &[], |w| {
			w.write_u8(5).write_u8(kind);
		});
	}

	fn compact(&mut self, id: u32, inner: u32) {
		self.add(id, &[], |w| {
			w.write_u8(6).write_compact(inner.into());
		});
	}

	fn bit_sequence(&mut self, id: u32, store: u32, order: u32) {
		self.add(id, &[], |w| {
			w.write_u8(7).write_compact(store.into()).write_compact(order.into());
		});
	}
}

fn registry() -> Registry {
	let mut r = Registry { types: vec![] };
	let transfer_fields: &[FieldSpec] = &[
		(Some("dest"), MULTI_ADDRESS, Some("AccountIdLookupOf<T>")),
		(Some("value"), COMPACT_BALANCE, Some("T::Balance")),
	];

	r.primitive(U8, PRIMITIVE_U8);
	r.array(BYTES_32, 32, U8);
	r.composite(
		ACCOUNT_ID,
		&["sp_core", "crypto", "AccountId32"],
		&[(None, BYTES_32, Some("[u8; 32]"))],
	);
	r.primitive(U128, PRIMITIVE_U128);
	r.compact(COMPACT_BALANCE, U128);
	r.tuple(UNIT, &[]);
	r.variant(
		MULTI_ADDRESS,
		&["sp_runtime", "multiaddress", "MultiAddress"],
		&[
			("Id", 0, &[(None, ACCOUNT_ID, Some("AccountId"))]),
			("Raw", 2, &[(None, BYTES, Some("Vec<u8>"))]),
		],
	);
	r.sequence(BYTES, U8);
	r.variant(
		BALANCES_CALL,
		&["pallet_balances", "pallet", "Call"],
		&[
			("transfer_allow_death", 0, transfer_fields),
			("transfer_keep_alive", 3, transfer_fields),
		],
	);
	r.variant(
		SYSTEM_CALL,
		&["frame_system", "pallet", "Call"],
		&[
			("remark", 0, &[(Some("remark"), BYTES, Some("Vec<u8>"))]),
			("remark_with_event", 7, &[(Some("remark"), BYTES, Some("Vec<u8>"))]),
		],
	);
	r.primitive(U64, PRIMITIVE_U64);
	r.compact(COMPACT_U64, U64);
	r.variant(
		TIMESTAMP_CALL,
		&["pallet_timestamp", "pallet", "Call"],
		&[("set", 0, &[(Some("now"), COMPACT_U64, Some("T::Moment"))])],
	);
	r.primitive(BOOL, PRIMITIVE_BOOL);
	r.variant(
		BALANCES_EVENT,
		&["pallet_balances", "pallet", "Event"],
		&[
			(
				"Endowed",
				0,
				&[
					(Some("account"), ACCOUNT_ID, Some("T::AccountId")),
					(Some("free_balance"), U128, Some("T::Balance")),
				],
			),
			(
				"Transfer",
				2,
				&[
					(Some("from"), ACCOUNT_ID, Some("T::AccountId")),
					(Some("to"), ACCOUNT_ID, Some("T::AccountId")),
					(Some("amount"), U128, Some("T::Balance")),
				],
			),
		],
	);
	r.primitive(U32, PRIMITIVE_U32);
	r.variant(
		SYSTEM_EVENT,
		&["frame_system", "pallet", "Event"],
		&[
			(
				"ExtrinsicSuccess",
				0,
				&[(Some("dispatch_info"), DISPATCH_INFO, Some("DispatchInfo"))],
			),
			("CodeUpdated", 2, &[]),
			(
				"Remarked",
				7,
				&[
					(Some("sender"), ACCOUNT_ID, Some("T::AccountId")),
					(Some("hash"), H256, Some("T::Hash")),
				],
			),
		],
	);
	r.composite(
		DISPATCH_INFO,
		&["frame_support", "dispatch", "DispatchInfo"],
		&[
			(Some("weight"), U64, Some("Weight")),
			(Some("class"), DISPATCH_CLASS, Some("DispatchClass")),
			(Some("pays_fee"), PAYS, Some("Pays")),
		],
	);
	r.composite(
		H256,
		&["primitive_types", "H256"],
		&[(None, BYTES_32, Some("[u8; 32]"))],
	);
	r.variant(
		DISPATCH_CLASS,
		&["frame_support", "dispatch", "DispatchClass"],
		&[("Normal", 0, &[]), ("Operational", 1, &[]), ("Mandatory", 2, &[])],
	);
	r.variant(
		PAYS,
		&["frame_support", "dispatch", "Pays"],
		&[("Yes", 0, &[]), ("No", 1, &[])],
	);
	r.tuple(U32_BOOL, &[U32, BOOL]);
	r.bit_sequence(BITS, U8, LSB0);
	r.composite(LSB0, &["bitvec", "order", "Lsb0"], &[]);
	r.composite(
		UNCHECKED_EXTRINSIC,
		&["sp_runtime", "generic", "unchecked_extrinsic", "UncheckedExtrinsic"],
		&[(None, BYTES, None)],
	);
	r.variant(
		PHASE,
		&["frame_system", "Phase"],
		&[
			("ApplyExtrinsic", 0, &[(None, U32, Some("u32"))]),
			("Finalization", 1, &[]),
			("Initialization", 2, &[]),
		],
	);
	r.array(ENGINE_ID, 4, U8);
	r.composite(RUNTIME, &["node_runtime", "Runtime"], &[]);
	r.composite(
		ACCOUNT_INFO,
		&["frame_system", "AccountInfo"],
		&[
			(Some("nonce"), U32, Some("Nonce")),
			(Some("consumers"), U32, Some("RefCount")),
			(Some("providers"), U32, Some("RefCount")),
			(Some("sufficients"), U32, Some("RefCount")),
			(Some("data"), ACCOUNT_DATA, Some("AccountData")),
		],
	);
	r.primitive(U16, PRIMITIVE_U16);
	r.composite(
		ACCOUNT_DATA,
		&["pallet_balances", "types", "AccountData"],
		&[
			(Some("free"), U128, Some("Balance")),
			(Some("reserved"), U128, Some("Balance")),
			(Some("frozen"), U128, Some("Balance")),
			(Some("flags"), U128, Some("ExtraFlags")),
		],
	);
	r.variant(
		RUNTIME_EVENT,
		&["node_runtime", "RuntimeEvent"],
		&[
			("System", 0, &[(None, SYSTEM_EVENT, None)]),
			("Balances", 5, &[(None, BALANCES_EVENT, None)]),
		],
	);
	r.composite(
		EVENT_RECORD,
		&["frame_system", "EventRecord"],
		&[
			(Some("phase"), PHASE, Some("Phase")),
			(Some("event"), RUNTIME_EVENT, Some("E")),
			(Some("topics"), HASHES, Some("Vec<T>")),
		],
	);
	r.sequence(HASHES, H256);
	r.sequence(EVENT_RECORDS, EVENT_RECORD);
	r.variant(
		OPTION_U32,
		&["Option"],
		&[("None", 0, &[]), ("Some", 1, &[(None, U32, None)])],
	);
	r.composite(
		PRE_DIGEST,
		&["sp_runtime", "generic", "digest", "PreDigest"],
		&[
			(Some("engine"), ENGINE_ID, Some("ConsensusEngineId")),
			(Some("data"), BYTES, Some("Vec<u8>")),
		],
	);
	r
}

fn write_storage_entry(
	w: &mut ScaleWriter,
	name: &str,
	map: Option<(u8, u32)>,
	value: u32,
	default: &[u8],
) {
	w.write_string(name);
	// default modifier
	w.write_u8(1);
	match map {
		None => {
			w.write_u8(0).write_compact(value.into());
		},
		Some((hasher, key)) => {
			w.write_u8(1);
			w.write_vec([hasher], |w, hasher| {
				w.write_u8(hasher);
			});
			w.write_compact(key.into()).write_compact(value.into());
		},
	}
	w.write_byte_vec(default);
	w.write_length(0);
}

fn write_constants(w: &mut ScaleWriter, constants: &[(&str, u32, Vec<u8>)]) {
	w.write_vec(constants, |w, (name, ty, value)| {
		w.write_string(name).write_compact((*ty).into()).write_byte_vec(value);
		w.write_length(0);
	});
}

fn write_pallets(w: &mut ScaleWriter) {
	w.write_length(3);

	// System
	w.write_string("System");
	w.write_option(Some(()), |w, _| {
		w.write_string("System");
		w.write_length(3);
		// Blake2_128Concat
		write_storage_entry(w, "Account", Some((2, ACCOUNT_ID)), ACCOUNT_INFO, &[0; 80]);
		write_storage_entry(w, "Number", None, U32, &[0; 4]);
		write_storage_entry(w, "Events", None, EVENT_RECORDS, &[0]);
	});
	w.write_option(Some(SYSTEM_CALL), |w, ty| {
		w.write_compact(ty.into());
	});
	w.write_option(Some(SYSTEM_EVENT), |w, ty| {
		w.write_compact(ty.into());
	});
	write_constants(
		w,
		&[
			("BlockHashCount", U32, 2400u32.to_le_bytes().to_vec()),
			("SS58Prefix", U16, 42u16.to_le_bytes().to_vec()),
		],
	);
	w.write_option(None::<u32>, |_, _| {});
	w.write_u8(0);

	// Timestamp
	w.write_string("Timestamp");
	w.write_option(Some(()), |w, _| {
		w.write_string("Timestamp");
		w.write_length(1);
		write_storage_entry(w, "Now", None, U64, &[0; 8]);
	});
	w.write_option(Some(TIMESTAMP_CALL), |w, ty| {
		w.write_compact(ty.into());
	});
	w.write_option(None::<u32>, |_, _| {});
	write_constants(w, &[("MinimumPeriod", U64, 2500u64.to_le_bytes().to_vec())]);
	w.write_option(None::<u32>, |_, _| {});
	w.write_u8(3);

	// Balances
	w.write_string("Balances");
	w.write_option(None::<()>, |_, _| {});
	w.write_option(Some(BALANCES_CALL), |w, ty| {
		w.write_compact(ty.into());
	});
	w.write_option(Some(BALANCES_EVENT), |w, ty| {
		w.write_compact(ty.into());
	});
	write_constants(
		w,
		&[("ExistentialDeposit", U128, 500u128.to_le_bytes().to_vec())],
	);
	w.write_option(None::<u32>, |_, _| {});
	w.write_u8(5);
}

pub fn metadata_bytes_with_runtime_type(runtime_type: u32) -> Vec<u8> {
	let registry = registry();
	let mut w = ScaleWriter::new();
	w.write_u32(MAGIC_NUMBER).write_u8(SUPPORTED_VERSION);
	w.write_length(registry.types.len());
	for ty in &registry.types {
		w.write_bytes(ty);
	}
	write_pallets(&mut w);

	w.write_compact(UNCHECKED_EXTRINSIC.into()).write_u8(4);
	w.write_vec(SIGNED_EXTENSIONS, |w, identifier| {
		w.write_string(identifier)
			.write_compact(UNIT.into())
			.write_compact(UNIT.into());
	});
	w.write_compact(runtime_type.into());
	w.into_inner()
}

pub fn metadata_bytes() -> Vec<u8> {
	metadata_bytes_with_runtime_type(RUNTIME)
}

pub fn metadata() -> Metadata {
	Metadata::decode(&metadata_bytes()).expect("fixture metadata is valid")
}

pub fn ty(id: TypeId, path: &[&str], def: TypeDef) -> Type {
	Type {
		id,
		path: path.iter().map(|segment| segment.to_string()).collect(),
		params: vec![],
		def,
		docs: vec![],
	}
}

pub fn field(name: Option<&str>, ty: TypeId) -> Field {
	Field {
		name: name.map(str::to_string),
		ty,
		type_name: None,
		docs: vec![],
	}
}

pub fn variant(name: &str, index: u8, fields: Vec<Field>) -> Variant {
	Variant {
		name: name.to_string(),
		fields,
		index,
		docs: vec![],
	}
}

pub fn pallet(name: &str, index: u8) -> Pallet {
	Pallet {
		name: name.to_string(),
		index,
		storage: None,
		calls: None,
		event: None,
		constants: vec![],
		error: None,
	}
}

/// Registry without the blob encoding, the first type doubles as the
/// extrinsic and runtime type.
pub fn registry_metadata(types: Vec<Type>, pallets: Vec<Pallet>) -> Result<Metadata, Error> {
	let first = types.first().map(|ty| ty.id).unwrap_or_default();
	let extrinsic = ExtrinsicMetadata {
		ty: first,
		version: 4,
		signed_extensions: vec![],
	};
	Metadata::new(types, pallets, extrinsic, first)
}
