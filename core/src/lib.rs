//! SCALE codec, runtime metadata, extrinsic signing and chain subscription
//! routing for Substrate based nodes.

pub mod address;
pub mod crypto;
pub mod era;
pub mod extrinsic;
pub mod metadata;
pub mod network;
pub mod scale;
pub mod shutdown;
pub mod storage;
pub mod types;
pub mod utils;
