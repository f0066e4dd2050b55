use clap::{command, Parser};
use color_eyre::Result;
use scale_light_core::{
	address::Address,
	extrinsic::{Mortality, DEFAULT_MORTAL_PERIOD},
};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(version)]
pub struct CliOpts {
	/// Path to the toml configuration file
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,
	/// Path to the toml identity file
	#[arg(short, long, value_name = "FILE", default_value = "identity.toml")]
	pub identity: String,
	/// Log level
	#[arg(long)]
	pub verbosity: Option<Level>,
	/// Set logs format to JSON
	#[arg(long)]
	pub logs_json: bool,
	/// WebSocket endpoint of the full node
	#[arg(long, value_name = "URL")]
	pub full_node_ws: Option<String>,
	/// HTTP endpoint of the full node
	#[arg(long, value_name = "URL")]
	pub full_node_http: Option<String>,
	/// Expected genesis hash of the chain
	#[arg(long)]
	pub genesis_hash: Option<String>,
	/// Secret seed phrase password
	#[arg(long)]
	pub passphrase: Option<String>,
	/// Secret URI, overrides the identity file
	#[arg(long)]
	pub suri: Option<String>,
	/// SS58 address receiving a balance transfer
	#[arg(long, requires = "transfer_amount")]
	pub transfer_dest: Option<String>,
	/// Transferred amount, in the chain's smallest unit
	#[arg(long, requires = "transfer_dest")]
	pub transfer_amount: Option<u128>,
	/// Tip added to the transfer
	#[arg(long, default_value_t = 0)]
	pub transfer_tip: u128,
	/// Allow the transfer to reap the sender account
	#[arg(long)]
	pub allow_death: bool,
	/// Blocks the transfer stays valid for (default: 64)
	#[arg(long, value_name = "BLOCKS")]
	pub mortal_period: Option<u64>,
	/// Submit a transfer that never expires
	#[arg(long, conflicts_with = "mortal_period")]
	pub immortal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
	pub dest: Address,
	pub amount: u128,
	pub tip: u128,
	pub keep_alive: bool,
	pub mortality: Mortality,
}

impl CliOpts {
	/// Transfer requested on the command line, if any.
	pub fn transfer(&self) -> Result<Option<Transfer>> {
		let (Some(dest), Some(amount)) = (&self.transfer_dest, self.transfer_amount) else {
			return Ok(None);
		};
		let mortality = if self.immortal {
			Mortality::Immortal
		} else {
			Mortality::Mortal(self.mortal_period.unwrap_or(DEFAULT_MORTAL_PERIOD))
		};

		Ok(Some(Transfer {
			dest: Address::parse(dest)?,
			amount,
			tip: self.transfer_tip,
			keep_alive: !self.allow_death,
			mortality,
		}))
	}
}
