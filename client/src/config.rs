use crate::cli::CliOpts;
use color_eyre::{
	eyre::{eyre, WrapErr},
	Result,
};
use scale_light_core::{network::rpc::configuration::RPCConfig, types::tracing_level_format};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::Level;

/// Representation of a configuration used by this project.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
	#[serde(flatten)]
	pub rpc: RPCConfig,
	/// Genesis hash the node must report, any chain is accepted if not set (default: None).
	pub genesis_hash: Option<String>,
	/// Log level, default is `INFO`. See `<https://docs.rs/log/0.4.14/log/enum.LevelFilter.html>` for possible log level values. (default: `INFO`).
	#[serde(with = "tracing_level_format")]
	pub log_level: Level,
	/// If set to true, logs are displayed in JSON format, which is used for structured logging. Otherwise, plain text format is used (default: false).
	pub log_format_json: bool,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		RuntimeConfig {
			rpc: Default::default(),
			genesis_hash: None,
			log_level: Level::INFO,
			log_format_json: false,
		}
	}
}

pub fn load_runtime_config(opts: &CliOpts) -> Result<RuntimeConfig> {
	let mut cfg = if let Some(config_path) = &opts.config {
		fs::metadata(config_path).map_err(|_| eyre!("Provided config file doesn't exist."))?;
		confy::load_path(config_path)
			.wrap_err(format!("Failed to load configuration from {}", config_path))?
	} else {
		RuntimeConfig::default()
	};

	// Flags override the config parameters
	cfg.log_format_json = opts.logs_json || cfg.log_format_json;
	cfg.log_level = opts.verbosity.unwrap_or(cfg.log_level);
	if let Some(full_node_ws) = &opts.full_node_ws {
		cfg.rpc.full_node_ws = full_node_ws.clone();
	}
	if let Some(full_node_http) = &opts.full_node_http {
		cfg.rpc.full_node_http = full_node_http.clone();
	}
	if let Some(genesis_hash) = &opts.genesis_hash {
		cfg.genesis_hash = Some(genesis_hash.clone());
	}

	Ok(cfg)
}
