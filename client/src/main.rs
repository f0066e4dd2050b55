use crate::{
	cli::{CliOpts, Transfer},
	config::{load_runtime_config, RuntimeConfig},
};
use clap::Parser;
use color_eyre::{
	eyre::{eyre, WrapErr},
	Result,
};
use scale_light_core::{
	extrinsic::{BalanceTransfer, SignedExtrinsic},
	network::rpc::{
		self,
		observers::{ChainSnapshotObserver, FinalizedHeadObserver, LatestChainState},
		router::{Observer, Router},
		transport::WsConnector,
	},
	shutdown::Controller,
	types::{load_or_init_suri, parse_hash, ChainState, Header, IdentityConfig},
	utils::{default_subscriber, install_panic_hooks, json_subscriber, spawn_in_span},
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

mod cli;
mod config;

/// Follows finalized heads of a Substrate chain and optionally submits a balance transfer.
async fn run(
	cfg: RuntimeConfig,
	identity_cfg: IdentityConfig,
	transfer: Option<Transfer>,
	shutdown: Controller<String>,
) -> Result<()> {
	let version = clap::crate_version!();
	info!("Running Scale Light Client version: {version}.");
	info!("Using config: {cfg:?}");
	info!(
		"SS58 address: {}, public key: {}",
		&identity_cfg.address, &identity_cfg.public_key
	);

	let rpc_client = rpc::Client::new(&cfg.rpc, shutdown.clone());
	let chain = rpc_client
		.get_system_chain()
		.await
		.wrap_err("Failed to reach the full node")?;
	info!("Connected to chain: {chain}");

	let state = Arc::new(LatestChainState::default());
	let snapshot_observer = Arc::new(ChainSnapshotObserver::new(state.clone()));
	let head_observer = Arc::new(FinalizedHeadObserver::new(
		Arc::new(rpc_client.clone()),
		state.clone(),
	));
	let finalized_headers = head_observer.subscribe();

	let router = Router::new(
		Box::new(WsConnector::new(&cfg.rpc.full_node_ws)),
		vec![
			snapshot_observer as Arc<dyn Observer>,
			head_observer as Arc<dyn Observer>,
		],
		cfg.rpc.reconnect.clone(),
		shutdown.clone(),
	);
	spawn_in_span(shutdown.with_trigger("Subscription router exited".to_string(), async move {
		if let Err(error) = router.run().await {
			error!("Subscription router failed: {error}");
		}
	}));

	let chain_state = wait_for_chain_state(&state, &shutdown).await?;
	info!(
		"Chain state ready, finalized block: {}, spec version: {}",
		chain_state.finalized_header.number, chain_state.runtime_version.spec_version
	);

	if let Some(expected) = &cfg.genesis_hash {
		let expected = parse_hash(expected).wrap_err("Invalid genesis hash in configuration")?;
		if chain_state.genesis_hash != expected {
			return Err(eyre!(
				"Genesis hash mismatch, expected {expected:?}, node reports {:?}",
				chain_state.genesis_hash
			));
		}
	}

	spawn_in_span(shutdown.with_cancel(log_finalized_headers(
		rpc_client.clone(),
		state.clone(),
		finalized_headers,
	)));

	if let Some(transfer) = transfer {
		submit_transfer(&rpc_client, &identity_cfg, &chain_state, transfer).await?;
	}

	Ok(())
}

async fn wait_for_chain_state(
	state: &LatestChainState,
	shutdown: &Controller<String>,
) -> Result<Arc<ChainState>> {
	let mut receiver = state.subscribe();
	let ready = shutdown
		.with_cancel(async move {
			receiver
				.wait_for(Option::is_some)
				.await
				.map(|chain_state| chain_state.clone())
		})
		.await
		.map_err(|reason| eyre!("Waiting for chain state halted due to shutdown: {reason}"))?;

	ready
		.wrap_err("Chain state channel closed")?
		.ok_or_else(|| eyre!("Chain state is not available"))
}

async fn log_finalized_headers(
	rpc_client: rpc::Client,
	state: Arc<LatestChainState>,
	mut finalized_headers: broadcast::Receiver<Header>,
) {
	loop {
		let header = match finalized_headers.recv().await {
			Ok(header) => header,
			Err(RecvError::Lagged(skipped)) => {
				warn!("Finalized header listener lagged, skipped {skipped} headers");
				continue;
			},
			Err(RecvError::Closed) => break,
		};
		let hash = header.hash();
		info!(block_number = header.number, "Finalized header {hash:?}");

		let Some(chain_state) = state.current() else {
			continue;
		};
		match rpc_client
			.get_system_events(&chain_state.metadata, hash)
			.await
		{
			Ok(events) => {
				let failed = events
					.iter()
					.filter(|event| event.is("System", "ExtrinsicFailed"))
					.count();
				debug!(
					block_number = header.number,
					events = events.len(),
					failed,
					"Events decoded"
				);
			},
			Err(error) => warn!(block_number = header.number, "Cannot fetch events: {error:#}"),
		}
	}
}

async fn submit_transfer(
	rpc_client: &rpc::Client,
	identity_cfg: &IdentityConfig,
	chain_state: &ChainState,
	transfer: Transfer,
) -> Result<()> {
	let account = rpc_client
		.get_account_info(&chain_state.metadata, &identity_cfg.address)
		.await?;
	let nonce = account.map(|info| info.nonce).unwrap_or_default();

	let call = if transfer.keep_alive {
		BalanceTransfer::keep_alive(transfer.dest, transfer.amount)
	} else {
		BalanceTransfer::allow_death(transfer.dest, transfer.amount)
	};
	let extrinsic = SignedExtrinsic::create(
		chain_state,
		identity_cfg.signer.as_ref(),
		nonce,
		transfer.tip,
		transfer.mortality,
		&call,
	)
	.wrap_err("Failed to sign transfer")?;

	let hash = rpc_client
		.submit_extrinsic(&extrinsic)
		.await
		.wrap_err("Failed to submit transfer")?;
	info!(nonce, "Transfer submitted, extrinsic hash: {hash}");
	Ok(())
}

#[tokio::main]
pub async fn main() -> Result<()> {
	let shutdown = Controller::new();
	let opts = CliOpts::parse();
	let cfg = load_runtime_config(&opts)?;

	if cfg.log_format_json {
		tracing::subscriber::set_global_default(json_subscriber(cfg.log_level))?;
	} else {
		tracing::subscriber::set_global_default(default_subscriber(cfg.log_level))?;
	};

	// install custom panic hooks
	install_panic_hooks(shutdown.clone())?;

	let transfer = opts.transfer()?;
	let suri = match opts.suri {
		None => load_or_init_suri(&opts.identity)?,
		Some(suri) => suri,
	};
	let identity_cfg = IdentityConfig::from_suri(suri, opts.passphrase)?;

	// spawn a task to watch for ctrl-c signals from user to trigger the shutdown
	let signal_shutdown = shutdown.clone();
	spawn_in_span(async move {
		signal_shutdown
			.on_user_signal("User signaled shutdown".to_string())
			.await
	});

	if let Err(error) = run(cfg, identity_cfg, transfer, shutdown.clone()).await {
		error!("{error:#}");
		return Err(error.wrap_err("Starting Scale Light Client failed"));
	};

	let reason = shutdown.completed_shutdown().await;

	// terminating conditions are logged before the shutdown is triggered
	Err(eyre!(reason).wrap_err("Running Scale Light Client encountered an error"))
}
