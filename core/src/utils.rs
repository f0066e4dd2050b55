use crate::shutdown::Controller;
use color_eyre::Result;
use futures::Future;
use tokio::task::JoinHandle;
use tracing::{error, Instrument, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt::format, layer::SubscriberExt, EnvFilter, FmtSubscriber};

pub fn spawn_in_span<F>(future: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tokio::spawn(future.in_current_span())
}

pub fn install_panic_hooks(shutdown: Controller<String>) -> Result<()> {
	let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
		.display_location_section(true)
		.display_env_section(true)
		.into_hooks();

	eyre_hook.install()?;

	std::panic::set_hook(Box::new(move |panic_info| {
		// stop other tasks
		let _ = shutdown.trigger_shutdown("Panic occurred, shutting down".to_string());

		let msg = format!("{}", panic_hook.panic_report(panic_info));
		error!("Error: {}", strip_ansi_escapes::strip_str(msg));

		#[cfg(debug_assertions)]
		{
			better_panic::Settings::auto()
				.most_recent_first(false)
				.lineno_suffix(true)
				.verbosity(better_panic::Verbosity::Medium)
				.create_panic_handler()(panic_info);
		}
	}));
	Ok(())
}

fn env_filter(log_level: Level) -> EnvFilter {
	EnvFilter::new(format!("scale_light={log_level},warn"))
}

pub fn json_subscriber(log_level: Level) -> impl Subscriber + Send + Sync {
	FmtSubscriber::builder()
		.json()
		.with_env_filter(env_filter(log_level))
		.with_span_events(format::FmtSpan::CLOSE)
		.finish()
		.with(ErrorLayer::default())
}

pub fn default_subscriber(log_level: Level) -> impl Subscriber + Send + Sync {
	FmtSubscriber::builder()
		.with_env_filter(env_filter(log_level))
		.with_span_events(format::FmtSpan::CLOSE)
		.finish()
		.with(ErrorLayer::default())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tracing::info_span;

	#[tokio::test]
	async fn spawned_task_output() {
		let span = info_span!("test");
		let _entered = span.enter();
		assert_eq!(spawn_in_span(async { 42 }).await.unwrap(), 42);
	}

}
