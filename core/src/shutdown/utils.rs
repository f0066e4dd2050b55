/// Resolves on Ctrl-C, and on SIGTERM on unix systems.
pub async fn user_signal() {
	let ctrl_c = tokio::signal::ctrl_c();

	#[cfg(unix)]
	{
		let terminate = async {
			let mut signal =
				tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
			signal.recv().await;
			std::io::Result::Ok(())
		};

		tokio::select! {
			_ = ctrl_c => {},
			_ = terminate => {},
		}
	}

	#[cfg(not(unix))]
	{
		let _ = ctrl_c.await;
	}
}
