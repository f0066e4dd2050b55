//! Graceful shutdown for async tasks.
//!
//! A [`Controller`] is cloned into every task that has to stop together. Any
//! clone may trigger the shutdown with a reason, every [`Signal`] resolves
//! with that reason and [`Controller::completed_shutdown`] resolves once all
//! [`DelayToken`]s are gone.

use std::{
	fmt::{self, Debug, Display},
	future::Future,
	mem,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	task::Waker,
};

pub use self::{completed::Completed, signal::Signal};

mod completed;
mod signal;
pub mod utils;

#[derive(Clone)]
pub struct Controller<T: Clone> {
	inner: Arc<Mutex<ControllerInner<T>>>,
}

impl<T: Clone> Controller<T> {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Mutex::new(ControllerInner::new())),
		}
	}

	fn lock(&self) -> MutexGuard<'_, ControllerInner<T>> {
		lock(&self.inner)
	}

	pub fn is_shutdown_triggered(&self) -> bool {
		self.lock().reason.is_some()
	}

	pub fn is_shutdown_completed(&self) -> bool {
		let inner = self.lock();
		inner.reason.is_some() && inner.delay_tokens == 0
	}

	/// Reason of the triggered shutdown, [`None`] while still running.
	pub fn shutdown_reason(&self) -> Option<T> {
		self.lock().reason.clone()
	}

	/// Resolves every [`Signal`] and cancels every future wrapped with
	/// [`Controller::with_cancel`]. Only the first reason is kept.
	pub fn trigger_shutdown(&self, reason: T) -> Result<(), ShutdownHasStarted<T>> {
		self.lock().shutdown(reason)
	}

	/// Resolves after the shutdown is triggered and every delay token is dropped.
	pub fn completed_shutdown(&self) -> Completed<T> {
		Completed {
			inner: self.inner.clone(),
		}
	}

	/// Resolves with the reason as soon as the shutdown is triggered.
	pub fn triggered_shutdown(&self) -> Signal<T> {
		Signal {
			inner: self.inner.clone(),
		}
	}

	/// Runs `future` until it completes (`Ok`) or until shutdown is triggered (`Err(reason)`).
	pub fn with_cancel<F: Future>(&self, future: F) -> impl Future<Output = Result<F::Output, T>> {
		self.triggered_shutdown().with_cancel(future)
	}

	/// Triggers the shutdown with `reason` when `future` completes or is dropped.
	pub fn with_trigger<F: Future>(&self, reason: T, future: F) -> impl Future<Output = F::Output> {
		let token = self.trigger_token(reason);
		async move {
			let output = future.await;
			drop(token);
			output
		}
	}

	/// Keeps the shutdown from completing until `future` completes or is dropped.
	pub fn with_delay<F: Future>(
		&self,
		future: F,
	) -> Result<impl Future<Output = F::Output>, ShutdownHasCompleted<T>> {
		let token = self.delay_token()?;
		Ok(async move {
			let output = future.await;
			drop(token);
			output
		})
	}

	pub fn delay_token(&self) -> Result<DelayToken<T>, ShutdownHasCompleted<T>> {
		let mut inner = self.lock();
		if inner.delay_tokens == 0 {
			if let Some(reason) = &inner.reason {
				return Err(ShutdownHasCompleted::new(reason.clone()));
			}
		}

		inner.delay_tokens += 1;
		Ok(DelayToken {
			inner: self.inner.clone(),
		})
	}

	/// Token that triggers the shutdown with `reason` when dropped.
	pub fn trigger_token(&self, reason: T) -> TriggerToken<T> {
		TriggerToken {
			reason: Some(reason),
			inner: self.inner.clone(),
		}
	}

	/// Triggers the shutdown with `reason` on Ctrl-C or SIGTERM.
	pub async fn on_user_signal(&self, reason: T) {
		utils::user_signal().await;
		let _ = self.trigger_shutdown(reason);
	}
}

impl<T: Clone> Default for Controller<T> {
	fn default() -> Self {
		Self::new()
	}
}

fn lock<T>(inner: &Mutex<ControllerInner<T>>) -> MutexGuard<'_, ControllerInner<T>> {
	// state stays consistent even if a holder panicked, wakers are only appended
	inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ControllerInner<T> {
	reason: Option<T>,
	/// Must reach 0 before the shutdown completes.
	delay_tokens: usize,
	on_shutdown_trigger: Vec<Waker>,
	on_shutdown_complete: Vec<Waker>,
}

impl<T: Clone> ControllerInner<T> {
	fn new() -> Self {
		Self {
			reason: None,
			delay_tokens: 0,
			on_shutdown_trigger: Vec::new(),
			on_shutdown_complete: Vec::new(),
		}
	}

	fn release_delay_token(&mut self) {
		self.delay_tokens = self.delay_tokens.saturating_sub(1);
		if self.delay_tokens == 0 {
			self.notify_shutdown_complete();
		}
	}

	fn notify_shutdown_complete(&mut self) {
		for waker in mem::take(&mut self.on_shutdown_complete) {
			waker.wake()
		}
	}

	fn shutdown(&mut self, reason: T) -> Result<(), ShutdownHasStarted<T>> {
		if let Some(original) = &self.reason {
			return Err(ShutdownHasStarted::new(original.clone(), reason));
		}

		self.reason = Some(reason);
		for waker in mem::take(&mut self.on_shutdown_trigger) {
			waker.wake()
		}
		if self.delay_tokens == 0 {
			self.notify_shutdown_complete()
		}
		Ok(())
	}
}

/// Delays the shutdown completion while it exists.
pub struct DelayToken<T: Clone> {
	inner: Arc<Mutex<ControllerInner<T>>>,
}

impl<T: Clone> Clone for DelayToken<T> {
	fn clone(&self) -> Self {
		lock(&self.inner).delay_tokens += 1;
		DelayToken {
			inner: self.inner.clone(),
		}
	}
}

impl<T: Clone> Drop for DelayToken<T> {
	fn drop(&mut self) {
		lock(&self.inner).release_delay_token();
	}
}

/// Triggers the shutdown when dropped.
pub struct TriggerToken<T: Clone> {
	reason: Option<T>,
	inner: Arc<Mutex<ControllerInner<T>>>,
}

impl<T: Clone> TriggerToken<T> {
	/// Drops the token without triggering the shutdown.
	pub fn forget(mut self) {
		self.reason = None;
	}
}

impl<T: Clone> Drop for TriggerToken<T> {
	fn drop(&mut self) {
		if let Some(reason) = self.reason.take() {
			let _ = lock(&self.inner).shutdown(reason);
		}
	}
}

/// Returned when the shutdown is triggered more than once.
#[derive(Debug, Clone)]
pub struct ShutdownHasStarted<T> {
	pub reason: T,
	/// Reason of the rejected trigger.
	pub ignored: T,
}

impl<T> ShutdownHasStarted<T> {
	pub const fn new(reason: T, ignored: T) -> Self {
		Self { reason, ignored }
	}
}

impl<T: Debug> std::error::Error for ShutdownHasStarted<T> {}

impl<T> Display for ShutdownHasStarted<T> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("shutdown has already been triggered")
	}
}

/// Returned when delaying a shutdown that has already completed.
#[derive(Debug)]
pub struct ShutdownHasCompleted<T> {
	pub reason: T,
}

impl<T> ShutdownHasCompleted<T> {
	pub const fn new(reason: T) -> Self {
		Self { reason }
	}
}

impl<T: Debug> std::error::Error for ShutdownHasCompleted<T> {}

impl<T> Display for ShutdownHasCompleted<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("shutdown has completed, it can not be delayed any further")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;
	use tokio::time::{sleep, timeout};

	const LIMIT: Duration = Duration::from_millis(500);

	#[tokio::test]
	async fn trigger_resolves_signals() {
		let controller = Controller::new();
		assert!(controller.trigger_shutdown(1).is_ok());
		assert_eq!(timeout(LIMIT, controller.triggered_shutdown()).await, Ok(1));
		assert_eq!(timeout(LIMIT, controller.completed_shutdown()).await, Ok(1));
		assert!(controller.is_shutdown_completed());
	}

	#[tokio::test]
	async fn trigger_from_other_task() {
		let controller = Controller::new();
		tokio::spawn({
			let controller = controller.clone();
			async move {
				sleep(Duration::from_millis(20)).await;
				let _ = controller.trigger_shutdown("stop");
			}
		});
		assert_eq!(timeout(LIMIT, controller.triggered_shutdown()).await, Ok("stop"));
	}

	#[test]
	fn first_reason_wins() {
		let controller = Controller::new();
		assert!(controller.trigger_shutdown("first").is_ok());
		let Err(error) = controller.trigger_shutdown("second") else {
			panic!("second trigger must fail");
		};
		assert_eq!(error.reason, "first");
		assert_eq!(error.ignored, "second");
		assert_eq!(controller.shutdown_reason(), Some("first"));
	}

	#[tokio::test]
	async fn cancel_wrapped_future() {
		let controller = Controller::new();
		let pending = controller.with_cancel(futures::future::pending::<()>());
		assert!(controller.trigger_shutdown(7).is_ok());
		assert_eq!(timeout(LIMIT, pending).await, Ok(Err(7)));

		let controller = Controller::<u8>::new();
		assert_eq!(controller.with_cancel(async { 3 }).await, Ok(3));
	}

	#[tokio::test]
	async fn delay_token_holds_completion() {
		let controller = Controller::new();
		let token = controller.delay_token().unwrap();
		assert!(controller.trigger_shutdown(1).is_ok());
		assert!(!controller.is_shutdown_completed());

		tokio::spawn(async move {
			sleep(Duration::from_millis(10)).await;
			drop(token);
		});
		assert_eq!(timeout(LIMIT, controller.completed_shutdown()).await, Ok(1));
		assert!(controller.delay_token().is_err());
	}

	#[tokio::test]
	async fn trigger_when_task_ends() {
		let controller = Controller::new();
		let task = controller.with_trigger("task ended", async { 5 });
		assert!(!controller.is_shutdown_triggered());
		assert_eq!(task.await, 5);
		assert_eq!(controller.shutdown_reason(), Some("task ended"));
	}

	#[test]
	fn forgotten_trigger_token() {
		let controller = Controller::new();
		controller.trigger_token(1).forget();
		assert!(!controller.is_shutdown_triggered());
		drop(controller.trigger_token(2));
		assert_eq!(controller.shutdown_reason(), Some(2));
	}
}
