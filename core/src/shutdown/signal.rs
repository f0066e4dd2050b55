use super::{lock, ControllerInner};
use std::{
	future::Future,
	pin::Pin,
	sync::{Arc, Mutex},
	task::{Context, Poll},
};

/// Resolves with the shutdown reason once the shutdown is triggered.
pub struct Signal<T: Clone> {
	pub(super) inner: Arc<Mutex<ControllerInner<T>>>,
}

impl<T: Clone> Signal<T> {
	/// Runs `future` until it completes or until this signal resolves.
	pub fn with_cancel<F: Future>(self, future: F) -> impl Future<Output = Result<F::Output, T>> {
		async move {
			tokio::select! {
				biased;
				reason = self => Err(reason),
				output = future => Ok(output),
			}
		}
	}
}

impl<T: Clone> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: Clone> Future for Signal<T> {
	type Output = T;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let mut inner = lock(&self.inner);
		if let Some(reason) = inner.reason.as_ref() {
			return Poll::Ready(reason.clone());
		}

		inner.on_shutdown_trigger.push(cx.waker().clone());
		Poll::Pending
	}
}
