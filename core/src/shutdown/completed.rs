use super::{lock, ControllerInner};
use std::{
	future::Future,
	pin::Pin,
	sync::{Arc, Mutex},
	task::{Context, Poll},
};

/// Resolves with the shutdown reason once the shutdown is triggered and
/// every delay token has been dropped.
pub struct Completed<T: Clone> {
	pub(super) inner: Arc<Mutex<ControllerInner<T>>>,
}

impl<T: Clone> Clone for Completed<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: Clone> Future for Completed<T> {
	type Output = T;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let mut inner = lock(&self.inner);
		if let (0, Some(reason)) = (inner.delay_tokens, inner.reason.as_ref()) {
			return Poll::Ready(reason.clone());
		}

		// always register the current waker, older ones may be stale
		inner.on_shutdown_complete.push(cx.waker().clone());
		Poll::Pending
	}
}
