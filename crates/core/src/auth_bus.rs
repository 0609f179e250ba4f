//! Late-bound channel for authentication failures.
//!
//! [`HttpClient`](crate::http::HttpClient) is built before the session
//! controller exists, so it cannot hold a reference to it. Instead both sides
//! share an [`AuthErrorBus`]: the executor publishes, the controller
//! subscribes once it has been constructed.
//!
//! The bus holds a single handler. Subscribing replaces the previous one;
//! it is not a multicast. Only the session controller is expected to
//! subscribe, and subscribing a second handler without unsubscribing the
//! first silently drops the first.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// A 401 received outside the probe path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
	/// Request path that was rejected.
	pub path: String,
	/// Message from the response body, or the generic fallback.
	pub message: String,
}

impl fmt::Display for AuthFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.message, self.path)
	}
}

type Handler = Arc<dyn Fn(&AuthFailure) + Send + Sync>;

/// Single-slot publish/subscribe for [`AuthFailure`]s. Clones share the slot.
#[derive(Clone, Default)]
pub struct AuthErrorBus {
	slot: Arc<Mutex<Option<Handler>>>,
}

impl AuthErrorBus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Installs `handler`, replacing any previous one.
	pub fn subscribe<F>(&self, handler: F)
	where
		F: Fn(&AuthFailure) + Send + Sync + 'static,
	{
		*self.slot.lock() = Some(Arc::new(handler));
	}

	pub fn unsubscribe(&self) {
		self.slot.lock().take();
	}

	pub fn has_subscriber(&self) -> bool {
		self.slot.lock().is_some()
	}

	/// Invokes the current handler synchronously; no-op without one.
	///
	/// The slot lock is released before the handler runs, so a handler may
	/// itself subscribe or unsubscribe.
	pub fn publish(&self, failure: &AuthFailure) {
		let handler = self.slot.lock().clone();
		if let Some(handler) = handler {
			handler(failure);
		}
	}
}

impl fmt::Debug for AuthErrorBus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AuthErrorBus")
			.field("subscribed", &self.has_subscriber())
			.finish()
	}
}
