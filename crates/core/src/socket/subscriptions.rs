//! Named-event handler registry.

use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::error;

pub(crate) type EventHandler = Box<dyn FnMut(&Value) + Send>;

thread_local! {
	// Slot currently being invoked on this thread.
	static DISPATCHING: Cell<Option<u64>> = const { Cell::new(None) };
}

struct Slot {
	id: u64,
	event: String,
	handler: Mutex<Option<EventHandler>>,
	cancelled: AtomicBool,
}

#[derive(Default)]
pub(crate) struct Registry {
	next_id: AtomicU64,
	by_event: Mutex<HashMap<String, Vec<Arc<Slot>>>>,
}

impl Registry {
	pub(crate) fn insert(self: &Arc<Self>, event: &str, handler: EventHandler) -> Subscription {
		let slot = Arc::new(Slot {
			id: self.next_id.fetch_add(1, Ordering::Relaxed),
			event: event.to_string(),
			handler: Mutex::new(Some(handler)),
			cancelled: AtomicBool::new(false),
		});
		self.by_event.lock().entry(event.to_string()).or_default().push(Arc::clone(&slot));
		Subscription {
			registry: Arc::downgrade(self),
			slot,
		}
	}

	/// Invokes every live handler for `event` once. Returns how many ran.
	pub(crate) fn dispatch(&self, event: &str, data: &Value) -> usize {
		let slots = match self.by_event.lock().get(event) {
			Some(slots) => slots.clone(),
			None => return 0,
		};

		let mut invoked = 0;
		for slot in slots {
			let mut handler = slot.handler.lock();
			if slot.cancelled.load(Ordering::SeqCst) {
				handler.take();
				continue;
			}
			let Some(callback) = handler.as_mut() else {
				continue;
			};

			let _marker = DispatchMarker::enter(slot.id);
			if catch_unwind(AssertUnwindSafe(|| callback(data))).is_err() {
				error!(target = "dwitter.socket", event, "event handler panicked");
			}
			invoked += 1;

			// The handler may have unsubscribed itself.
			if slot.cancelled.load(Ordering::SeqCst) {
				handler.take();
			}
		}
		invoked
	}

	pub(crate) fn len(&self, event: &str) -> usize {
		self.by_event.lock().get(event).map_or(0, Vec::len)
	}

	fn remove(&self, slot: &Arc<Slot>) {
		let mut by_event = self.by_event.lock();
		if let Some(slots) = by_event.get_mut(&slot.event) {
			slots.retain(|candidate| candidate.id != slot.id);
			if slots.is_empty() {
				by_event.remove(&slot.event);
			}
		}
	}
}

struct DispatchMarker {
	previous: Option<u64>,
}

impl DispatchMarker {
	fn enter(id: u64) -> Self {
		Self {
			previous: DISPATCHING.with(|current| current.replace(Some(id))),
		}
	}
}

impl Drop for DispatchMarker {
	fn drop(&mut self) {
		DISPATCHING.with(|current| current.set(self.previous));
	}
}

/// Handle returned by [`SocketClient::on_event`](super::SocketClient::on_event).
///
/// Dropping the handle keeps the handler registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
	registry: Weak<Registry>,
	slot: Arc<Slot>,
}

impl Subscription {
	pub fn event(&self) -> &str {
		&self.slot.event
	}

	pub fn is_active(&self) -> bool {
		!self.slot.cancelled.load(Ordering::SeqCst)
	}

	/// Removes the handler. Once this returns the handler is never invoked
	/// again; an invocation already running on another thread is waited out.
	/// Repeated calls are no-ops.
	pub fn unsubscribe(&self) {
		if self.slot.cancelled.swap(true, Ordering::SeqCst) {
			return;
		}
		if let Some(registry) = self.registry.upgrade() {
			registry.remove(&self.slot);
		}

		// From inside its own handler the slot lock is already held by the
		// dispatcher, which drops the handler once the call returns.
		let inside_own_handler = DISPATCHING.with(|current| current.get() == Some(self.slot.id));
		if !inside_own_handler {
			self.slot.handler.lock().take();
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("event", &self.slot.event)
			.field("active", &self.is_active())
			.finish()
	}
}
