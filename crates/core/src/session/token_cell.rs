use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Process-wide copy of the current access token.
///
/// Written by [`SessionController`](super::SessionController) on every
/// session change and readable anywhere a clone has been handed out.
#[derive(Clone, Default)]
pub struct TokenCell(Arc<RwLock<Option<String>>>);

impl TokenCell {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self) -> Option<String> {
		self.0.read().clone()
	}

	pub fn is_set(&self) -> bool {
		self.0.read().is_some()
	}

	pub(crate) fn set(&self, token: Option<String>) {
		*self.0.write() = token;
	}
}

impl fmt::Debug for TokenCell {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("TokenCell").field(&self.is_set().then_some("<redacted>")).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clones_observe_writes() {
		let cell = TokenCell::new();
		let reader = cell.clone();
		assert_eq!(reader.get(), None);

		cell.set(Some("abc".into()));
		assert_eq!(reader.get().as_deref(), Some("abc"));

		cell.set(None);
		assert!(!reader.is_set());
	}

	#[test]
	fn debug_hides_token() {
		let cell = TokenCell::new();
		cell.set(Some("secret".into()));
		assert!(!format!("{cell:?}").contains("secret"));
	}
}
