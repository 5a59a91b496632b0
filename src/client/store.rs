//! In-memory holder for the current access credential.

// self
use crate::{_prelude::*, auth::AccessCredential};

/// Process-local slot holding at most one access credential.
///
/// The credential never touches persistent storage. It is replaced by a successful renewal or
/// login and cleared by logout or by a failed renewal.
#[derive(Debug, Default)]
pub struct CredentialStore(RwLock<Option<AccessCredential>>);
impl CredentialStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store seeded with a credential, e.g. one restored by the embedding application.
	pub fn with_credential(credential: AccessCredential) -> Self {
		Self(RwLock::new(Some(credential)))
	}

	/// Returns a copy of the current credential, if any.
	pub fn get(&self) -> Option<AccessCredential> {
		self.0.read().clone()
	}

	/// Returns `true` when no credential is held.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_none()
	}

	/// Stores `credential`, returning the one it replaced.
	pub fn replace(&self, credential: AccessCredential) -> Option<AccessCredential> {
		self.0.write().replace(credential)
	}

	/// Drops the current credential, returning it.
	pub fn clear(&self) -> Option<AccessCredential> {
		self.0.write().take()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn replace_and_clear_return_previous_values() {
		let store = CredentialStore::new();

		assert!(store.is_empty());
		assert!(store.replace(AccessCredential::new("first")).is_none());

		let previous =
			store.replace(AccessCredential::new("second")).expect("First credential should be returned.");

		assert_eq!(previous.expose(), "first");
		assert_eq!(store.get().map(|c| c.expose().to_owned()), Some("second".into()));
		assert_eq!(store.clear().map(|c| c.expose().to_owned()), Some("second".into()));
		assert!(store.get().is_none());
	}
}
