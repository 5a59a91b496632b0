//! Subject lookup seam used by login and renewal.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{Role, SubjectId, SubjectProfile},
};

/// Boxed future returned by [`SubjectDirectory`] methods.
pub type DirectoryFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, DirectoryError>> + 'a + Send>>;

/// Persistence contract for the accounts that may hold a session.
pub trait SubjectDirectory
where
	Self: Send + Sync,
{
	/// Returns the subject whose email and password match, or `None` for bad credentials.
	fn authenticate<'a>(
		&'a self,
		email: &'a str,
		password: &'a str,
	) -> DirectoryFuture<'a, Option<SubjectProfile>>;

	/// Looks a subject up by identifier; renewal calls this so role changes apply immediately.
	fn find<'a>(&'a self, id: &'a SubjectId) -> DirectoryFuture<'a, Option<SubjectProfile>>;
}

/// Error type produced by [`SubjectDirectory`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DirectoryError {
	/// Backend-level failure for the account store.
	#[error("Directory backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[derive(Clone, Debug)]
struct MemoryEntry {
	profile: SubjectProfile,
	password_digest: [u8; 32],
}

type DirectoryMap = Arc<RwLock<HashMap<SubjectId, MemoryEntry>>>;

/// Thread-safe in-process directory for tests and demos.
///
/// Passwords are kept as salted SHA-256 digests; use a real password hash in production stores.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory(DirectoryMap);
impl MemoryDirectory {
	/// Creates an empty directory.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers or replaces a subject with the given password.
	pub fn insert(&self, profile: SubjectProfile, password: &str) {
		let password_digest = digest(&profile.id, password);

		self.0.write().insert(profile.id.clone(), MemoryEntry { profile, password_digest });
	}

	/// Changes a subject's role, returning `false` when the subject is unknown.
	pub fn set_role(&self, id: &SubjectId, role: Role) -> bool {
		match self.0.write().get_mut(id) {
			Some(entry) => {
				entry.profile.role = role;

				true
			},
			None => false,
		}
	}

	/// Removes a subject so later renewals for it fail.
	pub fn remove(&self, id: &SubjectId) -> Option<SubjectProfile> {
		self.0.write().remove(id).map(|entry| entry.profile)
	}

	fn authenticate_now(map: &DirectoryMap, email: &str, password: &str) -> Option<SubjectProfile> {
		let guard = map.read();
		let entry = guard.values().find(|entry| entry.profile.email.eq_ignore_ascii_case(email))?;

		(entry.password_digest == digest(&entry.profile.id, password))
			.then(|| entry.profile.clone())
	}

	fn find_now(map: &DirectoryMap, id: &SubjectId) -> Option<SubjectProfile> {
		map.read().get(id).map(|entry| entry.profile.clone())
	}
}
impl SubjectDirectory for MemoryDirectory {
	fn authenticate<'a>(
		&'a self,
		email: &'a str,
		password: &'a str,
	) -> DirectoryFuture<'a, Option<SubjectProfile>> {
		let found = Self::authenticate_now(&self.0, email.trim(), password);

		Box::pin(async move { Ok(found) })
	}

	fn find<'a>(&'a self, id: &'a SubjectId) -> DirectoryFuture<'a, Option<SubjectProfile>> {
		let found = Self::find_now(&self.0, id);

		Box::pin(async move { Ok(found) })
	}
}

fn digest(id: &SubjectId, password: &str) -> [u8; 32] {
	let mut hasher = Sha256::new();

	hasher.update(id.as_ref().as_bytes());
	hasher.update([0]);
	hasher.update(password.as_bytes());

	let mut out = [0; 32];

	out.copy_from_slice(&hasher.finalize());

	out
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{role, subject};

	fn directory() -> MemoryDirectory {
		let directory = MemoryDirectory::new();

		directory.insert(
			SubjectProfile {
				id: subject("user-1"),
				email: "ops@farm.example".into(),
				name: "Ops".into(),
				role: role("manager"),
			},
			"correct horse",
		);

		directory
	}

	#[tokio::test]
	async fn authenticate_matches_email_case_insensitively() {
		let directory = directory();
		let found = directory
			.authenticate("OPS@farm.example", "correct horse")
			.await
			.expect("In-memory directory should not fail.");

		assert_eq!(found.map(|profile| profile.id), Some(subject("user-1")));
	}

	#[tokio::test]
	async fn wrong_password_and_unknown_email_yield_none() {
		let directory = directory();

		let wrong_password = directory
			.authenticate("ops@farm.example", "battery staple")
			.await
			.expect("Lookup should not fail.");
		let unknown_email = directory
			.authenticate("nobody@farm.example", "correct horse")
			.await
			.expect("Lookup should not fail.");

		assert!(wrong_password.is_none());
		assert!(unknown_email.is_none());
	}

	#[tokio::test]
	async fn role_changes_are_visible_to_find() {
		let directory = directory();

		assert!(directory.set_role(&subject("user-1"), role("viewer")));

		let found = directory
			.find(&subject("user-1"))
			.await
			.expect("Lookup should not fail.")
			.expect("Subject should exist.");

		assert_eq!(found.role, role("viewer"));
		assert!(!directory.set_role(&subject("ghost"), role("viewer")));
	}
}
