//! Auth-domain identifiers, credentials, claims, and failure challenges.

pub mod challenge;
pub mod claims;
pub mod credential;
pub mod id;
pub mod payload;

pub use challenge::*;
pub use claims::*;
pub use credential::*;
pub use id::*;
pub use payload::*;
