//! Client-side session continuity: credential storage, single-flight renewal, and request replay.
//!
//! [`CredentialStore`] holds the current access credential in memory. [`RefreshCoordinator`]
//! guarantees at most one renewal call is in flight and fans its outcome out to every caller
//! that observed the same expired credential. [`Session`] attaches the credential to outbound
//! requests and replays a request at most once after a renewable 401.

pub mod coordinator;
pub mod renewal;
pub mod retry;
#[cfg(feature = "reqwest")] pub mod session;
pub mod store;

#[cfg(feature = "reqwest")] mod http;

pub use coordinator::*;
pub use renewal::*;
pub use retry::*;
#[cfg(feature = "reqwest")] pub use session::*;
pub use store::*;
