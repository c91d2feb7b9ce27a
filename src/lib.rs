//! warden — session authentication and identifier pooling core.
//!
//! Two bounded, background-maintained caches behind one lifecycle handle:
//! a session table with sliding inactivity expiration (maintained by a
//! periodic sweeper) and a pre-generated identifier pool (kept stocked by a
//! periodic refiller).  See [`runtime::Runtime`] for the boundary surface.

pub mod config;
pub mod credentials;
pub mod error;
pub mod idpool;
pub mod runtime;
pub mod session;

pub use config::Config;
pub use error::AuthError;
pub use runtime::Runtime;
