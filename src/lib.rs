//! CivitAI Gallery Bridge
//!
//! Lets a node-graph host browse a remote image gallery, pull per-image
//! generation metadata and preview protected images without the browser ever
//! seeing the API key. Revision-counted stores feed the host's change polling;
//! an allow-listed gateway fetches remote images with the credential attached.

pub mod change;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gallery;
pub mod gateway;
pub mod logging;
pub mod metadata;
pub mod nodes;
pub mod server;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ApiError;
pub use server::{router, serve, AppState};
pub use store::GalleryStores;
