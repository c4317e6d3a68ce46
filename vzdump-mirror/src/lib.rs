//! vzdump mirror library
//!
//! Mirrors the most recent Proxmox `vzdump` backups of every machine from a
//! source directory to a destination directory, pruning older ones there.

pub mod backup;
pub mod config;
pub mod sync;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use sync::{synchronize, SyncOptions, SyncReport};
pub use utils::errors::{MirrorError, Result};
