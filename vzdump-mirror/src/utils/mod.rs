//! Utility modules for the mirror.

pub mod errors;
pub mod logger;

pub use errors::{MirrorError, Result};
