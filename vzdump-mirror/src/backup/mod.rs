//! Backup file recognition, cataloging and retention.

pub mod catalog;
pub mod name;
pub mod retention;

pub use catalog::{BackupFile, Catalog};
pub use name::{parse_name, BackupName, Compression};
