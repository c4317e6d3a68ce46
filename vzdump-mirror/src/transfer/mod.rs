//! Moving backup files between directories.

pub mod copy;
pub mod progress;
pub mod throttle;

pub use copy::{copy_backup, CopyOutcome};
pub use throttle::TransferMode;
