//! Byte-level progress of a single backup copy.
//!
//! Used to report how far a throttled copy has come and, once a copy is
//! done, at which average speed it ran.

use std::time::{Duration, Instant};

/// Minimum spacing between two progress reports
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Progress of one file transfer
#[derive(Debug)]
pub struct ProgressTracker {
    total_bytes: u64,
    transferred_bytes: u64,
    start_time: Instant,
    last_report: Instant,
}

impl ProgressTracker {
    /// Start tracking a transfer of `total_bytes`
    pub fn new(total_bytes: u64) -> Self {
        let now = Instant::now();
        Self {
            total_bytes,
            transferred_bytes: 0,
            start_time: now,
            last_report: now,
        }
    }

    /// Account for `bytes` more written.
    ///
    /// Returns true when a report is due, at most once per second.
    pub fn advance(&mut self, bytes: u64) -> bool {
        self.transferred_bytes += bytes;

        let now = Instant::now();
        if now.duration_since(self.last_report) >= REPORT_INTERVAL {
            self.last_report = now;
            true
        } else {
            false
        }
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    /// Percentage complete (0-100); an empty file counts as complete
    pub fn percent_complete(&self) -> f64 {
        if self.total_bytes > 0 {
            (self.transferred_bytes as f64 / self.total_bytes as f64) * 100.0
        } else {
            100.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average speed since start in bytes/second
    pub fn average_speed(&self) -> u64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (self.transferred_bytes as f64 / elapsed) as u64
        } else {
            0
        }
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed as human-readable string
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_tracker_accumulates() {
        let mut tracker = ProgressTracker::new(1000);
        tracker.advance(250);
        tracker.advance(250);
        assert_eq!(tracker.transferred_bytes(), 500);
        assert!((tracker.percent_complete() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_tracker_empty_file_is_complete() {
        let tracker = ProgressTracker::new(0);
        assert!((tracker.percent_complete() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_tracker_reports_at_most_once_per_interval() {
        let mut tracker = ProgressTracker::new(1000);
        assert!(!tracker.advance(10));
        assert!(!tracker.advance(10));

        thread::sleep(REPORT_INTERVAL + Duration::from_millis(50));
        assert!(tracker.advance(10));
        assert!(!tracker.advance(10));
    }

    #[test]
    fn test_average_speed() {
        let mut tracker = ProgressTracker::new(1000);
        thread::sleep(Duration::from_millis(50));
        tracker.advance(1000);
        assert!(tracker.average_speed() > 0);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(1024), "1.00 KB/s");
        assert_eq!(format_speed(1024 * 1024), "1.00 MB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m");
    }
}
