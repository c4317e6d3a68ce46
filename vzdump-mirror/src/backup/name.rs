//! Recognition of Proxmox `vzdump` backup file names.
//!
//! A backup is named `vzdump-qemu-<machine>-<YYYY_MM_DD>-<HH_MM_SS>.vma`,
//! optionally followed by `.gz` or `.lzo`. The timestamp carries no zone
//! and is read as UTC.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

const PREFIX_TOOL: &str = "vzdump";
const PREFIX_KIND: &str = "qemu";
const ARCHIVE_EXTENSION: &str = "vma";
const TIMESTAMP_FORMAT: &str = "%Y_%m_%d-%H_%M_%S";

/// Compression suffix following `.vma`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Lzo,
}

impl Compression {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "gz" => Some(Self::Gzip),
            "lzo" => Some(Self::Lzo),
            _ => None,
        }
    }
}

/// Identity recovered from a backup file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupName {
    /// Machine identifier, kept as an opaque string
    pub machine_id: String,

    /// Snapshot time encoded in the name
    pub snapshot_time: DateTime<Utc>,

    /// Compression suffix
    pub compression: Compression,
}

/// Parse a backup file name.
///
/// Returns `None` for anything that does not follow the naming convention.
/// Matching is case-sensitive and no whitespace is trimmed. A path is
/// reduced to its final component first.
///
/// # Example
/// ```
/// use vzdump_mirror::backup::name::parse_name;
///
/// let name = parse_name("vzdump-qemu-100-2019_03_28-23_59_59.vma.gz").unwrap();
/// assert_eq!(name.machine_id, "100");
/// assert!(parse_name("vzdump-qemu-100-2019_03_28-23_59_59.log").is_none());
/// ```
pub fn parse_name(name: &str) -> Option<BackupName> {
    let base = name.rsplit('/').next().unwrap_or(name);

    let segments: Vec<&str> = base.split('.').collect();
    let compression = match segments.as_slice() {
        [_, ext] if *ext == ARCHIVE_EXTENSION => Compression::None,
        [_, ext, comp] if *ext == ARCHIVE_EXTENSION => Compression::from_extension(comp)?,
        _ => return None,
    };

    let parts: Vec<&str> = segments[0].split('-').collect();
    let [tool, kind, machine_id, date, time] = parts.as_slice() else {
        return None;
    };
    if *tool != PREFIX_TOOL || *kind != PREFIX_KIND {
        return None;
    }

    let snapshot_time = parse_timestamp(date, time)?;

    Some(BackupName {
        machine_id: (*machine_id).to_string(),
        snapshot_time,
        compression,
    })
}

/// `chrono` accepts variable-width years, so the fixed layout is checked
/// before handing the text over. Leap seconds (`60`) are rejected; chrono
/// stores them as second 59 with an overflowing nanosecond field.
fn parse_timestamp(date: &str, time: &str) -> Option<DateTime<Utc>> {
    if !matches_layout(date, "dddd_dd_dd") || !matches_layout(time, "dd_dd_dd") {
        return None;
    }

    let stamp = format!("{}-{}", date, time);
    let naive = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).ok()?;
    if naive.second() >= 60 || naive.nanosecond() >= 1_000_000_000 {
        return None;
    }

    Some(naive.and_utc())
}

/// `d` in the layout stands for one ASCII digit, anything else must match literally.
fn matches_layout(value: &str, layout: &str) -> bool {
    value.len() == layout.len()
        && value.bytes().zip(layout.bytes()).all(|(v, l)| match l {
            b'd' => v.is_ascii_digit(),
            _ => v == l,
        })
}
