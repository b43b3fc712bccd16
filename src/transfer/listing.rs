//! Directory listings
//!
//! Formats directory entries as UNIX-style `ls -l` lines.

use chrono::{DateTime, Local};
use std::io;
use std::path::Path;
use std::time::SystemTime;

const PERMISSIONS: &str = "rw-rw-rw-";

/// The fields of one listing line.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl ListingEntry {
    /// `drw-rw-rw- 1 user group       4096 2024-05-01 13:37 name\r\n`
    pub fn to_line(&self) -> String {
        format!(
            "{}{} 1 user group {:>10} {} {}\r\n",
            if self.is_dir { 'd' } else { '-' },
            PERMISSIONS,
            self.size,
            self.modified.format("%Y-%m-%d %H:%M"),
            self.name
        )
    }
}

/// Reads `dir` and returns one formatted line per entry, sorted by name.
/// `.` and `..` never appear.
pub async fn read_listing(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "." || name == ".." {
            continue;
        }

        let metadata = entry.metadata().await?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        entries.push(ListingEntry {
            name,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: DateTime::<Local>::from(modified),
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries.iter().map(ListingEntry::to_line).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_file_and_directory_lines() {
        let modified = Local.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap();
        let file = ListingEntry {
            name: "a.txt".into(),
            is_dir: false,
            size: 5,
            modified,
        };
        assert_eq!(
            file.to_line(),
            "-rw-rw-rw- 1 user group          5 2024-05-01 13:37 a.txt\r\n"
        );

        let dir = ListingEntry {
            name: "docs".into(),
            is_dir: true,
            size: 4096,
            modified,
        };
        assert!(dir.to_line().starts_with("drw-rw-rw- 1 user group       4096 "));
    }

    #[tokio::test]
    async fn lists_entries_sorted_without_dot_entries() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();

        let lines = read_listing(tmp.path()).await.unwrap();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('-') && lines[0].ends_with(" a.txt\r\n"));
        assert!(lines[1].ends_with(" b.txt\r\n"));
        assert!(lines[2].starts_with('d') && lines[2].ends_with(" sub\r\n"));
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_listing(&tmp.path().join("gone")).await.is_err());
    }
}
