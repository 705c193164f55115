//! The persisted next-pick file (spec §6 "Persisted state"): a single
//! decimal integer at `$HOME/.drawboypick`, the 1-based pick to resume
//! weaving from on `--pick last[+N]`.

use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".drawboypick")
}

/// Reads the persisted pick, if the file exists and parses. A missing or
/// unparsable file is not an error here — the caller decides what "no
/// persisted pick" means (spec: "Failed to fetch previous pick. Starting
/// at pick 1.").
pub fn read(path: &std::path::Path) -> Option<i32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
}

/// Writes the next pick to resume from. Called on graceful exit once at
/// least one pick has been sent to the loom.
pub fn write(path: &std::path::Path, next_pick: i32) -> Result<()> {
    std::fs::write(path, next_pick.to_string())
        .with_context(|| format!("writing persisted pick to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_pick_number() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".drawboypick");
        write(&file, 42).unwrap();
        assert_eq!(read(&file), Some(42));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nope");
        assert_eq!(read(&file), None);
    }

    #[test]
    fn garbage_contents_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".drawboypick");
        std::fs::write(&file, "not a number").unwrap();
        assert_eq!(read(&file), None);
    }
}
