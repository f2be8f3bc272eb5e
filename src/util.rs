//! Small host queries shared by the engine and the front ends.

use std::fs::File;

/// Returns the size in bytes of the open file `file`.
///
/// Returns `0` if `file` does not refer to a regular file (e.g. a pipe or a
/// directory), so callers can treat "not a table file" and "empty" the same
/// way.
pub fn get_open_file_size(file: &File) -> u64 {
    file.metadata()
        .ok()
        .filter(|m| m.file_type().is_file())
        .map(|m| m.len())
        .unwrap_or(0)
}

/// Returns the number of online CPU cores, at least 1.
pub fn count_cores() -> usize {
    num_cpus::get().max(1)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn count_cores_at_least_one() {
        assert!(count_cores() >= 1);
    }

    #[test]
    fn open_file_size_matches_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sized.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();
        assert_eq!(get_open_file_size(&file), 10);
    }

    #[test]
    fn open_file_size_zero_for_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = File::open(dir.path()).unwrap();
        assert_eq!(get_open_file_size(&file), 0);
    }
}
