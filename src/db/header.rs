//! Fixed-size header stored at byte 0 of every table file.
//!
//! The record array follows immediately at [`HEADER_SIZE`]; the file length
//! is exactly `HEADER_SIZE + capacity * record_size` and never changes after
//! creation.

use crate::db::lock::DbLock;
use crate::schema::layout::OBJECT_NAME_LEN;

/// Table file header.
///
/// The lock leads the struct so the counters behind it share a cache line
/// where the host permits.
#[repr(C)]
pub struct DbHeader {
    /// Inter-process read/write lock covering the whole record array.
    pub lock: DbLock,
    /// Record type name, zero-padded to [`OBJECT_NAME_LEN`] bytes.
    pub object_name: [u8; OBJECT_NAME_LEN],
    /// Number of record slots.  Immutable after creation.
    pub num_records: u64,
    /// Index of the most recent successful write; starting point for
    /// append scans.
    pub last_written: u64,
    /// One past the largest populated record index.
    pub high_water: u64,
}

/// Byte length of the header; the record array begins at this offset.
pub const HEADER_SIZE: usize = std::mem::size_of::<DbHeader>();

impl DbHeader {
    /// The record type name, truncated at the first NUL byte.
    pub fn object_name_str(&self) -> String {
        name_to_string(&self.object_name)
    }
}

/// Decodes a fixed-width header name slot, stopping at the first NUL byte.
pub fn name_to_string(name: &[u8; OBJECT_NAME_LEN]) -> String {
    let end = name.iter().position(|&b| b == 0).unwrap_or(OBJECT_NAME_LEN);
    String::from_utf8_lossy(&name[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_exactly_sized() {
        // No implicit padding: lock, name, then three u64 counters.
        assert_eq!(
            HEADER_SIZE,
            std::mem::size_of::<libc::pthread_rwlock_t>() + OBJECT_NAME_LEN + 3 * 8
        );
    }

    #[test]
    fn object_name_stops_at_nul() {
        let mut header: DbHeader = unsafe { std::mem::zeroed() };
        header.object_name[..6].copy_from_slice(b"PERSON");
        assert_eq!(header.object_name_str(), "PERSON");
    }

    #[test]
    fn object_name_full_width() {
        let mut header: DbHeader = unsafe { std::mem::zeroed() };
        header.object_name = [b'A'; OBJECT_NAME_LEN];
        assert_eq!(header.object_name_str().len(), OBJECT_NAME_LEN);
    }
}
