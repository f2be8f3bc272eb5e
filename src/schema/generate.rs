//! Table initializer: turns a compiled record layout into a pre-sized,
//! zero-initialized `.qcdb` table file.
//!
//! The file is created at its exact final length, mapped, and the header is
//! constructed in place: name, capacity, zeroed counters, and the embedded
//! process-shared lock.  Any failure along the way removes the partially
//! created file so a bad run never leaves a half-initialized table behind.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;

use crate::db::header::{DbHeader, HEADER_SIZE};
use crate::retcode::DbError;
use crate::schema::layout::ObjectSchema;
use crate::schema::TABLE_EXTENSION;

// ── Errors ───────────────────────────────────────────────────────────────────

/// Failure to create a table file.
#[derive(Debug)]
pub enum GenerateError {
    /// Filesystem error while creating, sizing, mapping, or flushing.
    Io(io::Error),
    /// `pthread_rwlock` initialization failed; carries the error number.
    LockInit(i32),
}

impl GenerateError {
    /// The closed result kind this failure maps onto.
    pub fn retcode(&self) -> DbError {
        match self {
            GenerateError::Io(_) => DbError::Fail,
            GenerateError::LockInit(_) => DbError::LockError,
        }
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Io(e) => write!(f, "{}", e),
            GenerateError::LockInit(rc) => {
                write!(f, "failed to initialize table lock (errno {})", rc)
            }
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerateError::Io(e) => Some(e),
            GenerateError::LockInit(_) => None,
        }
    }
}

impl From<io::Error> for GenerateError {
    fn from(e: io::Error) -> GenerateError {
        GenerateError::Io(e)
    }
}

// ── Creation ─────────────────────────────────────────────────────────────────

/// Exact byte length of a table file for `object`.
pub fn table_file_size(object: &ObjectSchema) -> usize {
    HEADER_SIZE + object.num_records * object.record_size()
}

/// Creates `<dir>/<object_name>.qcdb` for the given layout and returns its
/// path.  A partially created file is removed on any failure.
pub fn generate_table(object: &ObjectSchema, output_dir: &Path) -> Result<PathBuf, GenerateError> {
    let path = output_dir.join(format!("{}{}", object.object_name, TABLE_EXTENSION));
    match create_table(object, &path) {
        Ok(()) => Ok(path),
        Err(e) => {
            let _ = fs::remove_file(&path);
            Err(e)
        }
    }
}

fn create_table(object: &ObjectSchema, path: &Path) -> Result<(), GenerateError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(table_file_size(object) as u64)?;

    let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };

    // set_len zero-filled the whole file; only the non-zero header fields
    // and the lock words need explicit construction.
    let header = mmap.as_mut_ptr() as *mut DbHeader;
    unsafe {
        (*header).object_name = object.name_bytes();
        (*header).num_records = object.num_records as u64;
        (*header).lock.init_in_place().map_err(GenerateError::LockInit)?;
    }

    mmap.flush()?;
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse::parse_schema_str;

    #[test]
    fn file_size_is_exact() {
        let object = parse_schema_str("0 PERSON 3\n0 AGE i 1\n1 NAME c 16\n", false).unwrap();
        assert_eq!(object.record_size(), 20);

        let dir = tempfile::TempDir::new().unwrap();
        let path = generate_table(&object, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "PERSON.qcdb");

        let len = fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(len, HEADER_SIZE + 3 * 20);
    }

    #[test]
    fn header_fields_initialized() {
        let object = parse_schema_str("0 COUNTER 8\n0 N L 1\n", false).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = generate_table(&object, dir.path()).unwrap();

        let bytes = fs::read(&path).unwrap();
        // The byte buffer carries no alignment guarantee for the header.
        let header: DbHeader = unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const DbHeader) };
        assert_eq!(header.object_name_str(), "COUNTER");
        assert_eq!(header.num_records, 8);
        assert_eq!(header.last_written, 0);
        assert_eq!(header.high_water, 0);
    }

    #[test]
    fn record_area_is_zero_filled() {
        let object = parse_schema_str("0 Z 4\n0 V l 2\n", false).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = generate_table(&object, dir.path()).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes[HEADER_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn missing_directory_creates_nothing() {
        let object = parse_schema_str("0 T 1\n0 A b 1\n", false).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("no_such_subdir");
        let err = generate_table(&object, &missing).unwrap_err();
        assert!(matches!(err, GenerateError::Io(_)));
        assert_eq!(err.retcode(), DbError::Fail);
        assert!(!missing.join("T.qcdb").exists());
    }
}
