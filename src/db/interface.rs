//! Mapped table handle and record operations.
//!
//! A [`DbInterface`] opens an existing table file read-write and maps the
//! whole file as a shared mapping, so byte stores are visible to every
//! process mapping the same file.  Records are opaque blobs of exactly
//! `size_of::<O>()` bytes, addressed by zero-based index at
//! `base + HEADER_SIZE + index * record_size`.
//!
//! Every public operation acquires the embedded inter-process lock around
//! the bytes it touches: read operations in shared mode, mutating
//! operations in exclusive mode.  Guards release the lock on every exit
//! path.  Operations acquire at most one lock and never recurse, so there
//! is no deadlock risk.
//!
//! Dropping the handle unmaps the region; the file and its lock survive
//! the process.

use std::fs::OpenOptions;
use std::io;
use std::marker::PhantomData;
use std::mem;
use std::path::Path;
use std::ptr;

use memmap2::{MmapMut, MmapOptions};

use crate::db::finder;
use crate::db::header::{name_to_string, DbHeader, HEADER_SIZE};
use crate::db::lock::DbLock;
use crate::db::Record;
use crate::retcode::DbError;
use crate::util::get_open_file_size;

/// Handle to a mapped table file, polymorphic over the record type.
pub struct DbInterface<O: Record> {
    /// Owns the mapping; dropped last, which unmaps the region.
    _mmap: MmapMut,
    base: *mut u8,
    num_records: usize,
    _record: PhantomData<O>,
}

// The handle holds raw views into a mapping that is shared between
// processes by design; all access to record bytes and header counters is
// mediated by the process-shared lock embedded in the file.
unsafe impl<O: Record> Send for DbInterface<O> {}
unsafe impl<O: Record> Sync for DbInterface<O> {}

impl<O: Record> std::fmt::Debug for DbInterface<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbInterface")
            .field("_mmap", &self._mmap)
            .field("base", &self.base)
            .field("num_records", &self.num_records)
            .finish()
    }
}

impl<O: Record> DbInterface<O> {
    /// Opens and maps the table file at `path`.
    ///
    /// Fails with [`DbError::NotFound`] if the file does not exist and
    /// [`DbError::NullObject`] if its length does not equal
    /// `HEADER_SIZE + capacity * size_of::<O>()` (wrong record type, or not
    /// a table file).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<DbInterface<O>, DbError> {
        let record_size = mem::size_of::<O>();
        if record_size == 0 {
            return Err(DbError::BadArg);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => DbError::NotFound,
                _ => DbError::Fail,
            })?;

        let file_size = get_open_file_size(&file) as usize;
        if file_size < HEADER_SIZE {
            return Err(DbError::NullObject);
        }

        #[cfg(target_os = "linux")]
        let mapped = {
            let mut options = MmapOptions::new();
            options.populate();
            unsafe { options.map_mut(&file) }
        };
        #[cfg(not(target_os = "linux"))]
        let mapped = unsafe { MmapOptions::new().map_mut(&file) };

        let mut mmap = mapped.map_err(|_| DbError::AllocFail)?;
        let base = mmap.as_mut_ptr();

        let num_records = unsafe { (*(base as *const DbHeader)).num_records } as usize;
        if file_size != HEADER_SIZE + num_records * record_size {
            return Err(DbError::NullObject);
        }

        Ok(DbInterface {
            _mmap: mmap,
            base,
            num_records,
            _record: PhantomData,
        })
    }

    // ── Raw views ────────────────────────────────────────────────────────────
    //
    // Derived record addresses are never held across lock boundaries; each
    // helper computes its view from `base` while the caller holds the
    // appropriate guard, and the transient slices are dropped before any
    // conflicting access.

    fn header_ptr(&self) -> *mut DbHeader {
        self.base as *mut DbHeader
    }

    fn db_lock(&self) -> &DbLock {
        unsafe { &(*(self.base as *const DbHeader)).lock }
    }

    fn slot_ptr(&self, record: usize) -> *mut u8 {
        debug_assert!(record < self.num_records);
        unsafe {
            self.base
                .add(HEADER_SIZE + record * mem::size_of::<O>())
        }
    }

    /// Record region as one shared slice.  Callers hold at least the read
    /// lock and perform no writes while the slice is alive.
    fn records(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self.base.add(HEADER_SIZE),
                self.num_records * mem::size_of::<O>(),
            )
        }
    }

    fn read_record(&self, record: usize) -> O {
        let size = mem::size_of::<O>();
        let slot = unsafe { std::slice::from_raw_parts(self.slot_ptr(record), size) };
        O::read_from_bytes(slot).expect("slot length equals record size")
    }

    fn write_record(&self, record: usize, object: &O) {
        let size = mem::size_of::<O>();
        let slot = unsafe { std::slice::from_raw_parts_mut(self.slot_ptr(record), size) };
        slot.copy_from_slice(object.as_bytes());
    }

    fn slot_empty(&self, record: usize) -> bool {
        let size = mem::size_of::<O>();
        let slot = unsafe { std::slice::from_raw_parts(self.slot_ptr(record), size) };
        slot.iter().all(|&b| b == 0)
    }

    /// Populated record count, clamped against a corrupt header.
    fn populated(&self) -> usize {
        (unsafe { (*self.header_ptr()).high_water } as usize).min(self.num_records)
    }

    fn bump_marks(&self, record: usize) {
        let header = self.header_ptr();
        unsafe {
            (*header).last_written = record as u64;
            if (*header).high_water < record as u64 + 1 {
                (*header).high_water = record as u64 + 1;
            }
        }
    }

    // ── Single-record operations ─────────────────────────────────────────────

    /// Copies the record at `record` out of the table.
    pub fn read(&self, record: usize) -> Result<O, DbError> {
        if record >= self.num_records {
            return Err(DbError::NotFound);
        }
        let _guard = self.db_lock().read()?;
        Ok(self.read_record(record))
    }

    /// Stores `object` at `record`, advancing the last-written index and
    /// the high-water mark.
    pub fn write_at(&self, record: usize, object: &O) -> Result<(), DbError> {
        if record >= self.num_records {
            return Err(DbError::NotFound);
        }
        let _guard = self.db_lock().write()?;
        self.write_record(record, object);
        self.bump_marks(record);
        Ok(())
    }

    /// Stores `object` in the first empty slot at or after the last-written
    /// index and returns that slot.
    ///
    /// An empty slot is one whose bytes are all zero, so a record whose
    /// every field is legitimately zero is indistinguishable from a free
    /// slot; schemas for such records should lead with a `? VALID 1`
    /// presence field.  When no free slot remains at or after the scan
    /// start, the table is unchanged and the capacity-exhausted kind is
    /// returned.
    pub fn append(&self, object: &O) -> Result<usize, DbError> {
        let _guard = self.db_lock().write()?;
        let start = unsafe { (*self.header_ptr()).last_written } as usize;
        for record in start..self.num_records {
            if self.slot_empty(record) {
                self.write_record(record, object);
                self.bump_marks(record);
                return Ok(record);
            }
        }
        Err(DbError::EndOfData { written: 0 })
    }

    /// Zeroes the record at `record`.  When the topmost populated record is
    /// deleted, the high-water mark walks back over trailing empty slots.
    pub fn delete(&self, record: usize) -> Result<(), DbError> {
        if record >= self.num_records {
            return Err(DbError::NotFound);
        }
        let _guard = self.db_lock().write()?;
        unsafe {
            ptr::write_bytes(self.slot_ptr(record), 0, mem::size_of::<O>());
        }
        let header = self.header_ptr();
        unsafe {
            if (*header).high_water == record as u64 + 1 {
                let mut high_water = record;
                while high_water > 0 && self.slot_empty(high_water - 1) {
                    high_water -= 1;
                }
                (*header).high_water = high_water as u64;
            }
        }
        Ok(())
    }

    /// Zeroes every record slot (not the header) and resets the
    /// last-written index and high-water mark.
    pub fn clear(&self) -> Result<(), DbError> {
        let _guard = self.db_lock().write()?;
        unsafe {
            ptr::write_bytes(
                self.base.add(HEADER_SIZE),
                0,
                self.num_records * mem::size_of::<O>(),
            );
            let header = self.header_ptr();
            (*header).last_written = 0;
            (*header).high_water = 0;
        }
        Ok(())
    }

    // ── Bulk operations ──────────────────────────────────────────────────────

    /// Copies every requested record into its paired output slot under one
    /// shared lock.
    ///
    /// The sequence is sorted by index ascending in place for
    /// cache-friendly access.  Any out-of-range index fails the whole call
    /// before any payload is written.
    pub fn read_many(&self, pairs: &mut [(usize, O)]) -> Result<(), DbError> {
        pairs.sort_by_key(|pair| pair.0);
        let max_record = match pairs.last() {
            Some(pair) => pair.0,
            None => return Ok(()),
        };
        if max_record >= self.num_records {
            return Err(DbError::NotFound);
        }

        let _guard = self.db_lock().read()?;
        for (record, out) in pairs.iter_mut() {
            *out = self.read_record(*record);
        }
        Ok(())
    }

    /// Stores every paired record under one exclusive lock, then advances
    /// the last-written index to the largest index written.
    ///
    /// Sorted and validated like [`DbInterface::read_many`]; an
    /// out-of-range index fails the whole call before any slot is touched.
    pub fn write_at_many(&self, pairs: &mut [(usize, O)]) -> Result<(), DbError> {
        pairs.sort_by_key(|pair| pair.0);
        let max_record = match pairs.last() {
            Some(pair) => pair.0,
            None => return Ok(()),
        };
        if max_record >= self.num_records {
            return Err(DbError::NotFound);
        }

        let _guard = self.db_lock().write()?;
        for (record, object) in pairs.iter() {
            self.write_record(*record, object);
        }
        self.bump_marks(max_record);
        Ok(())
    }

    /// Appends each record into the next empty slot, scanning forward from
    /// the last-written index.  Returns the number written; when the scan
    /// reaches capacity first, the capacity-exhausted kind carries that
    /// count.
    pub fn append_many(&self, objects: &[O]) -> Result<usize, DbError> {
        let _guard = self.db_lock().write()?;
        let start = unsafe { (*self.header_ptr()).last_written } as usize;

        let mut written = 0;
        let mut last_slot = None;
        let mut record = start;
        while record < self.num_records && written < objects.len() {
            if self.slot_empty(record) {
                self.write_record(record, &objects[written]);
                written += 1;
                last_slot = Some(record);
            }
            record += 1;
        }

        if let Some(slot) = last_slot {
            self.bump_marks(slot);
        }
        if written < objects.len() {
            return Err(DbError::EndOfData { written });
        }
        Ok(written)
    }

    // ── Searches ─────────────────────────────────────────────────────────────

    /// Returns the lowest index below the high-water mark whose record
    /// satisfies `predicate`.
    pub fn find_first<P>(&self, predicate: P) -> Result<usize, DbError>
    where
        P: Fn(&O) -> bool,
    {
        let _guard = self.db_lock().read()?;
        for record in 0..self.populated() {
            let object = self.read_record(record);
            if predicate(&object) {
                return Ok(record);
            }
        }
        Err(DbError::NotFound)
    }

    /// Returns every record below the high-water mark satisfying
    /// `predicate`, in ascending index order.
    ///
    /// The populated region is sharded across parallel workers while this
    /// call holds the shared lock; see [`finder`].  A predicate panic is
    /// trapped in its worker and surfaced as a scan failure after the lock
    /// is released; partial results are discarded.
    pub fn find_all<P>(&self, predicate: P) -> Result<Vec<O>, DbError>
    where
        P: Fn(&O) -> bool + Sync,
    {
        let _guard = self.db_lock().read()?;
        finder::scan(self.records(), self.populated(), &predicate)
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    /// Number of record slots.  Cached at open; no lock taken.
    pub fn capacity(&self) -> usize {
        self.num_records
    }

    /// Index of the most recent successful write.
    pub fn last_written(&self) -> Result<usize, DbError> {
        let _guard = self.db_lock().read()?;
        Ok(unsafe { (*self.header_ptr()).last_written } as usize)
    }

    /// One past the largest populated record index.
    pub fn high_water(&self) -> Result<usize, DbError> {
        let _guard = self.db_lock().read()?;
        Ok(unsafe { (*self.header_ptr()).high_water } as usize)
    }

    /// Record type name from the header.  The name is immutable after
    /// table creation, so no lock is taken.
    pub fn object_name(&self) -> String {
        let name = unsafe { ptr::addr_of!((*self.header_ptr()).object_name).read() };
        name_to_string(&name)
    }
}
