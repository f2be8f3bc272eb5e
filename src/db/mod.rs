//! The record engine: mapped table handles, the embedded inter-process
//! lock, and record operations.
//!
//! Submodules:
//! - [`header`]    : on-disk table header and [`header::HEADER_SIZE`]
//! - [`lock`]      : process-shared rwlock embedded in the header
//! - [`interface`] : [`DbInterface`], the mapped table handle
//! - [`finder`]    : sharded parallel predicate scans

pub mod finder;
pub mod header;
pub mod interface;
pub mod lock;

pub use interface::DbInterface;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Bounds for types usable as table records.
///
/// A record is a plain-bytes value of fixed size: any bit pattern of its
/// length is valid (`FromBytes`), it exposes its bytes without padding
/// (`IntoBytes`), and it is copied in and out of the mapping by value.
/// Derive the zerocopy traits on a `#[repr(C)]` struct, or let `qcdbgen`
/// emit the declaration from a schema.
pub trait Record: FromBytes + IntoBytes + Immutable + KnownLayout + Copy + Send + Sync {}

impl<T: FromBytes + IntoBytes + Immutable + KnownLayout + Copy + Send + Sync> Record for T {}

/// Copies the record at `index` out of a raw record region.
pub(crate) fn read_slot<O: Record>(records: &[u8], index: usize) -> O {
    let size = std::mem::size_of::<O>();
    O::read_from_bytes(&records[index * size..(index + 1) * size])
        .expect("slot length equals record size")
}
