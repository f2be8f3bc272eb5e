//! qcdb: a lightweight, embedded, fixed-schema record store.
//!
//! A table is a single file: a fixed header followed by a pre-allocated
//! array of fixed-size records, memory-mapped by every process that opens
//! it and coordinated through a process-shared read/write lock embedded in
//! the header.  Records are addressed by zero-based index; the capacity is
//! fixed at creation.
//!
//! The crate has two halves:
//!
//! - the **schema compiler** ([`schema`]): parses a textual record
//!   definition (`.skm`), computes the binary layout with its alignment
//!   padding, and emits a pre-sized, zero-initialized table file (`.qcdb`);
//! - the **record engine** ([`db`]): maps a table file and serves
//!   concurrent read, write, search, and delete operations, sharding large
//!   predicate scans across worker threads.
//!
//! ```no_run
//! use qcdb::{DbInterface, DbError};
//! use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
//!
//! #[repr(C)]
//! #[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
//! struct Person {
//!     age: i32,
//!     name: [u8; 16],
//! }
//!
//! fn main() -> Result<(), DbError> {
//!     let db: DbInterface<Person> = DbInterface::open("PERSON.qcdb")?;
//!     let slot = db.append(&Person { age: 5, name: [0; 16] })?;
//!     let person = db.read(slot)?;
//!     assert_eq!(person.age, 5);
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("qcdb requires a POSIX host for its process-shared table lock");

pub mod cli;
pub mod db;
pub mod retcode;
pub mod schema;
pub mod util;

pub use db::{DbInterface, Record};
pub use retcode::DbError;
pub use schema::{
    generate_table, parse_schema_path, parse_schema_str, FieldSchema, FieldType, GenerateError,
    ObjectSchema, ParseError, ParseErrorKind, SchemaError,
};

pub use db::header::{DbHeader, HEADER_SIZE};
