// GENERATED by qcdbgen from schema object CHARACTER. Do not edit.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Record layout for the `CHARACTER` table: 32 bytes per record.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[allow(non_camel_case_types, non_snake_case)]
pub struct CHARACTER {
    pub AGE: i32,
    pub RECORD: u32,
    pub NAME: [u8; 24],
}
