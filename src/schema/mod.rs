//! Schema compilation: parsing a textual record definition into a layout,
//! sizing and creating the table file, and emitting the matching record
//! declaration.
//!
//! Submodules:
//! - [`layout`]   : field/record layout model and padding arithmetic
//! - [`parse`]    : line-oriented `.skm` parser
//! - [`generate`] : table-file initializer
//! - [`codegen`]  : Rust record declaration emitter

pub mod codegen;
pub mod generate;
pub mod layout;
pub mod parse;

/// File extension of schema definition files.
pub const SCHEMA_EXTENSION: &str = ".skm";
/// File extension of table files.
pub const TABLE_EXTENSION: &str = ".qcdb";
/// File extension of generated record declarations.
pub const SOURCE_EXTENSION: &str = ".rs";

pub use generate::{generate_table, table_file_size, GenerateError};
pub use layout::{FieldSchema, FieldType, ObjectSchema, OBJECT_NAME_LEN};
pub use parse::{parse_schema_path, parse_schema_str, ParseError, ParseErrorKind, SchemaError};
