//! Emits the Rust record declaration for a compiled layout.
//!
//! The engine itself only needs the binary layout; this generator exists so
//! applications can embed a matching `#[repr(C)]` struct without computing
//! offsets by hand.  Alignment padding is spelled out as explicit
//! `_padN: [u8; _]` fields, which keeps the struct free of implicit padding
//! (a requirement of the zerocopy byte-view derives) and makes
//! `size_of::<T>()` equal the schema's record size.

use std::fmt::Write as _;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::schema::layout::ObjectSchema;
use crate::schema::SOURCE_EXTENSION;

/// Failure to emit a record declaration.
#[derive(Debug)]
pub enum CodegenError {
    Io(io::Error),
    /// The record size is not a multiple of the record alignment, so a
    /// `#[repr(C)]` struct would gain trailing padding and no longer match
    /// the table's record stride.  The schema needs trailing `x` fields.
    TrailingPadding { missing: usize },
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::Io(e) => write!(f, "{}", e),
            CodegenError::TrailingPadding { missing } => write!(
                f,
                "record size is not a multiple of its alignment; \
                 add {} trailing 'x' padding byte(s) to the schema",
                missing
            ),
        }
    }
}

impl std::error::Error for CodegenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodegenError::Io(e) => Some(e),
            CodegenError::TrailingPadding { .. } => None,
        }
    }
}

impl From<io::Error> for CodegenError {
    fn from(e: io::Error) -> CodegenError {
        CodegenError::Io(e)
    }
}

/// Renders the record declaration for `object` as Rust source text.
pub fn record_source(object: &ObjectSchema) -> Result<String, CodegenError> {
    let alignment = object.record_alignment();
    let missing = (alignment - object.record_size() % alignment) % alignment;
    if missing != 0 {
        return Err(CodegenError::TrailingPadding { missing });
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "// GENERATED by qcdbgen from schema object {}. Do not edit.",
        object.object_name
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "use zerocopy::{{FromBytes, Immutable, IntoBytes, KnownLayout}};"
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "/// Record layout for the `{}` table: {} bytes per record.",
        object.object_name,
        object.record_size()
    );
    let _ = writeln!(out, "#[repr(C)]");
    let _ = writeln!(
        out,
        "#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]"
    );
    let _ = writeln!(out, "#[allow(non_camel_case_types, non_snake_case)]");
    let _ = writeln!(out, "pub struct {} {{", object.object_name);

    let mut pad_index = 0;
    for field in &object.fields {
        if field.leading_padding != 0 {
            let _ = writeln!(
                out,
                "    pub _pad{}: [u8; {}],",
                pad_index, field.leading_padding
            );
            pad_index += 1;
        }
        let rust_type = field.field_type.rust_type();
        if field.num_elements > 1 {
            let _ = writeln!(
                out,
                "    pub {}: [{}; {}],",
                field.field_name, rust_type, field.num_elements
            );
        } else {
            let _ = writeln!(out, "    pub {}: {},", field.field_name, rust_type);
        }
    }
    let _ = writeln!(out, "}}");
    Ok(out)
}

/// Writes the record declaration to `<dir>/<object_name>.rs` and returns
/// its path.
pub fn generate_record_source(
    object: &ObjectSchema,
    output_dir: &Path,
) -> Result<PathBuf, CodegenError> {
    let source = record_source(object)?;
    let path = output_dir.join(format!("{}{}", object.object_name, SOURCE_EXTENSION));
    fs::write(&path, source)?;
    Ok(path)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse::parse_schema_str;

    #[test]
    fn emits_fields_and_arrays() {
        let object = parse_schema_str("0 PERSON 3\n0 AGE i 1\n1 NAME c 16\n", false).unwrap();
        let source = record_source(&object).unwrap();
        assert!(source.contains("pub struct PERSON {"));
        assert!(source.contains("pub AGE: i32,"));
        assert!(source.contains("pub NAME: [u8; 16],"));
        assert!(!source.contains("_pad"));
    }

    #[test]
    fn emits_explicit_leading_padding() {
        let object = parse_schema_str("0 MIX 2\n0 FLAG ? 1\n1 ID l 1\n", false).unwrap();
        let source = record_source(&object).unwrap();
        assert!(source.contains("pub FLAG: u8,"));
        assert!(source.contains("pub _pad0: [u8; 7],"));
        assert!(source.contains("pub ID: i64,"));
    }

    #[test]
    fn rejects_unaligned_tail() {
        // i32 then a lone byte: size 5, alignment 4, so the repr(C) struct
        // would be 8 bytes.
        let object = parse_schema_str("0 ODD 1\n0 A i 1\n1 B b 1\n", false).unwrap();
        let err = record_source(&object).unwrap_err();
        assert!(matches!(err, CodegenError::TrailingPadding { missing: 3 }));
    }

    #[test]
    fn writes_named_file() {
        let object = parse_schema_str("0 EVENT 4\n0 KIND I 1\n1 STAMP L 1\n", false).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = generate_record_source(&object, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "EVENT.rs");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("// GENERATED by qcdbgen"));
    }
}
