//! E2E: schema compilation.
//!
//! Drives the parser and table initializer together over complete `.skm`
//! files on disk: layout arithmetic, strict mode, file sizing, and the
//! parse failures a schema author actually hits.

use std::fs;

use qcdb::schema::parse::{parse_schema_path, ParseErrorKind, SchemaError};
use qcdb::schema::{generate_table, table_file_size};
use qcdb::HEADER_SIZE;
use tempfile::TempDir;

fn write_schema(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

// ── Scenario: PERSON, padding-free ───────────────────────────────────────────

#[test]
fn person_schema_compiles_to_exact_file() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(
        &dir,
        "person.skm",
        "# three-slot person table\n0 PERSON 3\n0 AGE i 1\n1 NAME c 16\n",
    );

    let object = parse_schema_path(&schema, false).unwrap();
    assert_eq!(object.record_size(), 20);
    assert_eq!(table_file_size(&object), HEADER_SIZE + 60);

    let table = generate_table(&object, dir.path()).unwrap();
    assert_eq!(
        fs::metadata(&table).unwrap().len() as usize,
        HEADER_SIZE + 60
    );
}

#[test]
fn person_schema_passes_strict_mode() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "person.skm", "0 PERSON 3\n0 AGE i 1\n1 NAME c 16\n");
    assert!(parse_schema_path(&schema, true).is_ok());
}

// ── Scenario: MIX, padding before ID ─────────────────────────────────────────

#[test]
fn mix_schema_pads_to_sixteen_bytes() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "mix.skm", "0 MIX 2\n0 FLAG ? 1\n1 ID l 1\n");

    let object = parse_schema_path(&schema, false).unwrap();
    assert_eq!(object.record_size(), 16);
    assert_eq!(object.fields[1].leading_padding, 7);
}

#[test]
fn mix_schema_fails_strict_mode_on_id_field() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "mix.skm", "0 MIX 2\n0 FLAG ? 1\n1 ID l 1\n");

    match parse_schema_path(&schema, true) {
        Err(SchemaError::Parse(e)) => {
            assert_eq!(e.line, 3);
            assert_eq!(
                e.kind,
                ParseErrorKind::AlignmentPadding {
                    field: "ID".to_string(),
                    padding: 7,
                }
            );
        }
        other => panic!("expected strict-mode parse failure, got {:?}", other.map(|o| o.object_name)),
    }
}

// ── Failure semantics ────────────────────────────────────────────────────────

#[test]
fn parse_failure_creates_no_file() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "broken.skm", "0 BROKEN 4\n0 AGE z 1\n");

    let err = parse_schema_path(&schema, false).unwrap_err();
    match err {
        SchemaError::Parse(e) => {
            assert_eq!(e.line, 2);
            assert!(matches!(e.kind, ParseErrorKind::UnknownTypeTag { .. }));
        }
        SchemaError::Io(e) => panic!("unexpected io error: {}", e),
    }
    assert!(!dir.path().join("BROKEN.qcdb").exists());
}

#[test]
fn missing_schema_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.skm");
    assert!(matches!(
        parse_schema_path(&missing, false),
        Err(SchemaError::Io(_))
    ));
}

#[test]
fn comments_and_blank_lines_are_ignored() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(
        &dir,
        "sparse.skm",
        "\n# header comment\n   # indented comment\n\n0 SPARSE 2\n\n0 A I 1\n# trailing\n1 B I 1\n",
    );
    let object = parse_schema_path(&schema, true).unwrap();
    assert_eq!(object.object_name, "SPARSE");
    assert_eq!(object.fields.len(), 2);
    assert_eq!(object.record_size(), 8);
}

#[test]
fn array_fields_size_the_table() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(
        &dir,
        "blob.skm",
        "0 BLOB 5\n0 SEQ L 1\n1 DATA b 56\n",
    );
    let object = parse_schema_path(&schema, true).unwrap();
    assert_eq!(object.record_size(), 64);

    let table = generate_table(&object, dir.path()).unwrap();
    assert_eq!(
        fs::metadata(&table).unwrap().len() as usize,
        HEADER_SIZE + 5 * 64
    );
}

#[test]
fn regenerating_truncates_stale_table() {
    let dir = TempDir::new().unwrap();
    let big = write_schema(&dir, "big.skm", "0 SAME 100\n0 V L 1\n");
    let small = write_schema(&dir, "small.skm", "0 SAME 2\n0 V L 1\n");

    let object = parse_schema_path(&big, false).unwrap();
    generate_table(&object, dir.path()).unwrap();

    let object = parse_schema_path(&small, false).unwrap();
    let table = generate_table(&object, dir.path()).unwrap();
    assert_eq!(
        fs::metadata(&table).unwrap().len() as usize,
        HEADER_SIZE + 2 * 8
    );
}
