//! Line-oriented parser for `.skm` schema files.
//!
//! A schema describes exactly one record layout.  Lines whose first
//! non-space character is `#` are comments; blank lines are ignored.  The
//! first significant line is the object line:
//!
//! ```text
//! <object_number> <object_name> <record_capacity>
//! ```
//!
//! Every following significant line is a field line:
//!
//! ```text
//! <field_number> <field_name> <type_tag_char> <element_count>
//! ```
//!
//! Parse failures carry the 1-based line number and a cause kind; no output
//! file is ever produced from a schema that fails to parse.

use std::fmt;
use std::io;
use std::path::Path;

use crate::schema::layout::{FieldSchema, FieldType, ObjectSchema};

/// Character introducing a schema comment line.
pub const SCHEMA_COMMENT: char = '#';

// ── Errors ───────────────────────────────────────────────────────────────────

/// Cause of a schema parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A significant line had the wrong number of whitespace-separated
    /// tokens.
    TokenCount { expected: usize, found: usize },
    /// A numeric token did not parse as a non-negative integer.
    BadNumber { token: String },
    /// An element count of zero (every field holds at least one element).
    BadElementCount { field: String },
    /// A type-tag token that is not one of the known single-character tags.
    UnknownTypeTag { token: String },
    /// Strict mode: the field would require non-zero leading padding.
    AlignmentPadding { field: String, padding: usize },
    /// The schema contained no object line.
    NoObjectLine,
}

/// A schema parse failure, naming the offending line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number within the schema text.
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            ParseErrorKind::TokenCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            ParseErrorKind::BadNumber { token } => {
                write!(f, "'{}' is not a valid count", token)
            }
            ParseErrorKind::BadElementCount { field } => {
                write!(f, "field '{}' must hold at least one element", field)
            }
            ParseErrorKind::UnknownTypeTag { token } => {
                write!(f, "unknown type tag '{}'", token)
            }
            ParseErrorKind::AlignmentPadding { field, padding } => {
                write!(
                    f,
                    "field '{}' requires {} padding byte(s); strict mode forbids padding",
                    field, padding
                )
            }
            ParseErrorKind::NoObjectLine => write!(f, "schema contains no object line"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Failure to read or parse a schema file.
#[derive(Debug)]
pub enum SchemaError {
    Io(io::Error),
    Parse(ParseError),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Io(e) => write!(f, "{}", e),
            SchemaError::Parse(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchemaError::Io(e) => Some(e),
            SchemaError::Parse(e) => Some(e),
        }
    }
}

impl From<ParseError> for SchemaError {
    fn from(e: ParseError) -> SchemaError {
        SchemaError::Parse(e)
    }
}

impl From<io::Error> for SchemaError {
    fn from(e: io::Error) -> SchemaError {
        SchemaError::Io(e)
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

fn parse_count(token: &str, line: usize) -> Result<usize, ParseError> {
    token.parse::<usize>().map_err(|_| ParseError {
        line,
        kind: ParseErrorKind::BadNumber {
            token: token.to_string(),
        },
    })
}

fn parse_object_line(tokens: &[&str], line: usize) -> Result<ObjectSchema, ParseError> {
    if tokens.len() != 3 {
        return Err(ParseError {
            line,
            kind: ParseErrorKind::TokenCount {
                expected: 3,
                found: tokens.len(),
            },
        });
    }
    let object_number = parse_count(tokens[0], line)?;
    let num_records = parse_count(tokens[2], line)?;
    Ok(ObjectSchema::new(
        object_number,
        tokens[1].to_string(),
        num_records,
    ))
}

fn parse_field_line(tokens: &[&str], line: usize) -> Result<FieldSchema, ParseError> {
    if tokens.len() != 4 {
        return Err(ParseError {
            line,
            kind: ParseErrorKind::TokenCount {
                expected: 4,
                found: tokens.len(),
            },
        });
    }
    let field_number = parse_count(tokens[0], line)?;
    let field_name = tokens[1].to_string();

    let mut tag_chars = tokens[2].chars();
    let field_type = match (tag_chars.next(), tag_chars.next()) {
        (Some(tag), None) => FieldType::from_tag(tag),
        _ => None,
    }
    .ok_or_else(|| ParseError {
        line,
        kind: ParseErrorKind::UnknownTypeTag {
            token: tokens[2].to_string(),
        },
    })?;

    let num_elements = parse_count(tokens[3], line)?;
    if num_elements == 0 {
        return Err(ParseError {
            line,
            kind: ParseErrorKind::BadElementCount { field: field_name },
        });
    }

    Ok(FieldSchema {
        field_number,
        field_name,
        field_type,
        num_elements,
        leading_padding: 0,
    })
}

/// Parses a complete schema text into a record layout.
///
/// In strict mode any field whose computed leading padding is non-zero
/// fails the parse.
pub fn parse_schema_str(text: &str, strict: bool) -> Result<ObjectSchema, ParseError> {
    let mut object: Option<ObjectSchema> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim_start();
        if line.is_empty() || line.starts_with(SCHEMA_COMMENT) {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match object {
            None => {
                object = Some(parse_object_line(&tokens, line_number)?);
            }
            Some(ref mut object) => {
                let field = parse_field_line(&tokens, line_number)?;
                let field_name = field.field_name.clone();
                let padding = object.push_field(field);
                if strict && padding != 0 {
                    return Err(ParseError {
                        line: line_number,
                        kind: ParseErrorKind::AlignmentPadding {
                            field: field_name,
                            padding,
                        },
                    });
                }
            }
        }
    }

    object.ok_or(ParseError {
        line: 0,
        kind: ParseErrorKind::NoObjectLine,
    })
}

/// Reads and parses the schema file at `path`.
pub fn parse_schema_path(path: &Path, strict: bool) -> Result<ObjectSchema, SchemaError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_schema_str(&text, strict)?)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: &str = "\
# example table
0 PERSON 3

0 AGE i 1
1 NAME c 16
";

    #[test]
    fn parses_object_and_fields() {
        let object = parse_schema_str(PERSON, false).unwrap();
        assert_eq!(object.object_number, 0);
        assert_eq!(object.object_name, "PERSON");
        assert_eq!(object.num_records, 3);
        assert_eq!(object.fields.len(), 2);
        assert_eq!(object.record_size(), 20);
        assert_eq!(object.fields[0].field_name, "AGE");
        assert_eq!(object.fields[1].num_elements, 16);
    }

    #[test]
    fn strict_mode_accepts_padding_free_layout() {
        assert!(parse_schema_str(PERSON, true).is_ok());
    }

    #[test]
    fn strict_mode_rejects_padding() {
        let text = "0 MIX 2\n0 FLAG ? 1\n1 ID l 1\n";
        let object = parse_schema_str(text, false).unwrap();
        assert_eq!(object.record_size(), 16);

        let err = parse_schema_str(text, true).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(
            err.kind,
            ParseErrorKind::AlignmentPadding {
                field: "ID".to_string(),
                padding: 7,
            }
        );
    }

    #[test]
    fn comments_allow_leading_spaces() {
        let text = "   # leading comment\n0 T 1\n0 A b 1\n";
        let object = parse_schema_str(text, false).unwrap();
        assert_eq!(object.object_name, "T");
    }

    #[test]
    fn wrong_token_count_names_line() {
        let err = parse_schema_str("0 PERSON 3\n0 AGE i\n", false).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(
            err.kind,
            ParseErrorKind::TokenCount {
                expected: 4,
                found: 3,
            }
        );
    }

    #[test]
    fn unknown_tag_fails() {
        let err = parse_schema_str("0 PERSON 3\n0 AGE w 1\n", false).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownTypeTag {
                token: "w".to_string(),
            }
        );
    }

    #[test]
    fn negative_count_fails() {
        let err = parse_schema_str("0 PERSON 3\n0 AGE i -1\n", false).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, ParseErrorKind::BadNumber { .. }));
    }

    #[test]
    fn zero_element_count_fails() {
        let err = parse_schema_str("0 PERSON 3\n0 AGE i 0\n", false).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::BadElementCount { .. }));
    }

    #[test]
    fn empty_schema_fails() {
        let err = parse_schema_str("# only comments\n\n", false).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NoObjectLine);
    }
}
