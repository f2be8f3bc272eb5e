//! Command-line argument parsing for the `qcdbgen` front end.
//!
//! The entry points are [`parse_args`] (reads `std::env::args()`) and
//! [`parse_args_from`] (takes an explicit slice, suitable for unit tests).
//! Bad or unrecognised options return an `Err` whose message begins with
//! `"bad usage: "`; the caller prints it together with the usage text and
//! exits with the bad-argument code.

use anyhow::{anyhow, Result};

use crate::cli::constants::{display_level, set_display_level, GENERATOR_NAME, VERSION_STRING};

/// Complete set of options produced by the argument parsing loop.
#[derive(Debug)]
pub struct ParsedArgs {
    /// Path to the schema file (`-s`).  Always present unless
    /// `exit_early` is set.
    pub schema_path: String,
    /// Output directory for the table file (`-o`); defaults to the current
    /// directory.
    pub table_dir: String,
    /// Output directory for the generated record declaration (`-g`);
    /// nothing is emitted when absent.
    pub source_dir: Option<String>,
    /// Reject layouts that require any inter-field padding (`--strict`).
    pub strict: bool,
    /// A `--help` / `--version` flag was handled; the caller should exit 0
    /// without compiling anything.
    pub exit_early: bool,
}

/// Prints the usage banner.
pub fn print_usage(exe_name: &str) {
    println!("Usage: {} -s <schema{}> [options]", exe_name, crate::schema::SCHEMA_EXTENSION);
    println!();
    println!("Options:");
    println!("  -s <file>   schema file to compile (required)");
    println!("  -o <dir>    directory for the generated table file (default: .)");
    println!("  -g <dir>    directory for the generated record declaration");
    println!("  --strict    reject layouts that need alignment padding");
    println!("  -v          increase verbosity (repeatable)");
    println!("  -q          decrease verbosity");
    println!("  -h, --help  print this help and exit");
    println!("  -V, --version  print the version and exit");
}

/// Parses `std::env::args()` (skipping argv[0]).
pub fn parse_args() -> Result<ParsedArgs> {
    let exe_name = std::env::args().next().unwrap_or_default();
    let argv: Vec<String> = std::env::args().skip(1).collect();
    parse_args_from(&exe_name, &argv)
}

/// Parses an explicit argument list.  `exe_name` is argv[0], used in the
/// help text; `argv` is argv[1..].
pub fn parse_args_from(exe_name: &str, argv: &[String]) -> Result<ParsedArgs> {
    let mut schema_path: Option<String> = None;
    let mut table_dir: Option<String> = None;
    let mut source_dir: Option<String> = None;
    let mut strict = false;
    let mut exit_early = false;

    let take_value = |iter: &mut std::slice::Iter<'_, String>, option: &str| {
        iter.next()
            .cloned()
            .ok_or_else(|| anyhow!("bad usage: option {} requires a value", option))
    };

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-s" => schema_path = Some(take_value(&mut iter, "-s")?),
            "-o" => table_dir = Some(take_value(&mut iter, "-o")?),
            "-g" => source_dir = Some(take_value(&mut iter, "-g")?),
            "--strict" => strict = true,
            "-v" => set_display_level(display_level() + 1),
            "-q" => set_display_level(display_level() - 1),
            "-h" | "--help" => {
                print_usage(exe_name);
                exit_early = true;
            }
            "-V" | "--version" => {
                println!("{} v{}", GENERATOR_NAME, VERSION_STRING);
                exit_early = true;
            }
            unknown => return Err(anyhow!("bad usage: unknown option '{}'", unknown)),
        }
    }

    if exit_early {
        return Ok(ParsedArgs {
            schema_path: String::new(),
            table_dir: String::new(),
            source_dir: None,
            strict,
            exit_early,
        });
    }

    let schema_path =
        schema_path.ok_or_else(|| anyhow!("bad usage: missing required option -s"))?;

    Ok(ParsedArgs {
        schema_path,
        table_dir: table_dir.unwrap_or_else(|| "./".to_string()),
        source_dir,
        strict,
        exit_early: false,
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn schema_path_is_required() {
        let err = parse_args_from("qcdbgen", &args(&[])).unwrap_err();
        assert!(err.to_string().starts_with("bad usage:"));
    }

    #[test]
    fn parses_full_option_set() {
        let parsed = parse_args_from(
            "qcdbgen",
            &args(&["-s", "person.skm", "-o", "/tmp/tables", "-g", "/tmp/src", "--strict"]),
        )
        .unwrap();
        assert_eq!(parsed.schema_path, "person.skm");
        assert_eq!(parsed.table_dir, "/tmp/tables");
        assert_eq!(parsed.source_dir.as_deref(), Some("/tmp/src"));
        assert!(parsed.strict);
        assert!(!parsed.exit_early);
    }

    #[test]
    fn table_dir_defaults_to_current() {
        let parsed = parse_args_from("qcdbgen", &args(&["-s", "x.skm"])).unwrap();
        assert_eq!(parsed.table_dir, "./");
        assert_eq!(parsed.source_dir, None);
        assert!(!parsed.strict);
    }

    #[test]
    fn unknown_option_is_bad_usage() {
        let err = parse_args_from("qcdbgen", &args(&["-s", "x.skm", "--frobnicate"])).unwrap_err();
        assert!(err.to_string().contains("--frobnicate"));
    }

    #[test]
    fn missing_value_is_bad_usage() {
        let err = parse_args_from("qcdbgen", &args(&["-s"])).unwrap_err();
        assert!(err.to_string().contains("-s"));
    }

    #[test]
    fn help_exits_early_without_schema() {
        let parsed = parse_args_from("qcdbgen", &args(&["--help"])).unwrap();
        assert!(parsed.exit_early);
    }
}
