//! Binary entry point for the `qcdbgen` schema compiler.
//!
//! Control flow: parse arguments, read and parse the schema, create the
//! table file, optionally emit the record declaration.  Exit code is 0 on
//! success and the error kind's code otherwise.

use qcdb::cli::args::{parse_args, print_usage, ParsedArgs};
use qcdb::cli::constants::{GENERATOR_NAME, VERSION_STRING};
use qcdb::displaylevel;
use qcdb::retcode::DbError;
use qcdb::schema::codegen::generate_record_source;
use qcdb::schema::{generate_table, parse_schema_path, table_file_size, SchemaError};
use std::path::Path;

/// Compile the schema and emit the table (and optional record source).
///
/// Returns the process exit code.
fn run(args: ParsedArgs) -> i32 {
    displaylevel!(3, "*** {} v{} ***\n", GENERATOR_NAME, VERSION_STRING);

    let schema_path = Path::new(&args.schema_path);
    let object = match parse_schema_path(schema_path, args.strict) {
        Ok(object) => object,
        Err(SchemaError::Io(e)) => {
            displaylevel!(1, "{}: cannot read schema: {}\n", args.schema_path, e);
            return DbError::NotFound.exit_code();
        }
        Err(SchemaError::Parse(e)) => {
            displaylevel!(1, "{}: {}\n", args.schema_path, e);
            return DbError::BadArg.exit_code();
        }
    };

    displaylevel!(
        3,
        "object {} ({}): {} records, {} bytes each\n",
        object.object_number,
        object.object_name,
        object.num_records,
        object.record_size()
    );
    for field in &object.fields {
        displaylevel!(
            4,
            "  field {} {} {} x{} (+{} padding)\n",
            field.field_number,
            field.field_name,
            field.field_type,
            field.num_elements,
            field.leading_padding
        );
    }

    let table_path = match generate_table(&object, Path::new(&args.table_dir)) {
        Ok(path) => path,
        Err(e) => {
            displaylevel!(1, "{}: cannot create table: {}\n", object.object_name, e);
            return e.retcode().exit_code();
        }
    };
    displaylevel!(
        2,
        "{}: {} bytes ({} records x {} bytes + header)\n",
        table_path.display(),
        table_file_size(&object),
        object.num_records,
        object.record_size()
    );

    if let Some(source_dir) = args.source_dir.as_deref() {
        match generate_record_source(&object, Path::new(source_dir)) {
            Ok(path) => displaylevel!(2, "{}\n", path.display()),
            Err(e) => {
                displaylevel!(1, "{}: cannot emit record source: {}\n", object.object_name, e);
                return DbError::Fail.exit_code();
            }
        }
    }

    0
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {}", GENERATOR_NAME, e);
            print_usage(GENERATOR_NAME);
            std::process::exit(DbError::BadArg.exit_code());
        }
    };
    if args.exit_early {
        return;
    }
    std::process::exit(run(args));
}
