//! Multi-process / multi-thread stress driver for a CHARACTER table.
//!
//! Spawns equal groups of writers and readers against one table file.
//! Writers batch random-index stores via `write_at_many`; readers batch
//! random-index loads via `read_many`.  In the default threaded mode all
//! workers share the parent process and report their totals over a
//! channel; with `--fork` each worker is a forked child process with its
//! own mapping, which exercises the cross-process lock the way separate
//! applications would.
//!
//! The table must exist first:
//!
//! ```text
//! qcdbgen -s demos/character.skm
//! qcdbstress -d CHARACTER.qcdb -s 2 -p 4
//! ```

mod character;

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::unbounded;
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult};
use zerocopy::FromZeros;

use character::CHARACTER;
use qcdb::cli::constants::{display_level, set_display_level, STRESS_NAME, VERSION_STRING};
use qcdb::displaylevel;
use qcdb::DbInterface;

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct StressArgs {
    db_path: String,
    seconds: u64,
    processes: usize,
    batch: usize,
    name: String,
    fork_mode: bool,
    exit_early: bool,
}

fn print_usage(exe_name: &str) {
    println!("Usage: {} -d <table.qcdb> [options]", exe_name);
    println!();
    println!("Options:");
    println!("  -d <file>   CHARACTER table file to drive (required)");
    println!("  -s <secs>   seconds to run each worker (default: 1)");
    println!("  -p <count>  number of writer and of reader workers (default: 4)");
    println!("  -r <count>  records per batch (default: 20)");
    println!("  -n <name>   name written into each record (default: KEVIN)");
    println!("  --fork      fork worker processes instead of threads");
    println!("  -v / -q     adjust verbosity");
    println!("  -h, --help  print this help and exit");
}

fn parse_args_from(exe_name: &str, argv: &[String]) -> Result<StressArgs> {
    let mut db_path: Option<String> = None;
    let mut seconds = 1u64;
    let mut processes = 4usize;
    let mut batch = 20usize;
    let mut name = "KEVIN".to_string();
    let mut fork_mode = false;
    let mut exit_early = false;

    let take_value = |iter: &mut std::slice::Iter<'_, String>, option: &str| {
        iter.next()
            .cloned()
            .ok_or_else(|| anyhow!("bad usage: option {} requires a value", option))
    };

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-d" => db_path = Some(take_value(&mut iter, "-d")?),
            "-s" => {
                seconds = take_value(&mut iter, "-s")?
                    .parse()
                    .context("bad usage: -s expects a number of seconds")?;
            }
            "-p" => {
                processes = take_value(&mut iter, "-p")?
                    .parse()
                    .context("bad usage: -p expects a worker count")?;
            }
            "-r" => {
                batch = take_value(&mut iter, "-r")?
                    .parse()
                    .context("bad usage: -r expects a record count")?;
            }
            "-n" => name = take_value(&mut iter, "-n")?,
            "--fork" => fork_mode = true,
            "-v" => set_display_level(display_level() + 1),
            "-q" => set_display_level(display_level() - 1),
            "-h" | "--help" => {
                print_usage(exe_name);
                exit_early = true;
            }
            "-V" | "--version" => {
                println!("{} v{}", STRESS_NAME, VERSION_STRING);
                exit_early = true;
            }
            unknown => return Err(anyhow!("bad usage: unknown option '{}'", unknown)),
        }
    }

    if exit_early {
        return Ok(StressArgs {
            db_path: String::new(),
            seconds,
            processes,
            batch,
            name,
            fork_mode,
            exit_early,
        });
    }

    let db_path = db_path.ok_or_else(|| anyhow!("bad usage: missing required option -d"))?;
    if processes == 0 || batch == 0 {
        return Err(anyhow!("bad usage: -p and -r must be at least 1"));
    }

    Ok(StressArgs {
        db_path,
        seconds,
        processes,
        batch,
        name,
        fork_mode,
        exit_early,
    })
}

// ── Worker loops ─────────────────────────────────────────────────────────────

/// xorshift64 step; good enough to spread batch indices over the table.
fn xorshift(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

fn seed_for(worker: usize) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15);
    (nanos ^ ((worker as u64 + 1) << 32)) | 1
}

fn make_character(args: &StressArgs, record: usize, age: i32) -> CHARACTER {
    let mut character = CHARACTER::new_zeroed();
    character.AGE = age;
    character.RECORD = record as u32;
    let raw = args.name.as_bytes();
    let len = raw.len().min(character.NAME.len());
    character.NAME[..len].copy_from_slice(&raw[..len]);
    character
}

/// Batched random-index writes until the deadline; returns records written.
fn writer_loop(db: &DbInterface<CHARACTER>, args: &StressArgs, worker: usize) -> u64 {
    let mut rng = seed_for(worker);
    let capacity = db.capacity();
    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut pairs: Vec<(usize, CHARACTER)> = Vec::with_capacity(args.batch);
    let mut age: i32 = worker as i32;
    let mut total = 0u64;

    while Instant::now() < deadline {
        pairs.clear();
        for _ in 0..args.batch {
            let record = (xorshift(&mut rng) as usize) % capacity;
            pairs.push((record, make_character(args, record, age)));
        }
        age = age.wrapping_add(1);
        if let Err(e) = db.write_at_many(&mut pairs) {
            displaylevel!(1, "writer {}: {}\n", worker, e);
            break;
        }
        total += args.batch as u64;
    }

    displaylevel!(3, "writer {}: wrote {} records\n", worker, total);
    total
}

/// Batched random-index reads until the deadline; returns records read.
fn reader_loop(db: &DbInterface<CHARACTER>, args: &StressArgs, worker: usize) -> u64 {
    let mut rng = seed_for(worker ^ 0x5555);
    let capacity = db.capacity();
    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut pairs: Vec<(usize, CHARACTER)> = Vec::with_capacity(args.batch);
    let mut total = 0u64;

    while Instant::now() < deadline {
        pairs.clear();
        for _ in 0..args.batch {
            let record = (xorshift(&mut rng) as usize) % capacity;
            pairs.push((record, CHARACTER::new_zeroed()));
        }
        if let Err(e) = db.read_many(&mut pairs) {
            displaylevel!(1, "reader {}: {}\n", worker, e);
            break;
        }
        total += args.batch as u64;
    }

    displaylevel!(3, "reader {}: read {} records\n", worker, total);
    total
}

// ── Drive modes ──────────────────────────────────────────────────────────────

fn run_threaded(args: &StressArgs) -> Result<()> {
    let (tx, rx) = unbounded::<(&'static str, u64)>();

    std::thread::scope(|scope| {
        for worker in 0..args.processes {
            let tx_w = tx.clone();
            let tx_r = tx.clone();
            scope.spawn(move || {
                let total = match DbInterface::<CHARACTER>::open(&args.db_path) {
                    Ok(db) => writer_loop(&db, args, worker),
                    Err(e) => {
                        displaylevel!(1, "writer {}: cannot open {}: {}\n", worker, args.db_path, e);
                        0
                    }
                };
                tx_w.send(("write", total)).ok();
            });
            scope.spawn(move || {
                let total = match DbInterface::<CHARACTER>::open(&args.db_path) {
                    Ok(db) => reader_loop(&db, args, worker),
                    Err(e) => {
                        displaylevel!(1, "reader {}: cannot open {}: {}\n", worker, args.db_path, e);
                        0
                    }
                };
                tx_r.send(("read", total)).ok();
            });
        }
    });
    drop(tx);

    let mut written = 0u64;
    let mut read = 0u64;
    for (kind, total) in rx {
        match kind {
            "write" => written += total,
            _ => read += total,
        }
    }
    displaylevel!(
        2,
        "{} writers wrote {} records, {} readers read {} records in {}s\n",
        args.processes,
        written,
        args.processes,
        read,
        args.seconds
    );
    Ok(())
}

fn run_forked(args: &StressArgs) -> Result<()> {
    let mut children = Vec::with_capacity(args.processes * 2);

    for worker in 0..args.processes {
        for is_writer in [true, false] {
            match unsafe { fork() } {
                Ok(ForkResult::Parent { child }) => children.push(child),
                Ok(ForkResult::Child) => {
                    let code = match DbInterface::<CHARACTER>::open(&args.db_path) {
                        Ok(db) => {
                            if is_writer {
                                writer_loop(&db, args, worker);
                            } else {
                                reader_loop(&db, args, worker);
                            }
                            0
                        }
                        Err(e) => {
                            displaylevel!(1, "worker {}: cannot open {}: {}\n", worker, args.db_path, e);
                            e.exit_code()
                        }
                    };
                    std::process::exit(code);
                }
                Err(e) => return Err(anyhow!("fork failed: {}", e)),
            }
        }
    }

    let mut failures = 0;
    for child in children {
        match waitpid(child, None) {
            Ok(status) => displaylevel!(4, "child {:?}: {:?}\n", child, status),
            Err(_) => failures += 1,
        }
    }
    if failures > 0 {
        return Err(anyhow!("{} child processes could not be reaped", failures));
    }
    displaylevel!(
        2,
        "{} writer and {} reader processes finished after {}s\n",
        args.processes,
        args.processes,
        args.seconds
    );
    Ok(())
}

fn main() {
    let exe_name = std::env::args().next().unwrap_or_default();
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args_from(&exe_name, &argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {}", STRESS_NAME, e);
            print_usage(STRESS_NAME);
            std::process::exit(qcdb::DbError::BadArg.exit_code());
        }
    };
    if args.exit_early {
        return;
    }

    // Open once up front so a missing or mismatched table fails fast
    // instead of inside every worker.
    match DbInterface::<CHARACTER>::open(&args.db_path) {
        Ok(db) => {
            if db.capacity() == 0 {
                eprintln!("{}: {} has no record slots", STRESS_NAME, args.db_path);
                std::process::exit(qcdb::DbError::BadArg.exit_code());
            }
        }
        Err(e) => {
            eprintln!("{}: cannot open {}: {}", STRESS_NAME, args.db_path, e);
            std::process::exit(e.exit_code());
        }
    }

    let outcome = if args.fork_mode {
        run_forked(&args)
    } else {
        run_threaded(&args)
    };
    if let Err(e) = outcome {
        eprintln!("{}: {}", STRESS_NAME, e);
        std::process::exit(qcdb::DbError::Fail.exit_code());
    }
}
