//! E2E: record engine operations on a freshly generated table.
//!
//! Creates real `.qcdb` files via the schema compiler, opens them with
//! [`DbInterface`], and exercises every public operation including the
//! documented edge cases: append scan starts, high-water walk-back on
//! delete, capacity exhaustion, and shard boundaries in parallel scans.

use qcdb::schema::generate_table;
use qcdb::{DbError, DbInterface};
use tempfile::TempDir;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

/// Mirrors `0 PERSON <n>` / `0 AGE i 1` / `1 NAME c 16`: 20 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct Person {
    age: i32,
    name: [u8; 16],
}

impl Person {
    fn aged(age: i32) -> Person {
        let mut person = Person::new_zeroed();
        person.age = age;
        person
    }

    fn named(age: i32, name: &str) -> Person {
        let mut person = Person::aged(age);
        let raw = name.as_bytes();
        person.name[..raw.len()].copy_from_slice(raw);
        person
    }
}

/// Generates a PERSON table with the given capacity and opens it.
fn person_table(capacity: usize) -> (TempDir, DbInterface<Person>) {
    let dir = TempDir::new().unwrap();
    let text = format!("0 PERSON {}\n0 AGE i 1\n1 NAME c 16\n", capacity);
    let object = qcdb::parse_schema_str(&text, true).unwrap();
    let path = generate_table(&object, dir.path()).unwrap();
    let db = DbInterface::open(&path).unwrap();
    (dir, db)
}

// ── Open / metadata ──────────────────────────────────────────────────────────

#[test]
fn open_caches_capacity_and_name() {
    let (_dir, db) = person_table(4);
    assert_eq!(db.capacity(), 4);
    assert_eq!(db.object_name(), "PERSON");
    assert_eq!(db.last_written().unwrap(), 0);
    assert_eq!(db.high_water().unwrap(), 0);
}

#[test]
fn open_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let result: Result<DbInterface<Person>, DbError> =
        DbInterface::open(dir.path().join("absent.qcdb"));
    assert_eq!(result.unwrap_err(), DbError::NotFound);
}

#[test]
fn open_with_wrong_record_type_is_null_object() {
    #[repr(C)]
    #[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
    struct Wrong {
        wide: [u64; 4],
    }

    let dir = TempDir::new().unwrap();
    let object = qcdb::parse_schema_str("0 PERSON 4\n0 AGE i 1\n1 NAME c 16\n", true).unwrap();
    let path = generate_table(&object, dir.path()).unwrap();

    let result: Result<DbInterface<Wrong>, DbError> = DbInterface::open(&path);
    assert_eq!(result.unwrap_err(), DbError::NullObject);
}

#[test]
fn open_truncated_file_is_null_object() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stub.qcdb");
    std::fs::write(&path, b"short").unwrap();
    let result: Result<DbInterface<Person>, DbError> = DbInterface::open(&path);
    assert_eq!(result.unwrap_err(), DbError::NullObject);
}

// ── Single-record operations ─────────────────────────────────────────────────

#[test]
fn write_then_read_round_trips() {
    let (_dir, db) = person_table(4);
    let person = Person::named(41, "ADA");
    db.write_at(2, &person).unwrap();
    assert_eq!(db.read(2).unwrap(), person);
    assert_eq!(db.last_written().unwrap(), 2);
    assert_eq!(db.high_water().unwrap(), 3);
}

#[test]
fn read_out_of_range_is_not_found() {
    let (_dir, db) = person_table(4);
    assert_eq!(db.read(4).unwrap_err(), DbError::NotFound);
    assert_eq!(db.write_at(4, &Person::aged(1)).unwrap_err(), DbError::NotFound);
    assert_eq!(db.delete(4).unwrap_err(), DbError::NotFound);
}

#[test]
fn first_append_lands_at_zero() {
    let (_dir, db) = person_table(4);
    let slot = db.append(&Person::aged(5)).unwrap();
    assert_eq!(slot, 0);
    assert_eq!(db.read(0).unwrap().age, 5);
    assert_eq!(db.last_written().unwrap(), 0);
    assert_eq!(db.high_water().unwrap(), 1);
}

#[test]
fn delete_walks_high_water_back() {
    let (_dir, db) = person_table(4);
    assert_eq!(db.append(&Person::aged(5)).unwrap(), 0);
    assert_eq!(db.append(&Person::aged(6)).unwrap(), 1);
    assert_eq!(db.high_water().unwrap(), 2);

    db.delete(1).unwrap();
    assert_eq!(db.read(1).unwrap(), Person::new_zeroed());
    assert_eq!(db.high_water().unwrap(), 1);

    let matches = db.find_all(|p: &Person| p.age > 0).unwrap();
    assert_eq!(matches, vec![Person::aged(5)]);
}

#[test]
fn delete_below_top_keeps_high_water() {
    let (_dir, db) = person_table(4);
    for age in 1..=3 {
        db.append(&Person::aged(age)).unwrap();
    }
    db.delete(0).unwrap();
    assert_eq!(db.high_water().unwrap(), 3);
}

#[test]
fn delete_last_populated_record_empties_table() {
    let (_dir, db) = person_table(4);
    db.append(&Person::aged(9)).unwrap();
    db.delete(0).unwrap();
    assert_eq!(db.high_water().unwrap(), 0);
}

#[test]
fn capacity_exhaustion_leaves_table_unchanged() {
    let (_dir, db) = person_table(2);
    let a = Person::named(1, "A");
    let b = Person::named(2, "B");
    assert_eq!(db.append(&a).unwrap(), 0);
    assert_eq!(db.append(&b).unwrap(), 1);

    let err = db.append(&Person::named(3, "C")).unwrap_err();
    assert_eq!(err, DbError::EndOfData { written: 0 });
    assert_eq!(db.read(0).unwrap(), a);
    assert_eq!(db.read(1).unwrap(), b);
    assert_eq!(db.last_written().unwrap(), 1);
}

#[test]
fn append_scans_forward_from_last_written() {
    let (_dir, db) = person_table(4);
    // Populate 0..3, then free slot 1 and write at 2 so the scan start
    // (last_written == 2) sits above the hole.
    for age in 1..=3 {
        db.append(&Person::aged(age)).unwrap();
    }
    db.delete(1).unwrap();
    db.write_at(2, &Person::aged(30)).unwrap();

    // The freed slot 1 is behind the scan start and must not be reused.
    assert_eq!(db.append(&Person::aged(40)).unwrap(), 3);
    assert_eq!(db.read(1).unwrap(), Person::new_zeroed());
}

#[test]
fn clear_resets_records_and_marks() {
    let (_dir, db) = person_table(4);
    for age in 1..=4 {
        db.append(&Person::aged(age)).unwrap();
    }
    db.clear().unwrap();
    for record in 0..4 {
        assert_eq!(db.read(record).unwrap(), Person::new_zeroed());
    }
    assert_eq!(db.last_written().unwrap(), 0);
    assert_eq!(db.high_water().unwrap(), 0);

    // The table is reusable from slot 0.
    assert_eq!(db.append(&Person::aged(7)).unwrap(), 0);
}

// ── Bulk operations ──────────────────────────────────────────────────────────

#[test]
fn write_at_many_sorts_and_updates_marks() {
    let (_dir, db) = person_table(8);
    let mut pairs = vec![
        (5, Person::aged(50)),
        (1, Person::aged(10)),
        (3, Person::aged(30)),
    ];
    db.write_at_many(&mut pairs).unwrap();

    assert_eq!(db.read(1).unwrap().age, 10);
    assert_eq!(db.read(3).unwrap().age, 30);
    assert_eq!(db.read(5).unwrap().age, 50);
    assert_eq!(db.last_written().unwrap(), 5);
    assert_eq!(db.high_water().unwrap(), 6);
}

#[test]
fn write_at_many_out_of_range_touches_nothing() {
    let (_dir, db) = person_table(4);
    let mut pairs = vec![(0, Person::aged(1)), (4, Person::aged(2))];
    assert_eq!(db.write_at_many(&mut pairs).unwrap_err(), DbError::NotFound);
    assert_eq!(db.read(0).unwrap(), Person::new_zeroed());
    assert_eq!(db.high_water().unwrap(), 0);
}

#[test]
fn read_many_fills_sorted_pairs() {
    let (_dir, db) = person_table(8);
    for age in 1..=8 {
        db.append(&Person::aged(age)).unwrap();
    }

    let mut pairs = vec![
        (6, Person::new_zeroed()),
        (0, Person::new_zeroed()),
        (3, Person::new_zeroed()),
    ];
    db.read_many(&mut pairs).unwrap();

    // The call sorts by index ascending.
    assert_eq!(pairs[0], (0, Person::aged(1)));
    assert_eq!(pairs[1], (3, Person::aged(4)));
    assert_eq!(pairs[2], (6, Person::aged(7)));
}

#[test]
fn read_many_out_of_range_leaves_buffers_untouched() {
    let (_dir, db) = person_table(4);
    db.append(&Person::aged(1)).unwrap();

    let sentinel = Person::named(-1, "SENTINEL");
    let mut pairs = vec![(0, sentinel), (9, sentinel)];
    assert_eq!(db.read_many(&mut pairs).unwrap_err(), DbError::NotFound);
    assert!(pairs.iter().all(|(_, p)| *p == sentinel));
}

#[test]
fn append_many_fills_holes_and_reports_count() {
    let (_dir, db) = person_table(6);
    let people: Vec<Person> = (1..=4).map(Person::aged).collect();
    assert_eq!(db.append_many(&people).unwrap(), 4);
    assert_eq!(db.last_written().unwrap(), 3);
    assert_eq!(db.high_water().unwrap(), 4);

    // Free a slot above last_written's scan start and append through it.
    db.delete(3).unwrap();
    db.write_at(4, &Person::aged(50)).unwrap();
    // last_written == 4; slot 5 is the only free slot in range.
    assert_eq!(db.append_many(&[Person::aged(60)]).unwrap(), 1);
    assert_eq!(db.read(5).unwrap().age, 60);
}

#[test]
fn append_many_capacity_exhaustion_carries_written_count() {
    let (_dir, db) = person_table(3);
    let people: Vec<Person> = (1..=5).map(Person::aged).collect();
    let err = db.append_many(&people).unwrap_err();
    assert_eq!(err, DbError::EndOfData { written: 3 });
    for record in 0..3 {
        assert_eq!(db.read(record).unwrap().age, record as i32 + 1);
    }
}

// ── Searches ─────────────────────────────────────────────────────────────────

#[test]
fn find_first_returns_lowest_match() {
    let (_dir, db) = person_table(8);
    for age in [3, 7, 7, 1] {
        db.append(&Person::aged(age)).unwrap();
    }
    assert_eq!(db.find_first(|p: &Person| p.age == 7).unwrap(), 1);
    assert_eq!(
        db.find_first(|p: &Person| p.age == 99).unwrap_err(),
        DbError::NotFound
    );
}

#[test]
fn find_first_ignores_records_above_high_water() {
    let (_dir, db) = person_table(8);
    db.write_at(2, &Person::aged(5)).unwrap();
    // Slots 3.. are beyond the mark even though the file has capacity.
    assert_eq!(db.high_water().unwrap(), 3);
    assert_eq!(
        db.find_first(|p: &Person| p.age == 5).unwrap(),
        2
    );
}

#[test]
fn find_all_returns_matches_in_index_order() {
    let (_dir, db) = person_table(64);
    for record in 0..64 {
        db.append(&Person::aged((record % 4) as i32)).unwrap();
    }
    let matches = db.find_all(|p: &Person| p.age == 2).unwrap();
    assert_eq!(matches.len(), 16);
    assert!(matches.iter().all(|p| p.age == 2));
}

#[test]
fn find_all_covers_shard_boundaries_and_final_slot() {
    // Capacities chosen so the shard split leaves a remainder; every
    // populated record carries a unique age, and the scan must return all
    // of them exactly once, first and last included.
    for capacity in [1usize, 2, 3, 5, 17, 33, 100] {
        let (_dir, db) = person_table(capacity);
        for record in 0..capacity {
            db.write_at(record, &Person::aged(record as i32 + 1)).unwrap();
        }
        let matches = db.find_all(|_: &Person| true).unwrap();
        let ages: Vec<i32> = matches.iter().map(|p| p.age).collect();
        let expected: Vec<i32> = (1..=capacity as i32).collect();
        assert_eq!(ages, expected, "capacity = {}", capacity);
    }
}

#[test]
fn find_all_on_empty_table_is_empty() {
    let (_dir, db) = person_table(8);
    assert!(db.find_all(|_: &Person| true).unwrap().is_empty());
}

#[test]
fn find_all_predicate_panic_is_scan_error() {
    let (_dir, db) = person_table(8);
    for age in 1..=8 {
        db.append(&Person::aged(age)).unwrap();
    }
    let result = db.find_all(|p: &Person| {
        if p.age == 5 {
            panic!("predicate blew up");
        }
        true
    });
    assert_eq!(result.unwrap_err(), DbError::Fail);

    // The lock was released; the table is still fully usable.
    assert_eq!(db.read(0).unwrap().age, 1);
    db.write_at(0, &Person::aged(11)).unwrap();
}

// ── Full round-trip ──────────────────────────────────────────────────────────

#[test]
fn fresh_table_round_trips_a_full_sequence() {
    let capacity = 32;
    let (_dir, db) = person_table(capacity);
    let people: Vec<Person> = (0..capacity)
        .map(|i| Person::named(i as i32 + 1, "SEQ"))
        .collect();
    for person in &people {
        db.append(person).unwrap();
    }
    for (record, person) in people.iter().enumerate() {
        assert_eq!(db.read(record).unwrap(), *person);
    }
}
