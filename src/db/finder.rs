//! Sharded parallel predicate scan over the populated region of a table.
//!
//! The caller holds the table's shared lock for the whole parallel phase;
//! workers only read the mapping.  The populated range `[0, populated)` is
//! split into contiguous shards, one worker per shard, each collecting its
//! matches into a private buffer.  Buffers are concatenated in shard order,
//! so the overall output is in ascending record index order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::db::{read_slot, Record};
use crate::retcode::DbError;
use crate::util::count_cores;

/// Number of scan workers for a populated region of `populated` records:
/// half the online cores, at least one, and never more than one worker per
/// record.
pub fn worker_count(populated: usize) -> usize {
    (count_cores() / 2).max(1).min(populated.max(1))
}

/// Applies `predicate` to every record in `records[0..populated]` and
/// returns the matches, copied by value, in ascending index order.
///
/// `records` is the raw record region (no header), exactly
/// `capacity * size_of::<O>()` bytes.  A panic inside the predicate is
/// trapped in its worker; the scan then discards all partial results and
/// reports a scan failure.
pub(crate) fn scan<O, P>(records: &[u8], populated: usize, predicate: &P) -> Result<Vec<O>, DbError>
where
    O: Record,
    P: Fn(&O) -> bool + Sync,
{
    if populated == 0 {
        return Ok(Vec::new());
    }

    let workers = worker_count(populated);
    let shard_len = populated / workers;
    let mut buckets: Vec<Vec<O>> = (0..workers).map(|_| Vec::new()).collect();
    let panicked = AtomicBool::new(false);

    // One pool per scan, sized to the shard count, joined before return.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|_| DbError::AllocFail)?;

    pool.in_place_scope(|scope| {
        for (worker, bucket) in buckets.iter_mut().enumerate() {
            let lo = worker * shard_len;
            // The last shard absorbs the division remainder.
            let hi = if worker + 1 == workers {
                populated
            } else {
                lo + shard_len
            };
            let panicked = &panicked;
            scope.spawn(move |_| {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    // Evaluate the current slot first, then advance; every
                    // index in [lo, hi) is visited exactly once, including
                    // shard boundaries and the final slot.
                    for index in lo..hi {
                        let record: O = read_slot(records, index);
                        if predicate(&record) {
                            bucket.push(record);
                        }
                    }
                }));
                if outcome.is_err() {
                    panicked.store(true, Ordering::Relaxed);
                }
            });
        }
    });

    if panicked.load(Ordering::Relaxed) {
        return Err(DbError::Fail);
    }
    Ok(buckets.into_iter().flatten().collect())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn region(values: &[u64]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        bytes
    }

    #[test]
    fn empty_region_returns_nothing() {
        let matches: Vec<u64> = scan(&[], 0, &|_: &u64| true).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn visits_every_slot_exactly_once() {
        // Sizes chosen to exercise remainder shards, single-record regions,
        // and regions larger than the worker count.
        for populated in [1usize, 2, 3, 7, 16, 61, 128] {
            let values: Vec<u64> = (1..=populated as u64).collect();
            let bytes = region(&values);
            let matches: Vec<u64> = scan(&bytes, populated, &|_: &u64| true).unwrap();
            assert_eq!(matches, values, "populated = {}", populated);
        }
    }

    #[test]
    fn output_is_in_ascending_index_order() {
        let values: Vec<u64> = (0..100).map(|i| i % 10).collect();
        let bytes = region(&values);
        let matches: Vec<u64> = scan(&bytes, values.len(), &|v: &u64| *v == 3).unwrap();
        assert_eq!(matches, vec![3; 10]);
    }

    #[test]
    fn scan_stops_at_populated_boundary() {
        // Region holds 8 records but only the first 5 are populated.
        let values: Vec<u64> = vec![1, 1, 1, 1, 1, 9, 9, 9];
        let bytes = region(&values);
        let matches: Vec<u64> = scan(&bytes, 5, &|_: &u64| true).unwrap();
        assert_eq!(matches, vec![1; 5]);
    }

    #[test]
    fn predicate_panic_discards_partial_results() {
        let values: Vec<u64> = (0..32).collect();
        let bytes = region(&values);
        let result: Result<Vec<u64>, DbError> = scan(&bytes, values.len(), &|v: &u64| {
            if *v == 17 {
                panic!("bad predicate");
            }
            true
        });
        assert_eq!(result.unwrap_err(), DbError::Fail);
    }

    #[test]
    fn worker_count_bounds() {
        assert_eq!(worker_count(0), 1);
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(1_000_000) >= 1);
        assert!(worker_count(3) <= 3);
    }
}
