//! Reproducible row caps for map rendering.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::record::AccidentTable;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 42;

/// Point cap applied before drawing the map layer.
pub const DEFAULT_MAP_CAP: usize = 50_000;

/// Cap `table` at `cap` rows using [`DEFAULT_SEED`].
pub fn sample(table: &AccidentTable, cap: usize) -> AccidentTable {
    sample_with_seed(table, cap, DEFAULT_SEED)
}

/// Return `table` itself when it has at most `cap` rows, otherwise exactly `cap` rows
/// drawn uniformly without replacement. The same table, cap and seed always give the
/// same rows in the same order.
pub fn sample_with_seed(table: &AccidentTable, cap: usize, seed: u64) -> AccidentTable {
    if table.len() <= cap {
        return table.clone();
    }
    if cap == 0 {
        return table.derive(std::iter::empty());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let picked = rand::seq::index::sample(&mut rng, table.len(), cap);
    table.take(picked.into_iter())
}
