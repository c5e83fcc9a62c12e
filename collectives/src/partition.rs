use std::ops::Range;

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

/// Splits `n` data points into `workers` contiguous shards whose sizes
/// differ by at most one. Deterministic given `n` and `workers`.
///
/// The partition is fixed for the duration of a run; re-partitioning
/// mid-run is unsupported.
pub fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    debug_assert!(workers > 0);

    let base = n / workers;
    let extra = n % workers;

    let mut shards = Vec::with_capacity(workers);
    let mut start = 0;
    for rank in 0..workers {
        let len = base + usize::from(rank < extra);
        shards.push(start..start + len);
        start += len;
    }

    shards
}

/// Like [`partition`], but shuffles the point indices reproducibly from
/// `seed` before splitting. Shards stay pairwise disjoint with sizes
/// differing by at most one; their union is `0..n`.
pub fn partition_shuffled(n: usize, workers: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    partition(n, workers)
        .into_iter()
        .map(|range| indices[range].to_vec())
        .collect()
}
