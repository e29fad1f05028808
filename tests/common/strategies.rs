//! Proptest strategies for run shapes and outcome counts.

use proptest::prelude::*;

/// `(items, batch_size)` pairs covering empty, exact and ragged partitions
pub fn partition_strategy() -> impl Strategy<Value = (usize, usize)> {
    (0usize..5_000, 1usize..500)
}

/// `(stop_on_failure, successful, failed, total)` with processed never above total
pub fn completion_strategy() -> impl Strategy<Value = (bool, u64, u64, u64)> {
    (any::<bool>(), 0u64..1_000, 0u64..1_000, 0u64..500).prop_map(
        |(stop, successful, failed, slack)| (stop, successful, failed, successful + failed + slack),
    )
}

/// Successful-batch counts in any completion order for a job of `1..200` batches
pub fn progress_strategy() -> impl Strategy<Value = (u64, Vec<u64>)> {
    (1u64..200).prop_flat_map(|total| {
        (
            Just(total),
            proptest::collection::vec(0..=total, 0..300),
        )
    })
}
