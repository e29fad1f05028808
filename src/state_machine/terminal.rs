//! Terminal status resolution for a drained job.

use super::states::JobStatus;

/// Counts the completion monitor reads once the dispatcher has drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionCounts {
    pub stop_on_failure: bool,
    pub successful_events: u64,
    pub failed_events: u64,
    /// Items discovered by the collector
    pub total_items: u64,
}

/// Derive the terminal status of a job from its final counts.
///
/// Precedence, first match wins:
/// 1. stop-on-failure set and any item failed: `STOP_ON_ERROR`
/// 2. processed count differs from collected count: `CANCELED`
/// 3. both failures and successes: `FINISHED_WITH_ERRORS`
/// 4. successes only: `FINISHED`
/// 5. otherwise: `FAILED`
pub fn resolve_terminal_status(counts: CompletionCounts) -> JobStatus {
    let CompletionCounts {
        stop_on_failure,
        successful_events,
        failed_events,
        total_items,
    } = counts;

    if stop_on_failure && failed_events > 0 {
        JobStatus::StopOnError
    } else if successful_events + failed_events != total_items {
        JobStatus::Canceled
    } else if failed_events > 0 && successful_events > 0 {
        JobStatus::FinishedWithErrors
    } else if failed_events == 0 && successful_events > 0 {
        JobStatus::Finished
    } else {
        JobStatus::Failed
    }
}
