// Job state machine for flow runs
//
// A job moves RUNNING_COLLECTOR -> RUNNING -> terminal, or straight from
// RUNNING_COLLECTOR to FAILED when item collection fails.

pub mod states;
pub mod terminal;

pub use states::JobStatus;
pub use terminal::{resolve_terminal_status, CompletionCounts};
