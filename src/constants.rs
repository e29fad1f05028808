//! # Runner Constants
//!
//! Defaults and fixed keys that define the operational boundaries of a flow run.

/// Items per batch when no batch size is configured
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Concurrent batch workers when no thread count is configured
pub const DEFAULT_THREAD_COUNT: usize = 4;

/// Flow step executed when no step is configured
pub const DEFAULT_STEP: u32 = 1;

/// Upper bound on error messages retained on a job
pub const MAX_ERROR_MESSAGES: usize = 10;

/// Progress notifications are only emitted on multiples of this percentage
pub const PROGRESS_NOTIFICATION_STEP: u32 = 5;

/// Connection identity used when the runner is not given one explicitly
pub const DEFAULT_CONNECTION: &str = "staging";

/// Keys injected into the run options sent with every batch
pub mod option_keys {
    /// Name of the flow being run
    pub const FLOW: &str = "flow";
    /// Identifiers of the items in the current batch
    pub const ITEMS: &str = "uri";
}

/// Messages attached to status-changed notifications
pub mod status_messages {
    pub const STARTING: &str = "starting flow";
    pub const PROGRESS: &str = "";
    pub const COMPLETE: &str = "";
}

/// Environment variable names consulted by configuration and logging.
/// Every `RunnerConfig` field can be overridden as `FLOW_RUNNER_<FIELD>`.
pub mod env {
    pub const PREFIX: &str = "FLOW_RUNNER";
    pub const ENVIRONMENT: &str = "FLOW_RUNNER_ENV";
    pub const LOG_FORMAT: &str = "FLOW_RUNNER_LOG_FORMAT";
}
