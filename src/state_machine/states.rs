use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a flow job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Item identifiers are being collected
    RunningCollector,
    /// Batches are being dispatched
    Running,
    /// Every item succeeded
    Finished,
    /// Every item was processed, some failed
    FinishedWithErrors,
    /// Nothing succeeded, or collection failed
    Failed,
    /// Fewer items were processed than were collected
    Canceled,
    /// Stopped early because an item failed with stop-on-failure set
    StopOnError,
}

impl JobStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::RunningCollector | Self::Running)
    }

    /// Check if this is an active state (job is being processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if the job ended with at least one failure or without completing
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::FinishedWithErrors | Self::Failed | Self::Canceled | Self::StopOnError
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            Self::RunningCollector => matches!(next, Self::Running | Self::Failed),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunningCollector => write!(f, "RUNNING_COLLECTOR"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::FinishedWithErrors => write!(f, "FINISHED_WITH_ERRORS"),
            Self::Failed => write!(f, "FAILED"),
            Self::Canceled => write!(f, "CANCELED"),
            Self::StopOnError => write!(f, "STOP_ON_ERROR"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING_COLLECTOR" => Ok(Self::RunningCollector),
            "RUNNING" => Ok(Self::Running),
            "FINISHED" => Ok(Self::Finished),
            "FINISHED_WITH_ERRORS" => Ok(Self::FinishedWithErrors),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            "STOP_ON_ERROR" => Ok(Self::StopOnError),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}
