use serde::{Deserialize, Serialize};

/// Lifecycle state of a project's recon job.
///
/// `Idle` is the rest state before any run and after a natural completion;
/// `Stopped` is the rest state after an explicit stop. Both accept a new
/// `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl JobState {
    /// Whether a new job may be started from this state.
    pub fn is_rest(&self) -> bool {
        matches!(self, JobState::Idle | JobState::Stopped)
    }

    /// The wire protocol only knows `running`, `paused`, and `stopped`;
    /// `Idle` is reported as `stopped`.
    pub fn wire_status(&self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Idle | JobState::Stopped => "stopped",
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Idle
    }
}

/// Execution state of a single tool within a job.
///
/// Transitions are monotonic: once a terminal state (`Done`, `Failed`,
/// `Cancelled`) is reached, the execution never returns to `Pending` or
/// `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl ToolState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolState::Done | ToolState::Failed | ToolState::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_maps_to_stopped_on_the_wire() {
        assert_eq!(JobState::Idle.wire_status(), "stopped");
        assert_eq!(JobState::Stopped.wire_status(), "stopped");
        assert_eq!(JobState::Running.wire_status(), "running");
        assert_eq!(JobState::Paused.wire_status(), "paused");
    }

    #[test]
    fn rest_states_accept_start() {
        assert!(JobState::Idle.is_rest());
        assert!(JobState::Stopped.is_rest());
        assert!(!JobState::Running.is_rest());
        assert!(!JobState::Paused.is_rest());
    }
}
