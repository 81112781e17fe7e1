use serde::Serialize;

/// Run-state of a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
        };
        write!(f, "{s}")
    }
}

/// Read-only snapshot of one job, as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub name: String,
    pub interval_ms: u64,
    pub running: bool,
}
