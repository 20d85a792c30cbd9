use crate::types::OutputBlob;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Exited { code: i32 },
    Killed { signal: i32 },
    /// The child could not be waited on, its outcome is unknown.
    Lost,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    /// Exit code as a shell would report it. `None` while still running.
    pub fn exit_code(&self) -> Option<i32> {
        match *self {
            JobStatus::Running => None,
            JobStatus::Exited { code } => Some(code),
            JobStatus::Killed { signal } => Some(128 + signal),
            JobStatus::Lost => Some(-1),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Exited { code } => write!(f, "exited with code {}", code),
            JobStatus::Killed { signal } => write!(f, "killed by signal {}", signal),
            JobStatus::Lost => write!(f, "lost"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Output {
    Stdout(OutputBlob),
    Stderr(OutputBlob),
}
