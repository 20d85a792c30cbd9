//! Per-job outcome summary printed after a run.

use crate::exit_codes;
use joblib::{error, JobResult, JobSpec};
use std::fmt;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed { exit_code: i32 },
    /// The job never ran to completion.
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    pub name: String,
    pub outcome: Outcome,
    pub duration: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub jobs: Vec<JobReport>,
}

impl Summary {
    /// Pair each job with its result; `results` must be in the order of `jobs`.
    pub fn new(jobs: &[JobSpec], results: Vec<error::Result<JobResult>>) -> Self {
        let jobs = jobs
            .iter()
            .zip(results)
            .map(|(job, result)| match result {
                Ok(result) => JobReport {
                    name: result.job_name.clone(),
                    outcome: if result.passed() {
                        Outcome::Passed
                    } else {
                        Outcome::Failed {
                            exit_code: result.exit_code,
                        }
                    },
                    duration: Some(result.duration),
                },
                Err(err) => JobReport {
                    name: job.name.clone(),
                    outcome: Outcome::Error(err.to_string()),
                    duration: None,
                },
            })
            .collect();
        Self { jobs }
    }

    pub fn all_passed(&self) -> bool {
        self.jobs.iter().all(|job| job.outcome == Outcome::Passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            exit_codes::OK
        } else {
            exit_codes::FAILED
        }
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Passed => write!(f, "PASS  {}", self.name)?,
            Outcome::Failed { exit_code } => {
                write!(f, "FAIL  {} (exit {})", self.name, exit_code)?
            }
            Outcome::Error(reason) => write!(f, "ERROR {}: {}", self.name, reason)?,
        }
        if let Some(duration) = self.duration {
            write!(f, " in {:.1}s", duration.as_secs_f64())?;
        }
        Ok(())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for job in &self.jobs {
            writeln!(f, "{}", job)?;
        }
        let passed = self
            .jobs
            .iter()
            .filter(|job| job.outcome == Outcome::Passed)
            .count();
        write!(f, "{}/{} jobs passed", passed, self.jobs.len())
    }
}
