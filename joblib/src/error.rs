use std::{io, path::PathBuf, result};
use thiserror;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No such job exists")]
    DoesNotExist,
    #[error("Job is not running")]
    AlreadyStopped,
    #[error("Job coordinator exited")]
    CoordinatorExited,
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Job '{job_name}' failed with exit code {exit_code}")]
    JobFailed { job_name: String, exit_code: i32 },
    #[error("Invalid job '{job_name}': {reason}")]
    InvalidJob { job_name: String, reason: String },
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),
    #[error("No job named '{0}' in pipeline")]
    UnknownJob(String),
    #[error("Malformed pipeline definition: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to read pipeline {path}: {source}")]
    ReadPipeline {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse pipeline {path}: {source}")]
    ParsePipeline {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = result::Result<T, Error>;
