//! Turning a `JobSpec` into the concrete process that runs it.

use crate::error::{Error, Result};
use crate::types::{Args, Dir, Envs, JobSpec, Program, StopCommand};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Where the job's sources are mounted inside the container.
pub const CONTAINER_WORKDIR: &str = "/workspace";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerEngine {
    Docker,
    Podman,
}

impl ContainerEngine {
    pub fn program(&self) -> &'static str {
        match self {
            ContainerEngine::Docker => "docker",
            ContainerEngine::Podman => "podman",
        }
    }
}

/// When the engine should fetch the job's image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullPolicy {
    Missing,
    Always,
    Never,
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PullPolicy::Missing => "missing",
            PullPolicy::Always => "always",
            PullPolicy::Never => "never",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Isolation {
    /// Run every job in a fresh, auto-removed container.
    Container(ContainerEngine),
    /// Run the entrypoint directly on the host, ignoring the image.
    Host,
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub isolation: Isolation,
    /// Host directory holding the sources the jobs check.
    pub workdir: PathBuf,
    pub pull: PullPolicy,
    pub envs: Envs,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            isolation: Isolation::Container(ContainerEngine::Docker),
            workdir: PathBuf::from("."),
            pull: PullPolicy::Missing,
            envs: Envs::new(),
        }
    }
}

/// The process that executes one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Launch {
    pub program: Program,
    pub args: Args,
    pub dir: Dir,
    pub envs: Envs,
    /// Run when the job is stopped, to tear down what killing `program` leaves behind.
    pub stop: Option<StopCommand>,
}

impl RunOptions {
    pub fn launch(&self, job: &JobSpec) -> Result<Launch> {
        let invalid = |reason: String| Error::InvalidJob {
            job_name: job.name.clone(),
            reason,
        };
        let workdir = self.workdir.to_str().ok_or_else(|| {
            invalid(format!(
                "workdir {} is not valid UTF-8",
                self.workdir.display()
            ))
        })?;
        // the bind mount needs an absolute source path
        let source = self
            .workdir
            .canonicalize()
            .map_err(|err| invalid(format!("workdir {}: {}", self.workdir.display(), err)))?;
        if !source.is_dir() {
            return Err(invalid(format!(
                "workdir {} is not a directory",
                self.workdir.display()
            )));
        }

        match self.isolation {
            Isolation::Host => Ok(Launch {
                program: job.entrypoint.clone(),
                args: job.args.clone(),
                dir: workdir.to_string(),
                envs: self.envs.clone(),
                stop: None,
            }),
            Isolation::Container(engine) => {
                // killing the engine client leaves the container running, so name it for removal
                let name = format!("ci-runner-{}", Uuid::new_v4());
                let mut args = vec![
                    "run".to_string(),
                    "--rm".to_string(),
                    format!("--pull={}", self.pull),
                    "--name".to_string(),
                    name.clone(),
                    "--entrypoint".to_string(),
                    job.entrypoint.clone(),
                    "-v".to_string(),
                    format!("{}:{}", source.display(), CONTAINER_WORKDIR),
                    "-w".to_string(),
                    CONTAINER_WORKDIR.to_string(),
                ];
                for (var, val) in &self.envs {
                    args.push("-e".to_string());
                    args.push(format!("{}={}", var, val));
                }
                args.push(job.image.clone());
                args.extend(job.args.iter().cloned());
                Ok(Launch {
                    program: engine.program().to_string(),
                    args,
                    dir: workdir.to_string(),
                    envs: Envs::new(),
                    stop: Some((
                        engine.program().to_string(),
                        vec!["rm".to_string(), "-f".to_string(), name],
                    )),
                })
            }
        }
    }
}
