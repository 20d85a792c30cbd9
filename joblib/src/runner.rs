//! Running declared jobs to completion and collecting their results.

use crate::actors::coordinator::JobCoordinatorHandle;
use crate::error::{Error, Result};
use crate::events::JobStatus;
use crate::launch::RunOptions;
use crate::pipeline::validate_job;
use crate::types::{JobId, JobSpec, OutputBlob};
use bytes::{Bytes, BytesMut};
use futures::future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

/// A chunk of a job's combined output, tagged with the job's name.
#[derive(Clone, Debug)]
pub struct JobOutput {
    pub job_name: String,
    pub blob: OutputBlob,
}

pub type OutputSink = mpsc::UnboundedSender<JobOutput>;

/// The outcome of one finished job.
#[derive(Clone, Debug)]
pub struct JobResult {
    pub job_name: String,
    pub exit_code: i32,
    pub status: JobStatus,
    pub stdout: Bytes,
    pub stderr: Bytes,
    /// stdout and stderr interleaved in the order they were read
    pub output: Bytes,
    pub duration: Duration,
}

impl JobResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// `Err(JobFailed)` unless the job exited with code 0.
    pub fn into_result(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(Error::JobFailed {
                job_name: self.job_name,
                exit_code: self.exit_code,
            })
        }
    }
}

/// Runs jobs through a shared `JobCoordinator`.
#[derive(Clone)]
pub struct JobRunner {
    coordinator: JobCoordinatorHandle,
    options: RunOptions,
}

impl JobRunner {
    /// Must be called from within a tokio runtime.
    pub fn new(options: RunOptions) -> Self {
        Self::with_coordinator(JobCoordinatorHandle::default(), options)
    }

    pub fn with_coordinator(coordinator: JobCoordinatorHandle, options: RunOptions) -> Self {
        Self {
            coordinator,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run `job` to completion. A non-zero exit is a result, not an error.
    pub async fn run(&self, job: &JobSpec) -> Result<JobResult> {
        self.execute(job, None).await
    }

    /// Like `run`, forwarding combined output to `sink` as it arrives.
    pub async fn run_streaming(&self, job: &JobSpec, sink: OutputSink) -> Result<JobResult> {
        self.execute(job, Some(sink)).await
    }

    /// Run every job concurrently. Results come back in the order of `jobs`.
    pub async fn run_all(&self, jobs: &[JobSpec]) -> Vec<Result<JobResult>> {
        future::join_all(jobs.iter().map(|job| self.run(job))).await
    }

    pub async fn run_all_streaming(
        &self,
        jobs: &[JobSpec],
        sink: OutputSink,
    ) -> Vec<Result<JobResult>> {
        future::join_all(jobs.iter().map(|job| self.run_streaming(job, sink.clone()))).await
    }

    async fn execute(&self, job: &JobSpec, sink: Option<OutputSink>) -> Result<JobResult> {
        let span = info_span!("job", name = %job.name, image = %job.image);
        async move {
            validate_job(job)?;
            let launch = self.options.launch(job)?;
            let started = Instant::now();
            let job_id = self.coordinator.start_launch(launch).await?;
            info!(%job_id, "job started");

            let result = self.finish(job, job_id, sink, started).await;
            // the coordinator would otherwise keep the job's actors and output alive
            if let Err(err) = self.coordinator.remove_job(job_id).await {
                debug!(%job_id, %err, "failed to release job");
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Drain the output of a started job and wait for it to exit.
    async fn finish(
        &self,
        job: &JobSpec,
        job_id: JobId,
        sink: Option<OutputSink>,
        started: Instant,
    ) -> Result<JobResult> {
        let stdout = self.coordinator.stream_stdout(job_id).await?;
        let stderr = self.coordinator.stream_stderr(job_id).await?;
        let all = self.coordinator.stream_all(job_id).await?;
        let (stdout, stderr, output) = tokio::join!(
            collect(stdout),
            collect(stderr),
            forward(all, &job.name, sink)
        );
        let status = self.coordinator.wait_job(job_id).await?;
        let duration = started.elapsed();

        // wait_job only resolves on termination
        let exit_code = status.exit_code().unwrap_or(-1);
        if exit_code == 0 {
            info!(?duration, "job passed");
        } else {
            warn!(exit_code, %status, ?duration, "job failed");
        }
        Ok(JobResult {
            job_name: job.name.clone(),
            exit_code,
            status,
            stdout,
            stderr,
            output,
            duration,
        })
    }
}

async fn collect(mut rx: mpsc::UnboundedReceiver<OutputBlob>) -> Bytes {
    let mut buf = BytesMut::new();
    while let Some(blob) = rx.recv().await {
        buf.extend_from_slice(&blob);
    }
    buf.freeze()
}

async fn forward(
    mut rx: mpsc::UnboundedReceiver<OutputBlob>,
    job_name: &str,
    sink: Option<OutputSink>,
) -> Bytes {
    let mut buf = BytesMut::new();
    while let Some(blob) = rx.recv().await {
        buf.extend_from_slice(&blob);
        if let Some(sink) = &sink {
            let _ = sink.send(JobOutput {
                job_name: job_name.to_string(),
                blob,
            });
        }
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::Isolation;
    use crate::pipeline::{Pipeline, FMT_OK_MESSAGE};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn host_runner(workdir: &Path, envs: Vec<(String, String)>) -> JobRunner {
        JobRunner::new(RunOptions {
            isolation: Isolation::Host,
            workdir: workdir.to_path_buf(),
            envs,
            ..RunOptions::default()
        })
    }

    fn sh_job(name: &str, shell: &str, script: &str) -> JobSpec {
        JobSpec::new(name, "unused", shell, ["-ec", script])
    }

    /// Install fake `terraform`/`tflint` executables and return a PATH that finds them first.
    fn stub_tools(bin: &Path) -> String {
        // each tool exits with $<TOOL>_EXIT, defaulting to 0
        let tools = [
            ("terraform", "echo \"terraform $*\"; exit ${TERRAFORM_EXIT:-0}"),
            ("tflint", "echo \"tflint $*\"; exit ${TFLINT_EXIT:-0}"),
        ];
        for (tool, body) in tools {
            let path = bin.join(tool);
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        format!(
            "{}:{}",
            bin.display(),
            std::env::var("PATH").unwrap_or_default()
        )
    }

    fn pipeline_runner(dir: &Path, extra: &[(&str, &str)]) -> JobRunner {
        let mut envs = vec![("PATH".to_string(), stub_tools(dir))];
        envs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        host_runner(dir, envs)
    }

    /// A shell that accepts `set -o pipefail`, preferring the `/bin/sh` the jobs declare.
    fn pipefail_shell() -> Option<&'static str> {
        let shell = ["/bin/sh", "/bin/bash"].into_iter().find(|shell| {
            std::process::Command::new(shell)
                .args(["-c", "set -o pipefail"])
                .stderr(std::process::Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        });
        if shell.is_none() {
            eprintln!("skipped: no shell on this host supports `set -o pipefail`");
        }
        shell
    }

    #[tokio::test]
    async fn exit_zero_passes() {
        let dir = tempfile::tempdir().unwrap();
        let runner = host_runner(dir.path(), vec![]);
        let result = runner
            .run(&sh_job("ok", "/bin/sh", "echo hello; echo oops 1>&2"))
            .await
            .unwrap();
        assert!(result.passed());
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.status, JobStatus::Exited { code: 0 });
        assert_eq!(&result.stdout[..], b"hello\n");
        assert_eq!(&result.stderr[..], b"oops\n");
        assert_eq!(result.output.len(), result.stdout.len() + result.stderr.len());
        assert!(result.into_result().is_ok());
    }

    #[tokio::test]
    async fn non_zero_exit_fails_without_erroring() {
        let dir = tempfile::tempdir().unwrap();
        let runner = host_runner(dir.path(), vec![]);
        let result = runner
            .run(&sh_job("bad", "/bin/sh", "exit 7"))
            .await
            .unwrap();
        assert!(!result.passed());
        assert_eq!(result.exit_code, 7);
        match result.into_result() {
            Err(Error::JobFailed {
                job_name,
                exit_code,
            }) => {
                assert_eq!(job_name, "bad");
                assert_eq!(exit_code, 7);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn pipefail_surfaces_upstream_failure() {
        let shell = match pipefail_shell() {
            Some(shell) => shell,
            None => return,
        };
        let dir = tempfile::tempdir().unwrap();
        let runner = host_runner(dir.path(), vec![]);
        let masked = runner
            .run(&sh_job("masked", shell, "false | cat"))
            .await
            .unwrap();
        assert_eq!(masked.exit_code, 0);
        let guarded = runner
            .run(&sh_job("guarded", shell, "set -o pipefail\nfalse | cat"))
            .await
            .unwrap();
        assert_ne!(guarded.exit_code, 0);
    }

    #[tokio::test]
    async fn rerun_gives_same_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let runner = host_runner(dir.path(), vec![]);
        let job = sh_job("twice", "/bin/sh", "test -f missing-file");
        let first = runner.run(&job).await.unwrap();
        let second = runner.run(&job).await.unwrap();
        assert_ne!(first.exit_code, 0);
        assert_eq!(first.exit_code, second.exit_code);
    }

    #[tokio::test]
    async fn finished_jobs_are_released() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = JobCoordinatorHandle::default();
        let runner = JobRunner::with_coordinator(
            coordinator.clone(),
            RunOptions {
                isolation: Isolation::Host,
                workdir: dir.path().to_path_buf(),
                ..RunOptions::default()
            },
        );
        let job = sh_job("noisy", "/bin/sh", "head -c 100000 /dev/zero");
        for _ in 0..5 {
            let result = runner.run(&job).await.unwrap();
            assert_eq!(result.stdout.len(), 100000);
        }
        runner.run(&sh_job("fails", "/bin/sh", "exit 1")).await.unwrap();
        assert!(coordinator.list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = host_runner(dir.path(), vec![]);
        let job = JobSpec::new("ghost", "unused", "/definitely/not/a/shell", ["-c", "true"]);
        assert!(matches!(runner.run(&job).await, Err(Error::Spawn { .. })));
    }

    #[tokio::test]
    async fn invalid_job_is_rejected_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let runner = host_runner(dir.path(), vec![]);
        let job = JobSpec::new("blank", "", "/bin/sh", ["-c", "true"]);
        assert!(matches!(
            runner.run(&job).await,
            Err(Error::InvalidJob { .. })
        ));
    }

    #[tokio::test]
    async fn run_all_is_independent_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let runner = host_runner(dir.path(), vec![]);
        let jobs = vec![
            sh_job("slow", "/bin/sh", "sleep 0.3; echo slow"),
            sh_job("fails", "/bin/sh", "exit 3"),
            JobSpec::new("ghost", "unused", "/definitely/not/a/shell", ["-c", "true"]),
            sh_job("fast", "/bin/sh", "echo fast"),
        ];
        let results = runner.run_all(&jobs).await;
        assert_eq!(results.len(), 4);
        let slow = results[0].as_ref().unwrap();
        assert_eq!(slow.job_name, "slow");
        assert!(slow.passed());
        assert_eq!(results[1].as_ref().unwrap().exit_code, 3);
        assert!(matches!(results[2], Err(Error::Spawn { .. })));
        let fast = results[3].as_ref().unwrap();
        assert_eq!(&fast.stdout[..], b"fast\n");
    }

    #[tokio::test]
    async fn streaming_tags_output_with_job_name() {
        let dir = tempfile::tempdir().unwrap();
        let runner = host_runner(dir.path(), vec![]);
        let (sink, mut live) = mpsc::unbounded_channel();
        let jobs = vec![
            sh_job("a", "/bin/sh", "echo from-a"),
            sh_job("b", "/bin/sh", "echo from-b 1>&2"),
        ];
        let results = runner.run_all_streaming(&jobs, sink).await;
        assert!(results.iter().all(|r| r.as_ref().unwrap().passed()));

        let mut seen = vec![];
        while let Ok(chunk) = live.try_recv() {
            seen.push((chunk.job_name, String::from_utf8_lossy(&chunk.blob).into_owned()));
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), "from-a\n".to_string()),
                ("b".to_string(), "from-b\n".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn terraform_jobs_pass_with_clean_tools() {
        let dir = tempfile::tempdir().unwrap();
        let runner = pipeline_runner(dir.path(), &[]);
        let pipeline = Pipeline::terraform();
        let shell = match pipefail_shell() {
            Some(shell) => shell,
            None => return,
        };
        let jobs: Vec<JobSpec> = pipeline
            .jobs()
            .iter()
            .cloned()
            .map(|mut job| {
                job.entrypoint = shell.into();
                job
            })
            .collect();
        assert_eq!(jobs.len(), 3);
        for result in runner.run_all(&jobs).await {
            let result = result.unwrap();
            assert_eq!(result.exit_code, 0, "{} failed", result.job_name);
        }
    }

    #[tokio::test]
    async fn fmt_reports_formatted_sources() {
        let dir = tempfile::tempdir().unwrap();
        let runner = pipeline_runner(dir.path(), &[]);
        let fmt = Pipeline::terraform().get("TF - Fmt").cloned().unwrap();
        let result = runner.run(&fmt).await.unwrap();
        assert_eq!(result.exit_code, 0);
        let output = String::from_utf8_lossy(&result.output);
        assert!(output.contains("terraform fmt -check -recursive -diff"));
        assert!(output.contains(FMT_OK_MESSAGE));
    }

    #[tokio::test]
    async fn fmt_fails_on_unformatted_sources() {
        let dir = tempfile::tempdir().unwrap();
        let runner = pipeline_runner(dir.path(), &[("TERRAFORM_EXIT", "3")]);
        let fmt = Pipeline::terraform().get("TF - Fmt").cloned().unwrap();
        let result = runner.run(&fmt).await.unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!String::from_utf8_lossy(&result.output).contains(FMT_OK_MESSAGE));
    }

    #[tokio::test]
    async fn lint_fails_on_violation() {
        let shell = match pipefail_shell() {
            Some(shell) => shell,
            None => return,
        };
        let dir = tempfile::tempdir().unwrap();
        let runner = pipeline_runner(dir.path(), &[("TFLINT_EXIT", "2")]);
        let mut lint = Pipeline::terraform().get("TF - Lint").cloned().unwrap();
        lint.entrypoint = shell.into();
        let result = runner.run(&lint).await.unwrap();
        assert_eq!(result.exit_code, 2);
        assert!(String::from_utf8_lossy(&result.stdout).contains("tflint --init"));
    }

    #[tokio::test]
    async fn validate_fails_when_init_fails() {
        let shell = match pipefail_shell() {
            Some(shell) => shell,
            None => return,
        };
        let dir = tempfile::tempdir().unwrap();
        let runner = pipeline_runner(dir.path(), &[("TERRAFORM_EXIT", "1")]);
        let mut validate = Pipeline::terraform().get("TF - Validate").cloned().unwrap();
        validate.entrypoint = shell.into();
        let result = runner.run(&validate).await.unwrap();
        assert_eq!(result.exit_code, 1);
        // init's stdout goes to /dev/null and -e stops before validate
        assert!(result.stdout.is_empty());
    }
}
