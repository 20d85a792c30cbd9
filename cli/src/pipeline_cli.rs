use crate::report::Summary;
use joblib::{JobOutput, JobRunner, Pipeline};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;

/// Prints job output line by line, each line prefixed with its job's name.
///
/// Chunks may end mid-line, so the unfinished tail of every job is held back until its newline arrives.
#[derive(Default)]
pub struct LinePrefixer {
    pending: HashMap<String, Vec<u8>>,
}

impl LinePrefixer {
    /// Returns the complete lines made available by `chunk`.
    pub fn push(&mut self, chunk: &JobOutput) -> Vec<String> {
        let pending = self.pending.entry(chunk.job_name.clone()).or_default();
        pending.extend_from_slice(&chunk.blob);
        let mut lines = vec![];
        while let Some(end) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=end).collect();
            lines.push(prefixed(&chunk.job_name, &line[..end]));
        }
        lines
    }

    /// Returns the unterminated tails left over once all output is in.
    pub fn finish(self) -> Vec<String> {
        let mut tails: Vec<_> = self
            .pending
            .into_iter()
            .filter(|(_, rest)| !rest.is_empty())
            .map(|(job_name, rest)| prefixed(&job_name, &rest))
            .collect();
        tails.sort();
        tails
    }
}

fn prefixed(job_name: &str, line: &[u8]) -> String {
    let line = String::from_utf8_lossy(line);
    format!("[{}] {}", job_name, line.trim_end_matches('\r'))
}

pub struct PipelineCli {
    runner: JobRunner,
    pipeline: Pipeline,
    name: String,
}

impl PipelineCli {
    pub fn new(runner: JobRunner, pipeline: Pipeline, name: impl Into<String>) -> Self {
        Self {
            runner,
            pipeline,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run every job of the pipeline concurrently and summarize the outcomes.
    pub async fn run(&self, quiet: bool) -> Summary {
        let jobs = self.pipeline.jobs();
        let (sink, mut live) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            let mut prefixer = LinePrefixer::default();
            while let Some(chunk) = live.recv().await {
                if quiet {
                    continue;
                }
                for line in prefixer.push(&chunk) {
                    println!("{}", line);
                }
            }
            for line in prefixer.finish() {
                println!("{}", line);
            }
        });

        let results = self.runner.run_all_streaming(jobs, sink).await;
        // the sink is gone once every job is done, which ends the printer
        if let Err(err) = printer.await {
            tracing::error!(%err, "output printer panicked");
        }
        Summary::new(jobs, results)
    }
}

/// Names of the jobs whose script sets `pipefail` but whose entrypoint on this host rejects it.
pub async fn host_shells_without_pipefail(pipeline: &Pipeline) -> Vec<String> {
    let mut unsupported = vec![];
    for job in pipeline.jobs() {
        if !job.args.iter().any(|arg| arg.contains("set -o pipefail")) {
            continue;
        }
        let supported = Command::new(&job.entrypoint)
            .args(["-c", "set -o pipefail"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false);
        if !supported {
            unsupported.push(job.name.clone());
        }
    }
    unsupported
}

/// Human-readable listing of a pipeline's jobs.
pub fn describe(pipeline: &Pipeline) -> String {
    let mut out = String::new();
    for job in pipeline.jobs() {
        out.push_str(&format!("{}\n", job.name));
        out.push_str(&format!("  image:      {}\n", job.image));
        out.push_str(&format!("  entrypoint: {}\n", job.entrypoint));
        for arg in &job.args {
            let mut lines = arg.lines();
            if let Some(first) = lines.next() {
                out.push_str(&format!("  arg:        {}\n", first));
            }
            for line in lines {
                out.push_str(&format!("              {}\n", line));
            }
        }
    }
    out
}
