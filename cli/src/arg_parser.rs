use clap::{ArgEnum, Args, Parser, Subcommand};
use joblib::{ContainerEngine, PullPolicy};
use std::path::PathBuf;

/// Run the Terraform CI checks, each job in its own container
#[derive(Debug, Parser)]
#[clap(name = "ci-runner", version)]
pub struct ArgParser {
    /// Log filter, e.g. `info` or `joblib=debug`. Falls back to RUST_LOG, then `warn`
    #[clap(long, global = true)]
    pub log_level: Option<String>,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum SubCommand {
    /// list the jobs of a pipeline
    List {
        #[clap(flatten)]
        pipeline: PipelineArgs,
    },
    /// run the jobs of a pipeline concurrently
    Run {
        #[clap(flatten)]
        pipeline: PipelineArgs,

        #[clap(long = "job", multiple_occurrences = true)]
        /// only run the named job, may be repeated
        jobs: Vec<String>,

        #[clap(long, default_value = ".")]
        /// directory holding the Terraform sources
        workdir: PathBuf,

        #[clap(long, arg_enum, default_value = "docker")]
        /// container engine used to run the jobs
        engine: Engine,

        #[clap(long)]
        /// run each entrypoint directly on this host instead of in a container.
        /// The built-in jobs then need a /bin/sh that supports `set -o pipefail`
        host: bool,

        #[clap(long, arg_enum, default_value = "missing")]
        /// when to pull job images
        pull: Pull,

        #[clap(long = "env", multiple_occurrences = true, parse(try_from_str = var_eq_val))]
        /// environment variable passed to every job, may be repeated
        envs: Vec<(String, String)>,

        #[clap(short, long)]
        /// don't print job output, only the summary
        quiet: bool,

        #[clap(flatten)]
        slack: SlackArgs,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Args)]
pub struct PipelineArgs {
    /// TOML pipeline definition; the built-in Terraform pipeline when omitted
    #[clap(long)]
    pub pipeline: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Args)]
pub struct SlackArgs {
    /// Slack incoming webhook to post the run result to
    #[clap(long, env = "SLACK_WEBHOOK")]
    pub slack_webhook: Option<String>,
    /// channel to post in
    #[clap(long, env = "SLACK_CHANNEL")]
    pub slack_channel: Option<String>,
    /// username to post as
    #[clap(long, env = "SLACK_USERNAME")]
    pub slack_username: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ArgEnum)]
pub enum Engine {
    Docker,
    Podman,
}

impl From<Engine> for ContainerEngine {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Docker => ContainerEngine::Docker,
            Engine::Podman => ContainerEngine::Podman,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ArgEnum)]
pub enum Pull {
    /// pull images that are not present locally
    Missing,
    /// always pull
    Always,
    /// never pull
    Never,
}

impl From<Pull> for PullPolicy {
    fn from(pull: Pull) -> Self {
        match pull {
            Pull::Missing => PullPolicy::Missing,
            Pull::Always => PullPolicy::Always,
            Pull::Never => PullPolicy::Never,
        }
    }
}

/// try_from_str parse function for job env variables
fn var_eq_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((var, val)) if !var.is_empty() => Ok((var.to_string(), val.to_string())),
        _ => Err("Required format is VAR=VAL".to_string()),
    }
}
