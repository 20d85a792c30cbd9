mod arg_parser;
mod exit_codes;
mod logging;
mod notify;
mod pipeline_cli;
mod report;

use arg_parser::{ArgParser, PipelineArgs, SubCommand};
use joblib::{Isolation, JobRunner, Pipeline, RunOptions};
use notify::SlackNotifier;
use pipeline_cli::PipelineCli;

use clap::Parser;
use std::error;
use std::process;
use tracing::{info, warn};

const BUILTIN_PIPELINE: &str = "Terraform checks";

#[tokio::main]
async fn main() {
    let args = ArgParser::parse();
    logging::init(args.log_level.as_deref());

    let code = match run(args.sub_command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err);
            exit_codes::INVALID
        }
    };
    process::exit(code);
}

async fn run(sub_command: SubCommand) -> Result<i32, Box<dyn error::Error>> {
    match sub_command {
        SubCommand::List { pipeline } => {
            let (pipeline, _) = load_pipeline(&pipeline)?;
            print!("{}", pipeline_cli::describe(&pipeline));
            Ok(exit_codes::OK)
        }
        SubCommand::Run {
            pipeline,
            jobs,
            workdir,
            engine,
            host,
            pull,
            envs,
            quiet,
            slack,
        } => {
            let (pipeline, name) = load_pipeline(&pipeline)?;
            let pipeline = pipeline.select(&jobs)?;
            let isolation = if host {
                Isolation::Host
            } else {
                Isolation::Container(engine.into())
            };
            let options = RunOptions {
                isolation,
                workdir,
                pull: pull.into(),
                envs,
            };
            if host {
                for job in pipeline_cli::host_shells_without_pipefail(&pipeline).await {
                    warn!(job = %job, "host shell does not support `set -o pipefail`");
                    eprintln!(
                        "warning: the entrypoint of '{}' does not support `set -o pipefail` on this host",
                        job
                    );
                }
            }
            info!(jobs = pipeline.jobs().len(), ?isolation, "running pipeline");

            let cli = PipelineCli::new(JobRunner::new(options), pipeline, name);
            let summary = cli.run(quiet).await;
            println!("{}", summary);

            let notifier = slack.slack_webhook.map(|webhook| {
                SlackNotifier::new(webhook, slack.slack_channel, slack.slack_username)
            });
            Ok(notify::conclude(notifier.as_ref(), cli.name(), &summary).await)
        }
    }
}

/// Load the pipeline named on the command line, or the built-in one, along with a display name.
fn load_pipeline(args: &PipelineArgs) -> joblib::error::Result<(Pipeline, String)> {
    match &args.pipeline {
        Some(path) => {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok((Pipeline::load(path)?, name))
        }
        None => Ok((Pipeline::terraform(), BUILTIN_PIPELINE.to_string())),
    }
}
