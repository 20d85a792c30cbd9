use crate::actors::broadcaster::Stream;
use crate::error;
use crate::events::JobStatus;
use crate::types::{Args, Dir, Envs, JobId, OutputBlob, Program, StopCommand};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub enum CoordinatorMessage {
    StartJob {
        cmd: Program,
        args: Args,
        dir: Dir,
        envs: Envs,
        stop: Option<StopCommand>,
        response: oneshot::Sender<error::Result<JobId>>,
    },
    StopJob {
        job_id: JobId,
        response: oneshot::Sender<error::Result<()>>,
    },
    GetStatus {
        job_id: JobId,
        response: oneshot::Sender<error::Result<JobStatus>>,
    },
    WaitJob {
        job_id: JobId,
        response: oneshot::Sender<error::Result<JobStatus>>,
    },
    RemoveJob {
        job_id: JobId,
        response: oneshot::Sender<error::Result<()>>,
    },
    ListJobs {
        response: oneshot::Sender<error::Result<Vec<JobId>>>,
    },
    StreamOutput {
        job_id: JobId,
        stream: Stream,
        response: oneshot::Sender<error::Result<mpsc::UnboundedReceiver<OutputBlob>>>,
    },
}
