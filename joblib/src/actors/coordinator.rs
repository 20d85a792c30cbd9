mod actor;
mod messages;

use self::{
    actor::JobCoordinator,
    messages::CoordinatorMessage::{
        self, GetStatus, ListJobs, RemoveJob, StartJob, StopJob, StreamOutput, WaitJob,
    },
};
use crate::actors::broadcaster::Stream;
use crate::error::{self, Error};
use crate::events::JobStatus;
use crate::launch::Launch;
use crate::types::{Args, Dir, Envs, JobId, OutputBlob, Program};
use tokio::sync::{mpsc, oneshot};

/// Inbound message capacity used by `JobCoordinatorHandle::default`.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 64;

/// A `JobCoordinator` which provides functionality for managing jobs and querying job state.
///
/// This struct is actually an actor handle, the real work is done in the actor spawned by `JobCoordinator::spawn`,
/// but from the user perspective all that matters is that this struct provides methods for managing jobs.
/// The actor-handle abstraction allows this struct to be cloned freely in a multi-thread async context,
/// without requiring an `Arc<Mutex>` or any other means of synchronization.
#[derive(Clone)]
pub struct JobCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
}

impl Default for JobCoordinatorHandle {
    fn default() -> Self {
        Self::spawn(DEFAULT_MESSAGE_CAPACITY)
    }
}

impl JobCoordinatorHandle {
    /// Spawn a new coordinator. Must be called from within a tokio runtime.
    ///
    /// Specify the capacity for the coordinator's message queue. This limits the build-up of inbound messages.
    pub fn spawn(message_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(message_capacity);
        JobCoordinator::spawn(receiver);
        Self { sender }
    }

    /// Start a new process and return the id it is tracked under.
    pub async fn start_job(
        &self,
        cmd: Program,
        args: Args,
        dir: Dir,
        envs: Envs,
    ) -> error::Result<JobId> {
        self.request(|response| StartJob {
            cmd,
            args,
            dir,
            envs,
            stop: None,
            response,
        })
        .await
    }

    /// Start the process described by `launch`. Stopping the job also runs `launch.stop`.
    pub async fn start_launch(&self, launch: Launch) -> error::Result<JobId> {
        self.request(|response| StartJob {
            cmd: launch.program,
            args: launch.args,
            dir: launch.dir,
            envs: launch.envs,
            stop: launch.stop,
            response,
        })
        .await
    }

    /// Kill a running job. Fails with `AlreadyStopped` once the job has terminated.
    pub async fn stop_job(&self, job_id: JobId) -> error::Result<()> {
        self.request(|response| StopJob { job_id, response }).await
    }

    pub async fn get_job_status(&self, job_id: JobId) -> error::Result<JobStatus> {
        self.request(|response| GetStatus { job_id, response }).await
    }

    /// Resolves with the job's terminal status once its process is gone.
    pub async fn wait_job(&self, job_id: JobId) -> error::Result<JobStatus> {
        self.request(|response| WaitJob { job_id, response }).await
    }

    /// Forget a job, killing its process if it is still running.
    ///
    /// Output subscribers that were already handed out still drain whatever the job wrote.
    pub async fn remove_job(&self, job_id: JobId) -> error::Result<()> {
        self.request(|response| RemoveJob { job_id, response }).await
    }

    /// Ids of every job that has been started and not yet removed.
    pub async fn list_jobs(&self) -> error::Result<Vec<JobId>> {
        self.request(|response| ListJobs { response }).await
    }

    pub async fn stream_stdout(
        &self,
        job_id: JobId,
    ) -> error::Result<mpsc::UnboundedReceiver<OutputBlob>> {
        self.stream_output(job_id, Stream::Stdout).await
    }

    pub async fn stream_stderr(
        &self,
        job_id: JobId,
    ) -> error::Result<mpsc::UnboundedReceiver<OutputBlob>> {
        self.stream_output(job_id, Stream::Stderr).await
    }

    pub async fn stream_all(
        &self,
        job_id: JobId,
    ) -> error::Result<mpsc::UnboundedReceiver<OutputBlob>> {
        self.stream_output(job_id, Stream::All).await
    }

    async fn stream_output(
        &self,
        job_id: JobId,
        stream: Stream,
    ) -> error::Result<mpsc::UnboundedReceiver<OutputBlob>> {
        self.request(|response| StreamOutput {
            job_id,
            stream,
            response,
        })
        .await
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<error::Result<T>>) -> CoordinatorMessage,
    ) -> error::Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| Error::CoordinatorExited)?;
        rx.await.map_err(|_| Error::CoordinatorExited)?
    }
}
