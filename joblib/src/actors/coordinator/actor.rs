use super::messages::CoordinatorMessage;
use crate::actors::{
    broadcaster::{BroadcasterHandle, Stream},
    worker::WorkerHandle,
};
use crate::error::{self, Error};
use crate::events::JobStatus;
use crate::types::{Args, Dir, Envs, JobId, OutputBlob, Program, StopCommand};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info_span};

/// The pair of actors backing one started job.
struct JobHandles {
    worker: WorkerHandle,
    broadcaster: BroadcasterHandle,
}

pub struct JobCoordinator {
    inbox: mpsc::Receiver<CoordinatorMessage>,
    jobs: HashMap<JobId, JobHandles>,
}

impl JobCoordinator {
    pub fn spawn(inbox: mpsc::Receiver<CoordinatorMessage>) {
        let actor = Self {
            inbox,
            jobs: HashMap::new(),
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        use self::CoordinatorMessage::*;
        while let Some(msg) = self.inbox.recv().await {
            match msg {
                StartJob {
                    cmd,
                    args,
                    dir,
                    envs,
                    stop,
                    response,
                } => {
                    let _ = response.send(self.start_job(cmd, args, dir, envs, stop));
                }
                StopJob { job_id, response } => match self.jobs.get(&job_id) {
                    Some(job) => job.worker.stop(response),
                    None => {
                        let _ = response.send(Err(Error::DoesNotExist));
                    }
                },
                GetStatus { job_id, response } => match self.jobs.get(&job_id) {
                    Some(job) => job.worker.get_status(response),
                    None => {
                        let _ = response.send(Err(Error::DoesNotExist));
                    }
                },
                WaitJob { job_id, response } => self.wait_job(job_id, response),
                RemoveJob { job_id, response } => {
                    // dropping the handles closes both actors' inboxes
                    let removed = self.jobs.remove(&job_id).map(drop);
                    let _ = response.send(removed.ok_or(Error::DoesNotExist));
                }
                ListJobs { response } => {
                    let _ = response.send(Ok(self.jobs.keys().copied().collect()));
                }
                StreamOutput {
                    job_id,
                    stream,
                    response,
                } => {
                    let _ = response.send(self.stream_output(job_id, stream));
                }
            }
        }
        debug!(jobs = self.jobs.len(), "coordinator inbox closed");
    }

    fn start_job(
        &mut self,
        cmd: Program,
        args: Args,
        dir: Dir,
        envs: Envs,
        stop: Option<StopCommand>,
    ) -> error::Result<JobId> {
        let job_id = uuid::Uuid::new_v4();
        let _span = info_span!("start_job", %job_id, program = %cmd).entered();
        // channel for piping child process output
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::spawn(output_tx, cmd, args, dir, envs, stop)?;
        let broadcaster = BroadcasterHandle::spawn(output_rx);
        self.jobs.insert(
            job_id,
            JobHandles {
                worker,
                broadcaster,
            },
        );
        Ok(job_id)
    }

    fn wait_job(&self, job_id: JobId, response: oneshot::Sender<error::Result<JobStatus>>) {
        let job = match self.jobs.get(&job_id) {
            Some(job) => job,
            None => {
                let _ = response.send(Err(Error::DoesNotExist));
                return;
            }
        };
        let (status_tx, status_rx) = oneshot::channel();
        job.worker.wait(status_tx);
        // don't block the inbox while the job runs
        tokio::spawn(async move {
            let status = status_rx.await.unwrap_or(JobStatus::Lost);
            let _ = response.send(Ok(status));
        });
    }

    fn stream_output(
        &self,
        job_id: JobId,
        stream: Stream,
    ) -> error::Result<mpsc::UnboundedReceiver<OutputBlob>> {
        let job = self.jobs.get(&job_id).ok_or(Error::DoesNotExist)?;
        let (subscriber, output) = mpsc::unbounded_channel();
        job.broadcaster.subscribe(stream, subscriber);
        Ok(output)
    }
}
