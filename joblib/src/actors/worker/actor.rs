use super::messages::WorkerMessage;
use crate::error::Error as JobError;
use crate::events::{JobStatus, Output};
use crate::types::StopCommand;

use bytes::BytesMut;
use futures::future::FutureExt;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{self, Child},
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, error};

const READ_CHUNK: usize = 4096;

pub struct Actor {
    inbox: mpsc::UnboundedReceiver<WorkerMessage>,
    kill_tx: Option<oneshot::Sender<()>>,
    job_status: JobStatus,
    waiters: Vec<oneshot::Sender<JobStatus>>,
}

impl Actor {
    pub fn spawn(
        inbox: mpsc::UnboundedReceiver<WorkerMessage>,
        output_tx: mpsc::UnboundedSender<Output>,
        child: Child,
        stop: Option<StopCommand>,
    ) {
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(async move {
            let actor = Self {
                inbox,
                kill_tx: Some(kill_tx),
                job_status: JobStatus::Running,
                waiters: Vec::new(),
            };
            actor.run(output_tx, kill_rx, child, stop).await;
        });
    }

    async fn run(
        mut self,
        output_tx: mpsc::UnboundedSender<Output>,
        kill_rx: oneshot::Receiver<()>,
        mut child: Child,
        mut stop: Option<StopCommand>,
    ) {
        let (child_exit_tx, child_exit_rx) = oneshot::channel();
        let maybe_stdout = child.stdout.take();
        let maybe_stderr = child.stderr.take();
        let mut kill_rx = kill_rx.fuse();

        // reap the child, killing it first if asked to
        tokio::spawn(async move {
            loop {
                select! {
                    _ = &mut kill_rx => {
                        if let Some((program, args)) = stop.take() {
                            tokio::spawn(run_stop_command(program, args));
                        }
                        if let Err(err) = child.start_kill() {
                            debug!(%err, "kill failed, child already exited");
                        }
                    }
                    exit_status = child.wait() => {
                        let status = match exit_status {
                            Ok(exit_status) => match (exit_status.code(), exit_status.signal()) {
                                (Some(code), _) => JobStatus::Exited { code },
                                (None, Some(signal)) => JobStatus::Killed { signal },
                                (None, None) => JobStatus::Lost,
                            },
                            Err(err) => {
                                error!(%err, "failed to wait on child process");
                                JobStatus::Lost
                            }
                        };
                        let _ = child_exit_tx.send(status);
                        break;
                    }
                }
            }
        });

        if let Some(stdout) = maybe_stdout {
            tokio::spawn(pipe_output(stdout, output_tx.clone(), Output::Stdout));
        }
        if let Some(stderr) = maybe_stderr {
            tokio::spawn(pipe_output(stderr, output_tx, Output::Stderr));
        }

        self.handle_messages(child_exit_rx).await;
    }

    async fn handle_messages(&mut self, child_exit_rx: oneshot::Receiver<JobStatus>) {
        use WorkerMessage::*;
        let mut child_exit_rx = child_exit_rx.fuse();
        loop {
            select! {
                maybe_msg = self.inbox.recv() => {
                    match maybe_msg {
                        Some(GetStatus { response }) => {
                            let _ = response.send(Ok(self.job_status));
                        }
                        Some(Stop { response }) => {
                            match (self.job_status, self.kill_tx.take()) {
                                (JobStatus::Running, Some(kill_tx)) => {
                                    let _ = kill_tx.send(());
                                    let _ = response.send(Ok(()));
                                }
                                _ => {
                                    let _ = response.send(Err(JobError::AlreadyStopped));
                                }
                            }
                        }
                        Some(Wait { response }) => {
                            if self.job_status.is_running() {
                                self.waiters.push(response);
                            } else {
                                let _ = response.send(self.job_status);
                            }
                        }
                        None => {
                            // handle dropped, don't leave the child behind
                            if let Some(kill_tx) = self.kill_tx.take() {
                                let _ = kill_tx.send(());
                            }
                            return;
                        }
                    }
                }
                exit_status = &mut child_exit_rx => {
                    let status = exit_status.unwrap_or(JobStatus::Lost);
                    debug!(%status, "child process finished");
                    self.job_status = status;
                    for waiter in self.waiters.drain(..) {
                        let _ = waiter.send(status);
                    }
                }
            }
        }
    }
}

async fn run_stop_command(program: String, args: Vec<String>) {
    let status = process::Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) if status.success() => debug!(%program, "stop command finished"),
        Ok(status) => error!(%program, ?args, %status, "stop command failed"),
        Err(err) => error!(%program, %err, "failed to run stop command"),
    }
}

/// Forward everything read from `reader` as output chunks until EOF.
async fn pipe_output<R>(
    mut reader: R,
    output_tx: mpsc::UnboundedSender<Output>,
    wrap: fn(bytes::Bytes) -> Output,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        match reader.read_buf(&mut buf).await {
            Ok(n) if n > 0 => {
                // move the bytes out of buf and into a message
                let _ = output_tx.send(wrap(buf.split().freeze()));
                buf.reserve(READ_CHUNK);
            }
            Ok(_) => break,
            Err(err) => {
                debug!(%err, "output pipe read failed");
                break;
            }
        }
    }
}
