mod actor;
mod messages;

use crate::error::{self, Error};
use crate::events::{JobStatus, Output};
use crate::types::{Args, Dir, Envs, Program, StopCommand};
use actor::Actor;
use messages::WorkerMessage;
use std::process::Stdio;
use tokio::{
    process,
    sync::{mpsc, oneshot},
};
use tracing::debug;

/// Handle to the actor that owns a single child process.
///
/// Dropping every clone of the handle kills the child if it is still running.
/// Killing the child also runs its stop command, if it has one.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::UnboundedSender<WorkerMessage>,
}

impl WorkerHandle {
    pub fn spawn(
        output_tx: mpsc::UnboundedSender<Output>,
        cmd: Program,
        args: Args,
        dir: Dir,
        envs: Envs,
        stop: Option<StopCommand>,
    ) -> error::Result<Self> {
        let mut command = process::Command::new(&cmd);
        let child = command
            .args(args)
            .current_dir(dir)
            .envs(envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: cmd.clone(),
                source,
            })?;
        debug!(program = %cmd, pid = ?child.id(), "spawned child process");
        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(inbox, output_tx, child, stop);
        Ok(Self { sender })
    }

    pub fn get_status(&self, response: oneshot::Sender<error::Result<JobStatus>>) {
        let _ = self.sender.send(WorkerMessage::GetStatus { response });
    }

    pub fn stop(&self, response: oneshot::Sender<error::Result<()>>) {
        let _ = self.sender.send(WorkerMessage::Stop { response });
    }

    /// `response` receives the terminal status once the child is gone.
    pub fn wait(&self, response: oneshot::Sender<JobStatus>) {
        let _ = self.sender.send(WorkerMessage::Wait { response });
    }
}
