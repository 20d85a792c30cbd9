mod actor;
mod messages;
use crate::{events::Output, types::OutputBlob};
use actor::Actor;
pub use messages::Stream;
use messages::Message;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A `Broadcaster` which can add subscribers, receive output, and broadcast the output to all subscribers.
///
/// This struct is actually an actor handle. The real work is done in the actor spawned by `BroadcasterHandle::spawn`.
/// Every subscriber first receives the output produced so far, then live output until the job's pipes close.
#[derive(Clone)]
pub struct BroadcasterHandle {
    sender: mpsc::UnboundedSender<Message>,
}

impl BroadcasterHandle {
    pub fn spawn(output_rx: UnboundedReceiver<Output>) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(inbox, output_rx);
        Self { sender }
    }

    pub fn subscribe(&self, stream: Stream, subscriber: UnboundedSender<OutputBlob>) {
        let _ = self.sender.send(Message::Subscribe { stream, subscriber });
    }
}
