use super::messages::{Message, Stream};
use crate::events::Output;
use crate::types::OutputBlob;

use tokio::select;
use tokio::sync::mpsc;

pub struct Actor {
    inbox: mpsc::UnboundedReceiver<Message>,
    output_rx: mpsc::UnboundedReceiver<Output>,
    output_buffer: Vec<Output>,
    subscribers: Vec<(Stream, mpsc::UnboundedSender<OutputBlob>)>,
    inbox_open: bool,
    output_pending: bool,
}

impl Stream {
    /// Returns the chunk carried by `output` if this stream includes it.
    fn select<'a>(&self, output: &'a Output) -> Option<&'a OutputBlob> {
        match (self, output) {
            (Stream::All, Output::Stdout(blob) | Output::Stderr(blob))
            | (Stream::Stdout, Output::Stdout(blob))
            | (Stream::Stderr, Output::Stderr(blob)) => Some(blob),
            _ => None,
        }
    }
}

impl Actor {
    pub fn spawn(
        inbox: mpsc::UnboundedReceiver<Message>,
        output_rx: mpsc::UnboundedReceiver<Output>,
    ) {
        let actor = Actor {
            inbox,
            output_rx,
            output_buffer: Vec::new(),
            subscribers: Vec::new(),
            inbox_open: true,
            output_pending: true,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        loop {
            select! {
                maybe_msg = self.inbox.recv(), if self.inbox_open => {
                    match maybe_msg {
                        Some(Message::Subscribe { stream, subscriber }) => {
                            self.subscribe(stream, subscriber);
                        }
                        None => self.inbox_open = false,
                    }
                }
                maybe_output = self.output_rx.recv(), if self.output_pending => {
                    match maybe_output {
                        Some(output) => self.publish(output),
                        None => {
                            // dropping the senders closes every subscriber's stream
                            self.subscribers.clear();
                            self.output_pending = false;
                        }
                    }
                }
                else => break,
            }
        }
    }

    fn publish(&mut self, output: Output) {
        // only retain subscribers who have not dropped
        self.subscribers.retain(|(stream, subscriber)| match stream.select(&output) {
            Some(blob) => subscriber.send(blob.clone()).is_ok(),
            None => true,
        });
        self.output_buffer.push(output);
    }

    fn subscribe(&mut self, stream: Stream, subscriber: mpsc::UnboundedSender<OutputBlob>) {
        for blob in self.output_buffer.iter().filter_map(|output| stream.select(output)) {
            if subscriber.send(blob.clone()).is_err() {
                return;
            }
        }
        if self.output_pending {
            self.subscribers.push((stream, subscriber));
        }
    }
}
