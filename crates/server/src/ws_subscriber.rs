use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use facemark_core::delivery::live_channel::LiveChannel;
use facemark_core::delivery::live_subscriber::{LiveMessage, LiveSubscriber};

/// Text sent after the last frame of a completed job.
pub const DONE_MESSAGE: &str = "done";
/// Text sent when the job fails; no frames follow it.
pub const ERROR_MESSAGE: &str = "error";

/// Frames queued for a socket before it counts as not writable.
pub const FRAME_BUFFER: usize = 2;

/// Live subscriber that hands messages to the task driving one WebSocket.
///
/// Frames go through a small bounded queue; once it is full the client is
/// not writable and frames are dropped. The terminal message has its own
/// slot so it always gets through. Sending never blocks.
pub struct WsSubscriber {
    frames: mpsc::Sender<LiveMessage>,
    terminal: Option<oneshot::Sender<LiveMessage>>,
}

/// Socket-side end of a [`WsSubscriber`].
pub struct WsFeed {
    frames: mpsc::Receiver<LiveMessage>,
    terminal: oneshot::Receiver<LiveMessage>,
    finished: bool,
}

impl WsSubscriber {
    pub fn pair() -> (Self, WsFeed) {
        let (frames_tx, frames) = mpsc::channel(FRAME_BUFFER);
        let (terminal_tx, terminal) = oneshot::channel();
        let subscriber = Self {
            frames: frames_tx,
            terminal: Some(terminal_tx),
        };
        let feed = WsFeed {
            frames,
            terminal,
            finished: false,
        };
        (subscriber, feed)
    }
}

impl LiveSubscriber for WsSubscriber {
    fn send(&mut self, message: LiveMessage) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !message.is_terminal() {
            return match self.frames.try_send(message) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err("WebSocket client is behind, frame dropped".into()),
                Err(TrySendError::Closed(_)) => Err("WebSocket connection closed".into()),
            };
        }
        let terminal = self.terminal.take().ok_or("final message already sent")?;
        terminal
            .send(message)
            .map_err(|_| "WebSocket connection closed".into())
    }

    fn is_open(&self) -> bool {
        !self.frames.is_closed()
    }

    fn is_writable(&self) -> bool {
        self.is_open() && self.frames.capacity() > 0
    }
}

impl WsFeed {
    /// Next message for the socket. Queued frames come before the terminal
    /// message; `None` after it, or when the subscriber went away.
    pub async fn recv(&mut self) -> Option<LiveMessage> {
        if self.finished {
            return None;
        }
        tokio::select! {
            biased;
            Some(frame) = self.frames.recv() => Some(frame),
            terminal = &mut self.terminal => {
                self.finished = true;
                terminal.ok()
            }
        }
    }
}

/// Wire form of a live message: JPEG bytes as binary, terminals as text.
pub fn to_ws_message(message: LiveMessage) -> Message {
    match message {
        LiveMessage::Frame { bytes, .. } => Message::Binary(bytes.into()),
        LiveMessage::Done => Message::Text(DONE_MESSAGE.into()),
        LiveMessage::Error(_) => Message::Text(ERROR_MESSAGE.into()),
    }
}

/// Binds `socket` to the job's channel and forwards messages until the
/// terminal one has been sent or the client goes away.
pub async fn stream_job(mut socket: WebSocket, channel: std::sync::Arc<LiveChannel>, job: String) {
    let (subscriber, mut feed) = WsSubscriber::pair();
    channel.bind(Box::new(subscriber));
    log::info!("Live subscriber connected to job {job}");

    loop {
        tokio::select! {
            message = feed.recv() => {
                let Some(message) = message else { break };
                let terminal = message.is_terminal();
                if let LiveMessage::Error(reason) = &message {
                    log::info!("Job {job} failed, notifying subscriber: {reason}");
                }
                if let Err(e) = socket.send(to_ws_message(message)).await {
                    log::debug!("Live socket for job {job} closed: {e}");
                    break;
                }
                if terminal {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    log::debug!("Live socket for job {job} errored: {e}");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    log::info!("Live subscriber disconnected from job {job}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u32) -> LiveMessage {
        LiveMessage::Frame { index, bytes: vec![index as u8] }
    }

    #[tokio::test]
    async fn test_messages_are_forwarded_in_order() {
        let (mut sub, mut feed) = WsSubscriber::pair();
        sub.send(LiveMessage::Frame { index: 1, bytes: vec![0xFF, 0xD8] }).unwrap();
        sub.send(LiveMessage::Done).unwrap();

        assert_eq!(
            feed.recv().await,
            Some(LiveMessage::Frame { index: 1, bytes: vec![0xFF, 0xD8] })
        );
        assert_eq!(feed.recv().await, Some(LiveMessage::Done));
        assert_eq!(feed.recv().await, None);
    }

    #[test]
    fn test_closed_when_feed_dropped() {
        let (mut sub, feed) = WsSubscriber::pair();
        assert!(sub.is_open());
        drop(feed);
        assert!(!sub.is_open());
        assert!(!sub.is_writable());
        assert!(sub.send(frame(1)).is_err());
        assert!(sub.send(LiveMessage::Done).is_err());
    }

    #[test]
    fn test_full_queue_is_not_writable() {
        let (mut sub, _feed) = WsSubscriber::pair();
        for i in 0..FRAME_BUFFER as u32 {
            assert!(sub.is_writable());
            sub.send(frame(i)).unwrap();
        }
        assert!(sub.is_open());
        assert!(!sub.is_writable());
        assert!(sub.send(frame(99)).is_err());
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            to_ws_message(LiveMessage::Frame { index: 3, bytes: vec![1, 2, 3] }),
            Message::Binary(vec![1, 2, 3].into())
        );
        assert_eq!(to_ws_message(LiveMessage::Done), Message::Text("done".into()));
        assert_eq!(
            to_ws_message(LiveMessage::Error("remux failed".into())),
            Message::Text("error".into())
        );
    }

    #[tokio::test]
    async fn test_channel_drives_subscriber() {
        let channel = LiveChannel::new();
        let (sub, mut feed) = WsSubscriber::pair();
        channel.bind(Box::new(sub));
        assert!(channel.push(1, vec![9]));
        channel.fail("boom");

        assert_eq!(feed.recv().await, Some(LiveMessage::Frame { index: 1, bytes: vec![9] }));
        assert_eq!(feed.recv().await, Some(LiveMessage::Error("boom".into())));
        assert_eq!(feed.recv().await, None);
    }

    #[tokio::test]
    async fn test_stalled_client_holds_at_most_a_few_frames() {
        let channel = LiveChannel::new();
        let (sub, mut feed) = WsSubscriber::pair();
        channel.bind(Box::new(sub));

        let delivered = (1..=50).filter(|&i| channel.push(i, vec![0; 1024])).count();
        assert_eq!(delivered, FRAME_BUFFER);
        assert!(channel.has_subscriber());
        channel.complete();

        let mut received = Vec::new();
        while let Some(message) = feed.recv().await {
            received.push(message);
        }
        assert_eq!(received.len(), FRAME_BUFFER + 1);
        assert_eq!(received.last(), Some(&LiveMessage::Done));
        assert!(matches!(received[0], LiveMessage::Frame { index: 1, .. }));
    }
}
