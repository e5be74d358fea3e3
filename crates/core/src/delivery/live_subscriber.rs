/// One message on a job's live stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveMessage {
    /// An annotated still, in index order.
    Frame { index: u32, bytes: Vec<u8> },
    /// The job completed; no more frames follow.
    Done,
    /// The job failed; no more frames follow.
    Error(String),
}

impl LiveMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Frame { .. })
    }
}

/// The receiving end of a live stream, e.g. a WebSocket connection.
pub trait LiveSubscriber: Send {
    fn send(&mut self, message: LiveMessage) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// False once the peer has gone away.
    fn is_open(&self) -> bool;

    /// Whether a frame sent now would be accepted without queueing.
    /// Frames are dropped while this is false; terminal messages are not.
    fn is_writable(&self) -> bool {
        self.is_open()
    }
}

/// Subscriber backed by a crossbeam channel, for in-process consumers.
pub struct ChannelSubscriber {
    tx: crossbeam_channel::Sender<LiveMessage>,
    open: bool,
}

impl ChannelSubscriber {
    pub fn new(tx: crossbeam_channel::Sender<LiveMessage>) -> Self {
        Self { tx, open: true }
    }

    /// A subscriber and the receiver that observes it.
    pub fn pair() -> (Self, crossbeam_channel::Receiver<LiveMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl LiveSubscriber for ChannelSubscriber {
    fn send(&mut self, message: LiveMessage) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Err(e) = self.tx.send(message) {
            self.open = false;
            return Err(e.to_string().into());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_subscriber_forwards_messages() {
        let (mut sub, rx) = ChannelSubscriber::pair();
        sub.send(LiveMessage::Frame { index: 1, bytes: vec![1, 2] }).unwrap();
        sub.send(LiveMessage::Done).unwrap();
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![LiveMessage::Frame { index: 1, bytes: vec![1, 2] }, LiveMessage::Done]
        );
    }

    #[test]
    fn test_channel_subscriber_closes_when_receiver_dropped() {
        let (mut sub, rx) = ChannelSubscriber::pair();
        drop(rx);
        assert!(sub.is_open());
        assert!(sub.send(LiveMessage::Done).is_err());
        assert!(!sub.is_open());
    }

    #[test]
    fn test_terminal_messages() {
        assert!(LiveMessage::Done.is_terminal());
        assert!(LiveMessage::Error("x".into()).is_terminal());
        assert!(!LiveMessage::Frame { index: 1, bytes: vec![] }.is_terminal());
    }
}
