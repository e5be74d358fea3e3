use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::shared::error::PipelineError;

use super::live_subscriber::{LiveMessage, LiveSubscriber};

/// Per-job binding point between the frame loop and at most one subscriber.
///
/// Pushes are best effort: without an open subscriber they are dropped.
/// Exactly one terminal message (`Done` or `Error`) is ever emitted; a
/// subscriber that binds after the job finished receives it immediately.
#[derive(Default)]
pub struct LiveChannel {
    state: Mutex<ChannelState>,
    bound: Condvar,
}

impl std::fmt::Debug for LiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveChannel").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct ChannelState {
    subscriber: Option<Box<dyn LiveSubscriber>>,
    terminal: Option<LiveMessage>,
    frames_pushed: u64,
}

impl LiveChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches `subscriber`, replacing any previous one.
    pub fn bind(&self, mut subscriber: Box<dyn LiveSubscriber>) {
        let mut state = self.lock();
        if let Some(terminal) = state.terminal.clone() {
            if let Err(e) = subscriber.send(terminal) {
                log::debug!("Late subscriber went away before the final message: {e}");
            }
            return;
        }
        if state.subscriber.replace(subscriber).is_some() {
            log::info!("Live subscriber replaced");
        }
        self.bound.notify_all();
    }

    pub fn has_subscriber(&self) -> bool {
        self.lock().subscriber.as_ref().is_some_and(|s| s.is_open())
    }

    /// Blocks until a subscriber binds, the job finishes, or `timeout` elapses.
    /// Returns whether a subscriber is bound.
    pub fn wait_for_subscriber(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .bound
            .wait_timeout_while(state, timeout, |s| {
                s.subscriber.is_none() && s.terminal.is_none()
            })
            .unwrap_or_else(PoisonError::into_inner);
        state.subscriber.is_some()
    }

    /// Sends one annotated frame. Returns whether it reached a subscriber.
    ///
    /// A subscriber that is still open but not writable misses the frame.
    pub fn push(&self, index: u32, bytes: Vec<u8>) -> bool {
        let mut state = self.lock();
        if state.terminal.is_some() {
            return false;
        }
        if let Some(subscriber) = &state.subscriber {
            if subscriber.is_open() && !subscriber.is_writable() {
                log::debug!("Live subscriber is busy, dropping frame {index}");
                return false;
            }
        }
        let delivered = deliver(&mut state, LiveMessage::Frame { index, bytes });
        if delivered {
            state.frames_pushed += 1;
        }
        delivered
    }

    /// Emits `Done`; later pushes and finishes are ignored.
    pub fn complete(&self) {
        self.finish(LiveMessage::Done);
    }

    /// Emits `Error(message)`; later pushes and finishes are ignored.
    pub fn fail(&self, message: impl Into<String>) {
        self.finish(LiveMessage::Error(message.into()));
    }

    pub fn is_finished(&self) -> bool {
        self.lock().terminal.is_some()
    }

    pub fn frames_pushed(&self) -> u64 {
        self.lock().frames_pushed
    }

    fn finish(&self, message: LiveMessage) {
        let mut state = self.lock();
        if state.terminal.is_some() {
            return;
        }
        state.terminal = Some(message.clone());
        deliver(&mut state, message);
        state.subscriber = None;
        self.bound.notify_all();
    }
}

/// Delivers to the bound subscriber, dropping it once it is closed.
fn deliver(state: &mut ChannelState, message: LiveMessage) -> bool {
    let Some(subscriber) = state.subscriber.as_mut() else {
        return false;
    };
    if !subscriber.is_open() {
        state.subscriber = None;
        return false;
    }
    match subscriber.send(message) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{}", PipelineError::Delivery(e.to_string()));
            if !subscriber.is_open() {
                state.subscriber = None;
            }
            false
        }
    }
}
