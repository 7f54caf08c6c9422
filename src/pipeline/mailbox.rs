use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::types::Frame;

/// Bounded hand-over between threads where the newest entry always wins.
///
/// Publishing into a full mailbox evicts the oldest entry, so a reader only
/// ever falls behind by `capacity` items and nothing queues behind a slow
/// consumer.
#[derive(Debug)]
pub struct Mailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

/// Single-slot hand-over of the most recent camera frame.
pub type FrameMailbox = Mailbox<Frame>;

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Returns `true` when an older entry had to be evicted.
    pub fn publish(&self, item: T) -> bool {
        let mut item = item;
        let mut evicted = false;
        loop {
            match self.tx.try_send(item) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return evicted,
                Err(TrySendError::Full(rejected)) => {
                    evicted |= self.rx.try_recv().is_ok();
                    item = rejected;
                }
            }
        }
    }

    pub fn take_oldest(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn take_latest(&self) -> Option<T> {
        let mut latest = self.rx.try_recv().ok()?;
        while let Ok(newer) = self.rx.try_recv() {
            latest = newer;
        }
        Some(latest)
    }
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
