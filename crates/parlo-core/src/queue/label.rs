//! Bounded FIFO of pending labels.

use crate::label::Label;
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// Bounded label queue between the front-end and the controller.
///
/// Pushing never blocks: a full queue rejects the label. Popping waits at most
/// the poll timeout, so a tick on an empty queue stays bounded.
pub struct LabelQueue {
    sender: LabelSender,
    receiver: Receiver<Label>,
    poll_timeout: Duration,
}

impl LabelQueue {
    pub fn new(capacity: usize, poll_timeout: Duration) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            sender: LabelSender { tx },
            receiver: rx,
            poll_timeout,
        }
    }

    /// Append a label, or drop it if the queue is full.
    pub fn push(&self, label: Label) -> Result<()> {
        self.sender.push(label)
    }

    /// Oldest label, waiting at most the poll timeout.
    pub fn pop(&self) -> Option<Label> {
        match self.receiver.recv_timeout(self.poll_timeout) {
            Ok(label) => Some(label),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Oldest label, without waiting.
    pub fn try_pop(&self) -> Option<Label> {
        self.receiver.try_recv().ok()
    }

    /// A producer handle for another thread.
    pub fn sender(&self) -> LabelSender {
        self.sender.clone()
    }

    /// Remove every pending label. Returns how many were dropped.
    pub fn drain(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.receiver.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.receiver.capacity().unwrap_or(usize::MAX)
    }
}

/// Cloneable producer side of a [`LabelQueue`].
#[derive(Clone)]
pub struct LabelSender {
    tx: Sender<Label>,
}

impl LabelSender {
    /// Append a label, or drop it if the queue is full.
    pub fn push(&self, label: Label) -> Result<()> {
        match self.tx.try_send(label) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(label)) => {
                tracing::warn!("Label queue is full, dropping {}", label.query());
                Err(Error::LabelQueueFull {
                    query: label.query().to_string(),
                })
            }
            Err(TrySendError::Disconnected(label)) => Err(Error::LabelQueueClosed {
                query: label.query().to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }
}
