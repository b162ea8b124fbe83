// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The hand-off channel between producers and the handler
//!
//! A bounded multi-producer FIFO. The range scanner and the live poller push
//! raw entries; the single handler task drains them. A full queue makes
//! producers wait, so a slow handler throttles the scanner instead of growing
//! memory without bound.
//!
//! No order is imposed across producers: scanner and poller entries
//! interleave arbitrarily.

use std::sync::Arc;

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex, OwnedMutexGuard,
};
use tokio_util::sync::CancellationToken;

use crate::types::log::RawLogEntry;

/// Bounded queue of raw log entries.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<RawLogEntry>,
    rx: Arc<Mutex<mpsc::Receiver<RawLogEntry>>>,
}

/// Why a push did not enqueue the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRejected {
    /// The producer was cancelled while waiting for room
    Cancelled,
    /// The queue is full (non-blocking push only)
    Full,
}

impl EventQueue {
    /// A queue holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Entries waiting to be handled.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether no entry is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of waiting entries.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Enqueue `entry`, waiting for room unless `cancel` fires first.
    pub async fn push(
        &self,
        entry: RawLogEntry,
        cancel: &CancellationToken,
    ) -> Result<(), PushRejected> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PushRejected::Cancelled),
            sent = self.tx.send(entry) => {
                // The receiver lives in `self`, so the channel cannot close
                sent.map_err(|_| PushRejected::Cancelled)
            }
        }
    }

    /// Enqueue `entry` if there is room.
    pub fn try_push(&self, entry: RawLogEntry) -> Result<(), PushRejected> {
        self.tx.try_send(entry).map_err(|e| match e {
            TrySendError::Full(_) => PushRejected::Full,
            TrySendError::Closed(_) => PushRejected::Cancelled,
        })
    }

    /// Exclusive access to the consuming end.
    ///
    /// Only one consumer runs at a time; a second caller waits until the first
    /// guard is dropped.
    pub async fn consumer(&self) -> QueueConsumer {
        QueueConsumer {
            rx: self.rx.clone().lock_owned().await,
        }
    }
}

/// The consuming end of an [`EventQueue`], held by the running handler.
#[derive(Debug)]
pub struct QueueConsumer {
    rx: OwnedMutexGuard<mpsc::Receiver<RawLogEntry>>,
}

impl QueueConsumer {
    /// Next entry, waiting until one arrives.
    pub async fn recv(&mut self) -> Option<RawLogEntry> {
        self.rx.recv().await
    }

    /// Next entry if one is waiting.
    pub fn try_recv(&mut self) -> Option<RawLogEntry> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, B256};
    use std::time::Duration;

    fn entry(log_index: u64) -> RawLogEntry {
        RawLogEntry {
            address: Address::ZERO,
            topics: vec![],
            data: Bytes::new(),
            block_number: 1,
            log_index,
            transaction_hash: B256::ZERO,
            transaction_index: 0,
            block_hash: B256::ZERO,
        }
    }

    #[tokio::test]
    async fn test_fifo_and_size() {
        let queue = EventQueue::new(8);
        let cancel = CancellationToken::new();

        queue.push(entry(0), &cancel).await.unwrap();
        queue.push(entry(1), &cancel).await.unwrap();
        assert_eq!(queue.len(), 2);

        let mut consumer = queue.consumer().await;
        assert_eq!(consumer.recv().await.unwrap().log_index, 0);
        assert_eq!(consumer.try_recv().unwrap().log_index, 1);
        assert!(consumer.try_recv().is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_blocks_until_cancelled() {
        let queue = EventQueue::new(1);
        let cancel = CancellationToken::new();
        queue.push(entry(0), &cancel).await.unwrap();

        assert_eq!(queue.try_push(entry(1)), Err(PushRejected::Full));

        let blocked = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.push(entry(1), &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        cancel.cancel();
        assert_eq!(blocked.await.unwrap(), Err(PushRejected::Cancelled));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_resumes_when_drained() {
        let queue = EventQueue::new(1);
        let cancel = CancellationToken::new();
        queue.push(entry(0), &cancel).await.unwrap();

        let pusher = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.push(entry(1), &cancel).await })
        };

        let mut consumer = queue.consumer().await;
        assert_eq!(consumer.recv().await.unwrap().log_index, 0);
        pusher.await.unwrap().unwrap();
        assert_eq!(consumer.recv().await.unwrap().log_index, 1);
    }
}
