// Rust guideline compliant 2026-10-17

//! Bounded in-process transaction queue shared by the producer and the
//! detection loop.
//!
//! An empty queue cooperatively yields rather than signaling `Closed`.
//! Explicit `close()` signals end-of-data to readers. Designed for
//! `tokio::join!` on a `current_thread` runtime.

use std::cell::RefCell;
use std::collections::VecDeque;

use domain::{QueueError, Transaction, TransactionSink, TransactionSource};

#[derive(Debug)]
struct QueueState {
    pending: VecDeque<Transaction>,
    closed: bool,
}

/// `TransactionSink` and `TransactionSource` adapter over a FIFO queue.
///
/// Shares a single `RefCell` across both trait impls. Borrows are always
/// released before the yield point inside `read_batch`, so polling the
/// reader and writer from one `tokio::join!` never panics.
#[derive(Debug)]
pub struct ConcurrentQueue {
    state: RefCell<QueueState>,
    capacity: usize,
}

impl ConcurrentQueue {
    /// Create an empty, open queue holding at most `capacity` transactions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RefCell::new(QueueState { pending: VecDeque::new(), closed: false }),
            capacity,
        }
    }

    /// Signal end-of-data. Idempotent.
    pub fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.state.borrow().pending.len()
    }
}

impl TransactionSink for ConcurrentQueue {
    /// Append `batch` if the queue is open and has room for all of it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] after `close()`, and
    /// [`QueueError::Full`] when the batch would exceed the capacity. A
    /// rejected batch is not partially written.
    async fn write_batch(&self, batch: Vec<Transaction>) -> Result<(), QueueError> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if state.pending.len() + batch.len() > self.capacity {
            return Err(QueueError::Full { capacity: self.capacity });
        }
        state.pending.extend(batch);
        Ok(())
    }
}

impl TransactionSource for ConcurrentQueue {
    /// Take up to `max` transactions from the front; yield and retry while
    /// the queue is empty and open.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue is closed and drained.
    async fn read_batch(&self, max: usize) -> Result<Vec<Transaction>, QueueError> {
        loop {
            let taken = {
                let mut state = self.state.borrow_mut();
                if !state.pending.is_empty() {
                    let count = max.min(state.pending.len());
                    Some(Ok(state.pending.drain(..count).collect()))
                } else if state.closed {
                    Some(Err(QueueError::Closed))
                } else {
                    None
                }
            };

            match taken {
                Some(result) => return result,
                None => tokio::task::yield_now().await,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
