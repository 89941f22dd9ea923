// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A bounded, strictly-serial FIFO of async work items.
//!
//! Each [`SerialQueue`] owns one background task that pulls items off an
//! internal channel and runs them one at a time: the next item only starts
//! once the previous one's result has been delivered to its own caller. A
//! panic or error inside one item is isolated to that item's caller and
//! never halts the queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

type BoxedWork = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// `maxDepth` was exceeded and `dropOldestOnOverflow` is `false`.
    QueueFull,
}

/// Configuration for one [`SerialQueue`].
#[derive(Debug, Clone)]
pub struct SerialQueueConfig {
    pub max_depth: usize,
    pub drop_oldest_on_overflow: bool,
}

struct Item {
    work: BoxedWork,
    // Present only for items that can be dropped on overflow; the running
    // item is removed from `pending` before it starts, so this is only
    // ever taken from a queued-but-not-running item.
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

enum Command {
    Push(Item),
    Clear,
}

/// Bounded FIFO of callable work items with at-most-one-in-flight
/// execution, overflow handling, and a size counter for `Size()`.
pub struct SerialQueue {
    tx: mpsc::UnboundedSender<Command>,
    depth: Arc<AtomicUsize>,
    config: SerialQueueConfig,
}

impl SerialQueue {
    pub fn new(config: SerialQueueConfig, on_overflow: impl Fn(usize) + Send + Sync + 'static) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let depth = Arc::new(AtomicUsize::new(0));
        let worker_depth = Arc::clone(&depth);
        let max_depth = config.max_depth;
        let drop_oldest = config.drop_oldest_on_overflow;
        let on_overflow = Arc::new(on_overflow);

        tokio::spawn(async move {
            let mut pending: std::collections::VecDeque<Item> = std::collections::VecDeque::new();
            loop {
                // Drain any buffered commands without blocking so overflow
                // accounting stays correct even while an item is running.
                while let Ok(cmd) = rx.try_recv() {
                    apply_command(&mut pending, cmd, max_depth, drop_oldest, &on_overflow, &worker_depth);
                }
                let next = pending.pop_front();
                match next {
                    Some(item) => {
                        worker_depth.fetch_sub(1, Ordering::SeqCst);
                        if let Some(drop_cb) = item.on_drop {
                            // This item survived to execution; its on_drop
                            // hook is only for overflow eviction, not for
                            // normal completion, so it is simply discarded.
                            drop(drop_cb);
                        }
                        // Run in its own task so a panic inside `work`
                        // unwinds only that task (surfaced as a `JoinError`
                        // to whatever `oneshot` it was supposed to close
                        // over) rather than taking down this worker loop.
                        let handle = tokio::spawn(item.work);
                        let _ = handle.await;
                    }
                    None => match rx.recv().await {
                        Some(cmd) => apply_command(&mut pending, cmd, max_depth, drop_oldest, &on_overflow, &worker_depth),
                        None => break,
                    },
                }
            }
        });

        Self { tx, depth, config }
    }

    /// Enqueue `work`. `work` must report its own result to its caller
    /// (e.g. via a `oneshot` channel it closes over) since the queue itself
    /// is result-agnostic.
    pub fn enqueue<F>(&self, work: F) -> Result<(), EnqueueError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let current = self.depth.load(Ordering::SeqCst);
        if current >= self.config.max_depth && !self.config.drop_oldest_on_overflow {
            return Err(EnqueueError::QueueFull);
        }
        self.depth.fetch_add(1, Ordering::SeqCst);
        let item = Item { work: Box::pin(work), on_drop: None };
        let _ = self.tx.send(Command::Push(item));
        Ok(())
    }

    /// Discard all queued (not in-flight) items without running them.
    pub fn clear(&self) {
        let _ = self.tx.send(Command::Clear);
    }

    /// Current queue depth, excluding any in-flight item.
    pub fn size(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

fn apply_command(
    pending: &mut std::collections::VecDeque<Item>,
    cmd: Command,
    max_depth: usize,
    drop_oldest: bool,
    on_overflow: &Arc<dyn Fn(usize) + Send + Sync>,
    depth: &Arc<AtomicUsize>,
) {
    match cmd {
        Command::Push(item) => {
            if pending.len() >= max_depth && drop_oldest {
                if pending.pop_front().is_some() {
                    depth.fetch_sub(1, Ordering::SeqCst);
                    on_overflow(1);
                }
            }
            pending.push_back(item);
        }
        Command::Clear => {
            let dropped = pending.len();
            pending.clear();
            if dropped > 0 {
                depth.fetch_sub(dropped, Ordering::SeqCst);
            }
        }
    }
}

/// Run `work`, sending its result through a fresh oneshot channel whose
/// receiver is returned alongside the future to enqueue. Convenience for
/// callers that want a result back from a [`SerialQueue`] item.
pub fn with_result<T, F>(work: F) -> (impl Future<Output = ()>, oneshot::Receiver<T>)
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let fut = async move {
        let result = work.await;
        let _ = tx.send(result);
    };
    (fut, rx)
}

#[cfg(test)]
#[path = "serial_queue_tests.rs"]
mod tests;
