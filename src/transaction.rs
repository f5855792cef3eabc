// Copyright 2026 Jay Convertino
// released under MIT License
// author: Jay Convertino

use baa::{BitVecOps, BitVecValue};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Condvar, Mutex};

/// One unit of transfer data. Sink-side read requests use `placeholder`;
/// the driver overwrites the data with the value captured from the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub data: BitVecValue,
}

impl Transaction {
    pub fn new(data: BitVecValue) -> Self {
        Self { data }
    }

    pub fn from_u64(value: u64, width: u32) -> Self {
        Self {
            data: BitVecValue::from_u64(value, width),
        }
    }

    /// A read request: the value is unused, only queue order matters.
    pub fn placeholder(width: u32) -> Self {
        Self {
            data: BitVecValue::zero(width),
        }
    }

    pub fn width(&self) -> u32 {
        self.data.width()
    }
}

/// Driver-side end of the pending-request queue. Submissions arrive over
/// an mpsc channel from any number of caller threads; the driver drains
/// the channel into a local buffer at each step so emptiness checks and
/// pops stay separate operations.
pub(crate) struct PendingFeed {
    rx: Receiver<Transaction>,
    buf: VecDeque<Transaction>,
}

impl PendingFeed {
    pub fn channel() -> (Sender<Transaction>, Self) {
        let (tx, rx) = channel();
        (
            tx,
            Self {
                rx,
                buf: VecDeque::new(),
            },
        )
    }

    pub fn is_empty(&mut self) -> bool {
        self.refill();
        self.buf.is_empty()
    }

    pub fn pop(&mut self) -> Option<Transaction> {
        self.refill();
        self.buf.pop_front()
    }

    fn refill(&mut self) {
        while let Ok(trans) = self.rx.try_recv() {
            self.buf.push_back(trans);
        }
    }
}

/// Progress and idle tracking shared between a driver and its callers.
///
/// `outstanding` counts transactions submitted but not yet popped by the
/// driver; `active` is true while the driver is mid-transfer. The driver
/// bumps the progress generation each time its state machine advances,
/// waking any caller blocked in `wait_idle`.
pub(crate) struct DriverStatus {
    outstanding: AtomicUsize,
    active: AtomicBool,
    progress: Mutex<u64>,
    advanced: Condvar,
}

impl DriverStatus {
    pub fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            progress: Mutex::new(0),
            advanced: Condvar::new(),
        }
    }

    /// Caller side: a transaction was handed to the pending queue.
    pub fn submitted(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Caller side: undo `submitted` after a failed enqueue.
    pub fn retracted(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    /// Driver side: a transaction was popped from the pending queue.
    pub fn accepted(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) == 0 && !self.is_active()
    }

    /// Driver side: the state machine advanced one step.
    pub fn step_notify(&self) {
        let mut generation = self.progress.lock().unwrap();
        *generation += 1;
        self.advanced.notify_all();
    }

    /// Block until the driver has popped everything submitted and released
    /// the bus. Blocks indefinitely if the driver never progresses; callers
    /// needing a timeout must impose their own.
    pub fn wait_idle(&self) {
        let mut generation = self.progress.lock().unwrap();
        loop {
            if self.is_idle() {
                return;
            }
            generation = self.advanced.wait(generation).unwrap();
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn pending_feed_preserves_submission_order() {
        let (tx, mut feed) = PendingFeed::channel();
        assert!(feed.is_empty());
        for v in 0..4u64 {
            tx.send(Transaction::from_u64(v, 8)).unwrap();
        }
        for v in 0..4u64 {
            assert_eq!(feed.pop().unwrap().data.to_u64().unwrap(), v);
        }
        assert!(feed.is_empty());
        assert!(feed.pop().is_none());
    }

    #[test]
    fn status_idle_tracking() {
        let status = DriverStatus::new();
        assert!(status.is_idle());
        status.submitted();
        assert!(!status.is_idle());
        status.accepted();
        status.set_active(true);
        assert!(!status.is_idle());
        status.set_active(false);
        assert!(status.is_idle());
    }

    #[test]
    fn wait_idle_wakes_on_progress() {
        let status = std::sync::Arc::new(DriverStatus::new());
        status.submitted();
        status.set_active(true);
        let waiter = std::sync::Arc::clone(&status);
        let handle = std::thread::spawn(move || waiter.wait_idle());
        status.accepted();
        status.set_active(false);
        status.step_notify();
        handle.join().unwrap();
    }
}
