// Copyright 2026 Jay Convertino
// released under MIT License
// author: Jay Convertino

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

/// Rising-edge notification source. The simulation harness owns the clock
/// and calls `rising_edge` once per period; each subscribed driver runs one
/// state-machine step per call.
///
/// Delivery is a rendezvous: `rising_edge` returns only after every
/// listener has completed its step, so the harness observes the drivers'
/// settled outputs in strict cycle order. Subscribers whose listener was
/// dropped are silently unsubscribed.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

struct ClockInner {
    name: String,
    taps: Mutex<Vec<EdgeTap>>,
}

struct EdgeTap {
    edge: SyncSender<()>,
    done: Receiver<()>,
}

/// The subscriber half of a clock-edge subscription. A driver loop blocks
/// in `wait`, steps, then calls `complete` to let the clock advance.
pub struct EdgeListener {
    edge: Receiver<()>,
    done: SyncSender<()>,
}

impl Clock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                name: name.into(),
                taps: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn subscribe(&self) -> EdgeListener {
        let (edge_tx, edge_rx) = sync_channel(0);
        let (done_tx, done_rx) = sync_channel(0);
        let mut taps = self.inner.taps.lock().unwrap();
        taps.push(EdgeTap {
            edge: edge_tx,
            done: done_rx,
        });
        EdgeListener {
            edge: edge_rx,
            done: done_tx,
        }
    }

    /// Deliver one rising edge to every subscriber, in subscription order,
    /// waiting for each to finish its step.
    pub fn rising_edge(&self) {
        let mut taps = self.inner.taps.lock().unwrap();
        taps.retain(|tap| tap.edge.send(()).is_ok() && tap.done.recv().is_ok());
    }
}

impl EdgeListener {
    /// Block until the next rising edge. Returns false once the clock has
    /// been dropped, which ends the driver loop.
    pub fn wait(&self) -> bool {
        self.edge.recv().is_ok()
    }

    /// Report that this cycle's step is finished.
    pub fn complete(&self) -> bool {
        self.done.send(()).is_ok()
    }
}
