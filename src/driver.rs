// Copyright 2026 Jay Convertino
// released under MIT License
// author: Jay Convertino

use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::clock::{Clock, EdgeListener};
use crate::errors::BindError;
use crate::signal::{Handshake, Signal, SignalGroup};
use crate::transaction::{DriverStatus, PendingFeed, Transaction};

/// State shared by the source and sink drivers: bus identity, reset
/// wiring, FWFT mode, the clock-edge subscription, the pending-request
/// feed and the caller-visible status.
pub(crate) struct DriverCore {
    pub bus: String,
    pub resetn: Signal,
    pub fwft: bool,
    pub edges: EdgeListener,
    pub status: Arc<DriverStatus>,
    pub pending: PendingFeed,
}

impl DriverCore {
    pub fn new(
        bus: &SignalGroup,
        clock: &Clock,
        resetn: &Signal,
        fwft: bool,
    ) -> (Self, Sender<Transaction>) {
        let (tx, pending) = PendingFeed::channel();
        let core = Self {
            bus: bus.name().to_string(),
            resetn: resetn.clone(),
            fwft,
            edges: clock.subscribe(),
            status: Arc::new(DriverStatus::new()),
            pending,
        };
        (core, tx)
    }

    /// Reset follows the `resetn` convention: logic-low means active.
    /// Sampled every cycle, never edge-triggered.
    pub fn in_reset(&self) -> bool {
        !self.resetn.is_set()
    }

    pub fn pending_empty(&mut self) -> bool {
        self.pending.is_empty()
    }

    /// Pop the next pending transaction and account for it.
    pub fn pop_pending(&mut self) -> Option<Transaction> {
        let trans = self.pending.pop();
        if trans.is_some() {
            self.status.accepted();
        }
        trans
    }

    pub fn notify(&self) {
        self.status.step_notify();
    }
}

/// Look up a required signal; absence fails the driver's construction.
pub(crate) fn require_signal(bus: &SignalGroup, name: &str) -> Result<Signal, BindError> {
    bus.get(name).cloned().ok_or_else(|| BindError::MissingSignal {
        bus: bus.name().to_string(),
        signal: name.to_string(),
    })
}

/// Resolve an optional handshake signal. Absent signals collapse to
/// `AlwaysReady` once, here, so the per-cycle checks stay uniform.
pub(crate) fn optional_signal(bus: &SignalGroup, name: &str) -> Handshake {
    match bus.get(name) {
        Some(signal) => Handshake::Wire(signal.clone()),
        None => Handshake::AlwaysReady,
    }
}
