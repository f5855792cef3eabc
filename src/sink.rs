// Copyright 2026 Jay Convertino
// released under MIT License
// author: Jay Convertino

use baa::BitVecValue;
use log::info;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crate::clock::Clock;
use crate::driver::{optional_signal, require_signal, DriverCore};
use crate::errors::{BindError, DriverError, Result};
use crate::signal::{Handshake, Signal, SignalGroup};
use crate::transaction::{DriverStatus, Transaction};

/// Protocol state of the read-side driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Idle,
    Read,
    /// Terminal; no current transition enters it.
    #[allow(dead_code)]
    Error,
}

/// Drives a Xilinx-style FIFO read interface and captures presented data.
///
/// Required signals: `en`, `data`, `empty`. Optional: `valid` (absent
/// means every capture check passes). Captured data is whatever the
/// device under test presents on `data` at the clock edge, not anything
/// this driver wrote.
pub struct FifoSink {
    core: DriverCore,
    en: Signal,
    data: Signal,
    empty: Signal,
    valid: Handshake,
    state: SinkState,
    completed: Sender<Transaction>,
}

/// Caller-side handle for issuing read requests and collecting results.
pub struct SinkHandle {
    tx: Sender<Transaction>,
    completed: Receiver<Transaction>,
    status: Arc<DriverStatus>,
    bus: String,
    width: u32,
}

impl FifoSink {
    /// Bind to a read-side bus. Fails if a required signal is missing.
    /// Forces `en` to zero immediately, before any clock edge.
    pub fn new(
        bus: &SignalGroup,
        clock: &Clock,
        resetn: &Signal,
        fwft: bool,
    ) -> std::result::Result<(Self, SinkHandle), BindError> {
        let en = require_signal(bus, "en")?;
        let data = require_signal(bus, "data")?;
        let empty = require_signal(bus, "empty")?;
        let valid = optional_signal(bus, "valid");
        let (core, tx) = DriverCore::new(bus, clock, resetn, fwft);

        en.set_now_u64(0);

        info!(
            "FIFO SINK bound to bus `{}` (fwft={}, valid={})",
            core.bus,
            fwft,
            matches!(valid, Handshake::Wire(_))
        );

        let (completed_tx, completed_rx) = channel();
        let handle = SinkHandle {
            tx,
            completed: completed_rx,
            status: Arc::clone(&core.status),
            bus: core.bus.clone(),
            width: data.width(),
        };
        let driver = Self {
            core,
            en,
            data,
            empty,
            valid,
            state: SinkState::Idle,
            completed: completed_tx,
        };
        Ok((driver, handle))
    }

    /// Run the driver as its own task: one `step` per rising edge of the
    /// bound clock, for the lifetime of the clock.
    pub fn spawn(mut self) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while self.core.edges.wait() {
                self.step();
                if !self.core.edges.complete() {
                    break;
                }
            }
        })
    }

    /// One state-machine step, to be called at a rising clock edge.
    pub fn step(&mut self) {
        // reset is sampled every cycle; enable drops, state is kept
        if self.core.in_reset() {
            self.en.set_u64(0);
            self.core.notify();
            return;
        }

        match self.state {
            SinkState::Idle => {
                if !self.core.pending_empty() && self.core.fwft && !self.empty.is_set() {
                    if let Some(trans) = self.core.pop_pending() {
                        info!("FIFO SINK {} STATE: {:?} BUS READ", self.core.bus, self.state);
                        self.en.set_u64(1);
                        // first word falls through: the sample at this edge
                        // is already the requested word
                        if self.valid.is_satisfied() && self.core.fwft {
                            self.capture(trans);
                        }
                        self.core.status.set_active(true);
                        self.state = SinkState::Read;
                    }
                } else {
                    self.core.notify();
                }
            }
            SinkState::Read => {
                if self.core.pending_empty() {
                    info!(
                        "FIFO SINK {} STATE: {:?} BUS RELEASE",
                        self.core.bus, self.state
                    );
                    self.en.set_u64(0);
                    self.core.status.set_active(false);
                    self.core.notify();
                    self.state = SinkState::Idle;
                } else if self.valid.is_satisfied() {
                    if let Some(trans) = self.core.pop_pending() {
                        info!("FIFO SINK {} STATE: {:?} BUS READ", self.core.bus, self.state);
                        self.en.set_u64(1);
                        self.capture(trans);
                        self.core.notify();
                    }
                }
            }
            SinkState::Error => {}
        }
    }

    /// Overwrite the request with the bus sample and complete it.
    fn capture(&self, mut trans: Transaction) {
        trans.data = self.data.value();
        // a dropped handle just means nobody is waiting for results
        let _ = self.completed.send(trans);
    }

    #[cfg(test)]
    fn state(&self) -> SinkState {
        self.state
    }
}

impl SinkHandle {
    /// Request one read and block until the captured value arrives.
    pub fn read(&mut self) -> Result<BitVecValue> {
        self.request(1)?;
        self.collect()
    }

    /// Request `count` reads and block until all captured values arrive,
    /// in capture order.
    pub fn read_all(&mut self, count: usize) -> Result<Vec<BitVecValue>> {
        self.request(count)?;
        (0..count).map(|_| self.collect()).collect()
    }

    /// Queue read requests without waiting for completion.
    pub fn request(&self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.status.submitted();
            if self.tx.send(Transaction::placeholder(self.width)).is_err() {
                self.status.retracted();
                return Err(DriverError::Stopped(self.bus.clone()));
            }
        }
        Ok(())
    }

    /// Block until every outstanding request has been popped and the bus
    /// released. No internal timeout.
    pub fn wait_idle(&self) {
        self.status.wait_idle();
    }

    fn collect(&mut self) -> Result<BitVecValue> {
        self.completed
            .recv()
            .map(|trans| trans.data)
            .map_err(|_| DriverError::Stopped(self.bus.clone()))
    }
}
