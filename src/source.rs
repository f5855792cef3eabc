// Copyright 2026 Jay Convertino
// released under MIT License
// author: Jay Convertino

use log::{error, info};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use crate::clock::Clock;
use crate::driver::{optional_signal, require_signal, DriverCore};
use crate::errors::{BindError, DriverError, Result, TransactionError};
use crate::signal::{Handshake, Signal, SignalGroup};
use crate::transaction::{DriverStatus, Transaction};

/// Protocol state of the write-side driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    Write,
    Full,
    /// Terminal; no current transition enters it.
    #[allow(dead_code)]
    Error,
}

/// Drives a Xilinx-style FIFO write interface.
///
/// Required signals: `en`, `data`, `full`. Optional: `ack` (absent means
/// every handshake check passes). One state-machine step runs per rising
/// edge of the bound clock; see `step` for the transition rules.
pub struct FifoSource {
    core: DriverCore,
    en: Signal,
    data: Signal,
    full: Signal,
    ack: Handshake,
    state: SourceState,
}

/// Caller-side handle for submitting write transactions. Cloneable;
/// submissions from all clones land in one FIFO pending queue.
#[derive(Clone)]
pub struct SourceHandle {
    tx: Sender<Transaction>,
    status: Arc<DriverStatus>,
    bus: String,
    width: u32,
}

impl FifoSource {
    /// Bind to a write-side bus. Fails if a required signal is missing.
    /// Forces `en` and `data` to zero immediately, before any clock edge.
    pub fn new(
        bus: &SignalGroup,
        clock: &Clock,
        resetn: &Signal,
        fwft: bool,
    ) -> std::result::Result<(Self, SourceHandle), BindError> {
        let en = require_signal(bus, "en")?;
        let data = require_signal(bus, "data")?;
        let full = require_signal(bus, "full")?;
        let ack = optional_signal(bus, "ack");
        let (core, tx) = DriverCore::new(bus, clock, resetn, fwft);

        en.set_now_u64(0);
        data.set_now_u64(0);

        info!(
            "FIFO SOURCE bound to bus `{}` (fwft={}, ack={})",
            core.bus,
            fwft,
            matches!(ack, Handshake::Wire(_))
        );

        let handle = SourceHandle {
            tx,
            status: Arc::clone(&core.status),
            bus: core.bus.clone(),
            width: data.width(),
        };
        let driver = Self {
            core,
            en,
            data,
            full,
            ack,
            state: SourceState::Idle,
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
    ///
    /// Driving writes are scheduled (visible after the harness settles the
    /// bus); only the bus-release path writes through immediately.
    pub fn step(&mut self) {
        // reset is sampled every cycle; outputs drop, state is kept
        if self.core.in_reset() {
            self.en.set_u64(0);
            self.data.set_u64(0);
            self.core.notify();
            return;
        }

        match self.state {
            SourceState::Idle => {
                if !self.core.pending_empty() && (self.core.fwft || !self.full.is_set()) {
                    if let Some(trans) = self.core.pop_pending() {
                        info!("FIFO SOURCE {} STATE: {:?} BUS WRITE", self.core.bus, self.state);
                        self.drive(&trans);
                        self.core.status.set_active(true);
                        self.state = SourceState::Write;
                        self.core.notify();
                    }
                }
            }
            SourceState::Write => {
                if self.core.pending_empty() {
                    if self.ack.is_satisfied() {
                        info!(
                            "FIFO SOURCE {} STATE: {:?} BUS RELEASE",
                            self.core.bus, self.state
                        );
                        self.release();
                        self.core.notify();
                        self.state = SourceState::Idle;
                    }
                } else if !self.full.is_set() {
                    if self.ack.is_satisfied() {
                        if let Some(trans) = self.core.pop_pending() {
                            info!(
                                "FIFO SOURCE {} STATE: {:?} BUS WRITE",
                                self.core.bus, self.state
                            );
                            self.drive(&trans);
                            self.core.notify();
                        }
                    }
                } else {
                    info!("FIFO SOURCE {} STATE: {:?} BUS FULL", self.core.bus, self.state);
                    self.en.set_u64(1);
                    self.state = SourceState::Full;
                    self.core.notify();
                }
            }
            SourceState::Full => {
                if self.ack.is_satisfied() {
                    // `full` is deliberately not re-checked here (observed
                    // hardware-driver behaviour); the empty-queue pop is
                    // guarded so acking with nothing queued releases the bus
                    match self.core.pop_pending() {
                        Some(trans) => {
                            info!(
                                "FIFO SOURCE {} STATE: {:?} BUS NOT FULL",
                                self.core.bus, self.state
                            );
                            self.drive(&trans);
                            self.state = SourceState::Write;
                            self.core.notify();
                        }
                        None => {
                            info!(
                                "FIFO SOURCE {} STATE: {:?} BUS RELEASE",
                                self.core.bus, self.state
                            );
                            self.release();
                            self.core.notify();
                            self.state = SourceState::Idle;
                        }
                    }
                }
            }
            SourceState::Error => {}
        }
    }

    fn drive(&self, trans: &Transaction) {
        self.en.set_u64(1);
        self.data.set(&trans.data);
    }

    /// Deassert enable and data without waiting for the next settle.
    fn release(&self) {
        self.en.set_now_u64(0);
        self.data.set_now_u64(0);
        self.core.status.set_active(false);
    }

    #[cfg(test)]
    fn state(&self) -> SourceState {
        self.state
    }
}

impl SourceHandle {
    /// Queue a single value for writing. Returns once the transaction has
    /// been accepted into the pending queue, not once it is on the bus.
    pub fn write(&self, value: u64) -> Result<()> {
        self.write_trans(self.to_trans(value)?)
    }

    /// Queue a list of values, in order. The whole batch is validated
    /// before anything is enqueued, so a rejected value never leaves a
    /// partial batch behind.
    pub fn write_all(&self, values: &[u64]) -> Result<()> {
        let batch: Vec<Transaction> = values
            .iter()
            .map(|&v| self.to_trans(v))
            .collect::<Result<_>>()?;
        for trans in batch {
            self.write_trans(trans)?;
        }
        Ok(())
    }

    /// Queue a pre-built transaction.
    pub fn write_trans(&self, trans: Transaction) -> Result<()> {
        if trans.width() != self.width {
            let err = TransactionError::WidthMismatch {
                bus: self.bus.clone(),
                expected: self.width,
                actual: trans.width(),
            };
            error!("{}", err);
            return Err(err.into());
        }
        self.status.submitted();
        if self.tx.send(trans).is_err() {
            self.status.retracted();
            return Err(DriverError::Stopped(self.bus.clone()));
        }
        Ok(())
    }

    /// Block until every submitted write has been driven and the bus
    /// released. No internal timeout.
    pub fn wait_idle(&self) {
        self.status.wait_idle();
    }

    fn to_trans(&self, value: u64) -> Result<Transaction> {
        if self.width < 64 && value >= 1u64 << self.width {
            let err = TransactionError::ValueTooWide {
                bus: self.bus.clone(),
                value,
                width: self.width,
            };
            error!("{}", err);
            return Err(err.into());
        }
        Ok(Transaction::from_u64(value, self.width))
    }
}
