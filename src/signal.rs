// Copyright 2026 Jay Convertino
// released under MIT License
// author: Jay Convertino

use baa::{BitVecOps, BitVecValue};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

/// A single bus signal, shared between the drivers and the simulation
/// harness. Writes come in two flavours:
/// - `set`/`set_u64` schedule a value that becomes visible at the next
///   `settle()` call (one settle per clock edge, performed by the harness).
/// - `set_now`/`set_now_u64` write through immediately. Drivers use this
///   only for the disable/clear paths, where the deassertion must be
///   observable without waiting for the clock.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    name: String,
    width: u32,
    state: Mutex<SignalState>,
}

struct SignalState {
    value: BitVecValue,
    scheduled: Option<BitVecValue>,
}

impl Signal {
    pub fn new(name: impl Into<String>, width: u32) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                name: name.into(),
                width,
                state: Mutex::new(SignalState {
                    value: BitVecValue::zero(width),
                    scheduled: None,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    /// Current settled value of the signal.
    pub fn value(&self) -> BitVecValue {
        self.lock().value.clone()
    }

    /// True if the current settled value is nonzero.
    pub fn is_set(&self) -> bool {
        !self.lock().value.is_zero()
    }

    /// Schedule a new value, visible after the next `settle`.
    pub fn set(&self, value: &BitVecValue) {
        self.lock().scheduled = Some(value.clone());
    }

    pub fn set_u64(&self, value: u64) {
        self.set(&BitVecValue::from_u64(self.mask(value), self.inner.width));
    }

    /// Write through immediately, discarding any scheduled value.
    pub fn set_now(&self, value: &BitVecValue) {
        let mut state = self.lock();
        state.value = value.clone();
        state.scheduled = None;
    }

    pub fn set_now_u64(&self, value: u64) {
        self.set_now(&BitVecValue::from_u64(self.mask(value), self.inner.width));
    }

    /// Promote the scheduled value, if any. Called by the harness once per
    /// clock edge after all drivers have stepped.
    pub fn settle(&self) {
        let mut state = self.lock();
        if let Some(value) = state.scheduled.take() {
            state.value = value;
        }
    }

    fn mask(&self, value: u64) -> u64 {
        if self.inner.width >= 64 {
            value
        } else {
            value & ((1u64 << self.inner.width) - 1)
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SignalState> {
        // a poisoned signal mutex means a driver thread panicked mid-step;
        // there is no recovery from that
        self.inner.state.lock().unwrap()
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signal({}[{}] = {})",
            self.inner.name,
            self.inner.width,
            self.value().to_dec_str()
        )
    }
}

/// A named bundle of signals forming one bus interface. Drivers look
/// signals up by their logical name (`en`, `data`, `full`, ...); mapping
/// physical DUT names onto logical ones is the harness's job when it
/// builds the group.
pub struct SignalGroup {
    name: String,
    signals: FxHashMap<String, Signal>,
}

impl SignalGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signals: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a signal and register it under its logical name.
    pub fn add_signal(&mut self, name: impl Into<String>, width: u32) -> Signal {
        let name = name.into();
        let signal = Signal::new(format!("{}_{}", self.name, name), width);
        self.signals.insert(name, signal.clone());
        signal
    }

    /// Register an existing signal (e.g. one shared with a DUT model).
    pub fn insert(&mut self, name: impl Into<String>, signal: Signal) {
        self.signals.insert(name.into(), signal);
    }

    pub fn get(&self, name: &str) -> Option<&Signal> {
        self.signals.get(name)
    }

    /// Settle every signal in the group.
    pub fn settle(&self) {
        for signal in self.signals.values() {
            signal.settle();
        }
    }
}

/// An optional handshake signal resolved once at bind time. An absent
/// signal behaves as if permanently asserted, so the per-cycle check
/// never special-cases absence.
#[derive(Clone)]
pub enum Handshake {
    Wire(Signal),
    AlwaysReady,
}

impl Handshake {
    pub fn is_satisfied(&self) -> bool {
        match self {
            Handshake::Wire(signal) => signal.is_set(),
            Handshake::AlwaysReady => true,
        }
    }
}
