// Copyright 2026 Jay Convertino
// released under MIT License
// author: Jay Convertino

use thiserror::Error;

/// Errors raised while binding a driver to a bus signal group.
/// These are fatal: construction of the driver fails immediately.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    #[error("bus `{bus}` is missing required signal `{signal}`")]
    MissingSignal { bus: String, signal: String },
}

/// Per-transaction submission errors. A rejected transaction is reported
/// to the caller and never enters the pending queue; previously queued
/// transactions are unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    /// The submitted value does not fit the bound `data` signal.
    #[error("value {value:#x} does not fit the {width}-bit data signal of bus `{bus}`")]
    ValueTooWide { bus: String, value: u64, width: u32 },
    /// A pre-built transaction was sized for a different bus.
    #[error("transaction is {actual} bits wide, bus `{bus}` expects {expected}")]
    WidthMismatch {
        bus: String,
        expected: u32,
        actual: u32,
    },
}

/// Errors visible to callers of the `write`/`read` APIs.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The driver loop is gone: its clock was dropped or the thread ended
    /// while a caller was submitting or awaiting completion.
    #[error("driver for bus `{0}` is no longer running")]
    Stopped(String),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

pub type Result<T> = std::result::Result<T, DriverError>;
