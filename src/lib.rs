// Copyright 2026 Jay Convertino
// released under MIT License
// author: Jay Convertino

//! Bus drivers for Xilinx-style FIFO write/read interfaces, for use in
//! hardware verification test benches.
//!
//! A [`source::FifoSource`] drives the write side (`en`, `data`, honouring
//! `full` and an optional `ack`); a [`sink::FifoSink`] drives the read side
//! (`en`, honouring `empty` and an optional `valid`) and captures the data
//! the device under test presents. Each driver runs one state-machine step
//! per rising edge of its bound [`clock::Clock`]; the simulation harness
//! ticks the clocks, settles the [`signal::SignalGroup`]s and evaluates the
//! device under test in between.

pub mod clock;
mod driver;
pub mod errors;
pub mod signal;
pub mod sink;
pub mod source;
pub mod transaction;
