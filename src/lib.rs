//! Half-duplex 3-wire SSC bus driver for TLE5012B magnetic angle sensors
//!
//! [`HalfDuplexBus`] runs the electrical transaction protocol on a single
//! data line; [`SensorBus`] scopes it to one of up to four sensors sharing
//! that line. Hardware is reached only through the [`DigitalPin`],
//! [`HalfDuplexPeripheral`] and [`CycleCounter`] traits.

#![no_std]
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

mod adapter;
mod bus;
mod error;
mod peripheral;
mod pin;
mod select;
mod timer;
mod transaction;

pub use adapter::SensorBus;
pub use bus::{BusConfiguration, BusPhase, DEFAULT_TIMEOUT_MS, HalfDuplexBus};
pub use error::Error;
pub use peripheral::{HalfDuplexPeripheral, LineDirection, PeripheralError};
pub use pin::{DigitalPin, HalPin, HalPinError, PinMode, Polarity};
pub use select::{ChipSelectBinding, InvalidSlaveNumber, MAX_SLAVES, SlaveNumber};
#[cfg(feature = "cortex-m")]
pub use timer::DwtCycleCounter;
pub use timer::{
    ClockError, CycleCounter, CycleDelay, GRACE_PERIOD_US, cycles_for_ns, cycles_for_us,
    grace_period_cycles,
};
pub use transaction::Transaction;
