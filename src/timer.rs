//! Cycle counter capability and the busy-wait delay built on it

use embedded_hal::delay::DelayNs;

/// Command-to-response turnaround the sensor needs, in microseconds
pub const GRACE_PERIOD_US: u32 = 5;

/// Longest span waited in one pass, so wrapping subtraction stays unambiguous
const MAX_CHUNK_CYCLES: u64 = (u32::MAX / 2) as u64;

/// Error starting a [`CycleCounter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// The core has no usable cycle counter
    Unavailable,
    /// The counter was enabled but reads back as stopped
    NotRunning,
}

/// Free-running hardware cycle counter
pub trait CycleCounter {
    /// Start (or restart) the counter
    ///
    /// # Errors
    ///
    /// Returns an error if the counter cannot be started
    fn start(&mut self) -> Result<(), ClockError>;

    /// Current frequency the counter runs at
    fn clock_hz(&self) -> u32;

    /// Current counter value, wrapping at `u32::MAX`
    fn ticks(&self) -> u32;
}

/// Cycles needed to cover `us` microseconds at `clock_hz`, rounded up
#[must_use]
pub const fn cycles_for_us(clock_hz: u32, us: u32) -> u64 {
    cycles_for_ns(clock_hz, us as u64 * 1_000)
}

/// Cycles needed to cover `ns` nanoseconds at `clock_hz`, rounded up
#[must_use]
pub const fn cycles_for_ns(clock_hz: u32, ns: u64) -> u64 {
    let product = clock_hz as u128 * ns as u128;
    #[allow(clippy::cast_possible_truncation)]
    let cycles = product.div_ceil(1_000_000_000) as u64;
    cycles
}

/// Cycle threshold for [`GRACE_PERIOD_US`] at `clock_hz`
#[must_use]
pub const fn grace_period_cycles(clock_hz: u32) -> u64 {
    cycles_for_us(clock_hz, GRACE_PERIOD_US)
}

/// Blocking delay that spins on a [`CycleCounter`]
///
/// The clock frequency is sampled on every call.
#[derive(Debug)]
pub struct CycleDelay<'a, T> {
    counter: &'a T,
}

impl<'a, T> CycleDelay<'a, T>
where
    T: CycleCounter,
{
    /// Delay driven by `counter`, which must already be started
    pub fn new(counter: &'a T) -> Self {
        Self { counter }
    }

    /// Spin until at least `cycles` counter ticks have elapsed
    pub fn spin(&mut self, cycles: u64) {
        let mut remaining = cycles;
        while remaining > 0 {
            let chunk = remaining.min(MAX_CHUNK_CYCLES);
            #[allow(clippy::cast_possible_truncation)]
            let threshold = chunk as u32;
            let start = self.counter.ticks();
            while self.counter.ticks().wrapping_sub(start) < threshold {
                core::hint::spin_loop();
            }
            remaining -= chunk;
        }
    }
}

impl<T> DelayNs for CycleDelay<'_, T>
where
    T: CycleCounter,
{
    fn delay_ns(&mut self, ns: u32) {
        let cycles = cycles_for_ns(self.counter.clock_hz(), u64::from(ns));
        self.spin(cycles);
    }

    fn delay_us(&mut self, us: u32) {
        let cycles = cycles_for_us(self.counter.clock_hz(), us);
        self.spin(cycles);
    }

    fn delay_ms(&mut self, ms: u32) {
        let cycles = cycles_for_ns(self.counter.clock_hz(), u64::from(ms) * 1_000_000);
        self.spin(cycles);
    }
}

#[cfg(feature = "cortex-m")]
pub use dwt::DwtCycleCounter;

#[cfg(feature = "cortex-m")]
mod dwt {
    use cortex_m::peripheral::{DCB, DWT};

    use super::{ClockError, CycleCounter};

    /// [`CycleCounter`] backed by the Cortex-M DWT `CYCCNT` register
    ///
    /// `clock_hz` is called on every delay so clock changes are picked up.
    ///
    /// Only built for ARMv7-M and ARMv8-M targets. ARMv6-M cores
    /// (Cortex-M0/M0+) have no cycle counter and `cortex-m` does not expose
    /// these registers there, so enabling the `cortex-m` feature on such a
    /// target fails to compile.
    pub struct DwtCycleCounter {
        dcb: DCB,
        dwt: DWT,
        clock_hz: fn() -> u32,
    }

    impl DwtCycleCounter {
        /// Take the trace and watchpoint units; `clock_hz` reports the
        /// current core clock
        pub fn new(dcb: DCB, dwt: DWT, clock_hz: fn() -> u32) -> Self {
            Self { dcb, dwt, clock_hz }
        }

        /// Give the core peripherals back
        pub fn release(self) -> (DCB, DWT) {
            (self.dcb, self.dwt)
        }
    }

    impl CycleCounter for DwtCycleCounter {
        fn start(&mut self) -> Result<(), ClockError> {
            if !DWT::has_cycle_counter() {
                return Err(ClockError::Unavailable);
            }
            self.dcb.enable_trace();
            self.dwt.set_cycle_count(0);
            self.dwt.enable_cycle_counter();
            if !DWT::cycle_counter_enabled() {
                return Err(ClockError::NotRunning);
            }
            Ok(())
        }

        fn clock_hz(&self) -> u32 {
            (self.clock_hz)()
        }

        fn ticks(&self) -> u32 {
            DWT::cycle_count()
        }
    }
}
