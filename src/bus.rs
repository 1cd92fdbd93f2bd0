//! Half-duplex 3-wire transaction engine
//!
//! One [`HalfDuplexBus`] owns one SPI peripheral configured for a single data
//! line, the clock and data pins, and the chip-select lines of up to
//! [`MAX_SLAVES`] sensors. A transaction runs:
//!
//! 1. assert the bound chip-select
//! 2. transmit the command words
//! 3. hold for [`GRACE_PERIOD_US`]
//! 4. switch the peripheral to receive
//! 5. receive the response words
//! 6. release chip-select
//! 7. switch the peripheral back to transmit
//!
//! Step 7 happens after chip-select is released, so the sensor never sees it.
//!
//! # Caller contract
//!
//! The bus has no internal lock. Methods take `&mut self`, so exclusive access
//! is enforced by the borrow checker; sharing between several sensors goes
//! through [`crate::SensorBus`], which reports overlapping use as
//! [`Error::ConcurrentAccessViolation`].

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;

use crate::{
    error::Error,
    peripheral::{HalfDuplexPeripheral, LineDirection},
    pin::{DigitalPin, PinMode},
    select::{ChipSelectBinding, MAX_SLAVES, SlaveNumber},
    timer::{CycleCounter, CycleDelay, GRACE_PERIOD_US},
    transaction::Transaction,
};

/// Peripheral timeout used when none is configured
pub const DEFAULT_TIMEOUT_MS: u32 = 100;

/// Fixed wiring of one physical bus
#[derive(Debug)]
pub struct BusConfiguration<SPI, SCK, DATA> {
    /// Peripheral driving the bus
    pub peripheral: SPI,
    /// Clock line
    pub sck: SCK,
    /// Transmit data line (MOSI)
    pub mosi: DATA,
    /// Receive data line, `None` when it is the same wire as `mosi`
    ///
    /// Held for the lifetime of the bus and handed back by
    /// [`HalfDuplexBus::release`]; the engine never drives it. Routing the
    /// receive path is up to the peripheral's receive mode.
    pub miso: Option<DATA>,
    /// Bounded wait handed to every transmit and receive
    pub timeout_ms: u32,
}

impl<SPI, SCK, DATA> BusConfiguration<SPI, SCK, DATA> {
    /// Single-wire configuration: MOSI and MISO share one pin
    pub fn new(peripheral: SPI, sck: SCK, mosi: DATA) -> Self {
        Self {
            peripheral,
            sck,
            mosi,
            miso: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Use a separate receive data pin
    #[must_use]
    pub fn with_miso(mut self, miso: DATA) -> Self {
        self.miso = Some(miso);
        self
    }

    /// Override the peripheral timeout
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Where the bus is in its transaction cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusPhase {
    /// `initialize` has not run yet
    Uninitialized,
    /// Chip-select released, peripheral in transmit mode
    Idle,
    /// Chip-select asserted, command words going out
    Transmitting,
    /// Chip-select asserted, response words coming in
    Receiving,
    /// Chip-select asserted with the trigger-update pattern on the lines
    Triggering,
}

/// Half-duplex SSC bus shared by up to four sensors
#[derive(Debug)]
pub struct HalfDuplexBus<SPI, SCK, DATA, CS, T> {
    config: BusConfiguration<SPI, SCK, DATA>,
    counter: T,
    selects: [Option<CS>; MAX_SLAVES],
    active: Option<SlaveNumber>,
    direction: Option<LineDirection>,
    phase: BusPhase,
}

impl<SPI, SCK, DATA, CS, T, E> HalfDuplexBus<SPI, SCK, DATA, CS, T>
where
    SPI: HalfDuplexPeripheral,
    SCK: DigitalPin<Error = E>,
    DATA: DigitalPin<Error = E>,
    CS: DigitalPin<Error = E>,
    T: CycleCounter,
{
    /// Take ownership of the bus hardware
    ///
    /// Nothing is driven until [`Self::initialize`] is called.
    pub fn new(config: BusConfiguration<SPI, SCK, DATA>, counter: T) -> Self {
        Self {
            config,
            counter,
            selects: [None, None, None, None],
            active: None,
            direction: None,
            phase: BusPhase::Uninitialized,
        }
    }

    /// Like [`Self::new`], with a first chip-select attached and bound
    ///
    /// # Errors
    ///
    /// Returns an error if the chip-select pin cannot be configured
    pub fn with_select(
        config: BusConfiguration<SPI, SCK, DATA>,
        counter: T,
        binding: ChipSelectBinding<CS>,
    ) -> Result<Self, Error<E>> {
        let slave = binding.slave;
        let mut bus = Self::new(config, counter);
        bus.attach_select(binding)?;
        bus.bind_select(slave)?;
        Ok(bus)
    }

    /// Start the cycle counter, park every chip-select high and put the
    /// peripheral into transmit mode
    ///
    /// Safe to call again; it re-arms the counter and the peripheral.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the counter or the peripheral
    /// fails to start, or [`Error::Pin`] if a chip-select cannot be configured
    pub fn initialize(&mut self) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Initializing 3-wire bus");

        self.counter.start().map_err(|_e| {
            #[cfg(feature = "defmt")]
            defmt::warn!("Cycle counter failed to start: {}", _e);
            Error::InitializationFailure
        })?;
        if self.counter.clock_hz() == 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("Cycle counter reports a 0 Hz clock");
            return Err(Error::InitializationFailure);
        }

        for pin in self.selects.iter_mut().flatten() {
            pin.configure(PinMode::OutputPushPull).map_err(Error::Pin)?;
            pin.disable().map_err(Error::Pin)?;
        }

        self.direction = None;
        self.config
            .peripheral
            .set_direction(LineDirection::TransmitOnly)
            .map_err(|_e| {
                #[cfg(feature = "defmt")]
                defmt::warn!("Peripheral failed to enter transmit mode: {}", _e);
                Error::InitializationFailure
            })?;
        self.direction = Some(LineDirection::TransmitOnly);
        self.phase = BusPhase::Idle;

        #[cfg(feature = "defmt")]
        defmt::debug!("3-wire bus ready at {} Hz", self.counter.clock_hz());

        Ok(())
    }

    /// Install the chip-select for `binding.slave`
    ///
    /// The pin is configured as a push-pull output and released. Any pin
    /// previously attached for that slave is handed back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if the pin cannot be configured
    pub fn attach_select(&mut self, binding: ChipSelectBinding<CS>) -> Result<Option<CS>, Error<E>> {
        let ChipSelectBinding { slave, mut pin } = binding;

        pin.configure(PinMode::OutputPushPull).map_err(Error::Pin)?;
        pin.disable().map_err(Error::Pin)?;

        #[cfg(feature = "defmt")]
        defmt::trace!("Attached chip-select for slave {}", slave);

        Ok(self.selects[slave.index()].replace(pin))
    }

    /// Remove and return the chip-select for `slave`, leaving it released
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlaveSelection`] if nothing is attached for
    /// `slave`, or [`Error::Pin`] if the pin cannot be released
    pub fn detach_select(&mut self, slave: SlaveNumber) -> Result<CS, Error<E>> {
        let mut pin = self.selects[slave.index()]
            .take()
            .ok_or(Error::InvalidSlaveSelection)?;
        if self.active == Some(slave) {
            self.active = None;
        }
        pin.disable().map_err(Error::Pin)?;
        Ok(pin)
    }

    /// Choose which chip-select the next transaction drives
    ///
    /// No line changes state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlaveSelection`] if no pin is attached for `slave`
    pub fn bind_select(&mut self, slave: SlaveNumber) -> Result<(), Error<E>> {
        if self.selects[slave.index()].is_none() {
            #[cfg(feature = "defmt")]
            defmt::warn!("No chip-select attached for slave {}", slave);
            return Err(Error::InvalidSlaveSelection);
        }
        self.active = Some(slave);
        Ok(())
    }

    /// Currently bound slave
    pub fn selected(&self) -> Option<SlaveNumber> {
        self.active
    }

    /// Where the bus is in its transaction cycle
    pub fn phase(&self) -> BusPhase {
        self.phase
    }

    /// Current data line direction, `None` if a reconfiguration failed midway
    pub fn direction(&self) -> Option<LineDirection> {
        self.direction
    }

    /// Send `words` and read `response.len()` words back
    ///
    /// `words` is a command, optionally followed by one data word. An empty
    /// `response` makes this a write-only transaction: the line is never
    /// turned around.
    ///
    /// On any failure chip-select is released and the peripheral is put back
    /// into transmit mode before the first error is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] before [`Self::initialize`]
    /// - [`Error::InvalidSlaveSelection`] if no slave is bound
    /// - [`Error::InvalidTransaction`] unless `words` holds 1 or 2 words; no
    ///   line is touched
    /// - [`Error::PeripheralTimeout`] / [`Error::Peripheral`] from the peripheral
    /// - [`Error::Pin`] if chip-select cannot be driven
    pub fn transact(&mut self, words: &[u16], response: &mut [u16]) -> Result<(), Error<E>> {
        let slave = self.ready_slave()?;
        let request = Transaction::from_words(words).ok_or_else(|| {
            #[cfg(feature = "defmt")]
            defmt::warn!("Rejected {}-word request on slave {}", words.len(), slave);
            Error::InvalidTransaction
        })?;

        #[cfg(feature = "defmt")]
        defmt::trace!(
            "Transaction on slave {}: tx {=[?]:#x}, rx {} words",
            slave,
            request.words(),
            response.len()
        );

        let outcome = self.exchange(slave, request.words(), response);
        let released = self.deselect(slave);
        let restored = self.restore_transmit();
        self.phase = BusPhase::Idle;

        #[cfg(feature = "defmt")]
        match &outcome {
            Ok(()) => defmt::trace!("Received {=[?]:#x}", response),
            Err(_) => defmt::warn!("Transaction on slave {} failed", slave),
        }

        outcome.and(released).and(restored)
    }

    /// Make the bound sensor snapshot its update registers
    ///
    /// Drives SCK low and MOSI high, asserts chip-select for
    /// [`GRACE_PERIOD_US`], then releases it. The line direction is untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] before [`Self::initialize`]
    /// - [`Error::InvalidSlaveSelection`] if no slave is bound
    /// - [`Error::Pin`] if a line cannot be driven
    pub fn trigger_update(&mut self) -> Result<(), Error<E>> {
        let slave = self.ready_slave()?;

        #[cfg(feature = "defmt")]
        defmt::trace!("Trigger update on slave {}", slave);

        self.phase = BusPhase::Triggering;
        let outcome = self.pulse(slave);
        let released = self.deselect(slave);
        self.phase = BusPhase::Idle;

        outcome.and(released)
    }

    /// Tear the bus down, returning its wiring, counter and attached chip-selects
    #[allow(clippy::type_complexity)]
    pub fn release(
        self,
    ) -> (
        BusConfiguration<SPI, SCK, DATA>,
        T,
        [Option<CS>; MAX_SLAVES],
    ) {
        (self.config, self.counter, self.selects)
    }

    fn ready_slave(&self) -> Result<SlaveNumber, Error<E>> {
        if self.phase == BusPhase::Uninitialized {
            return Err(Error::NotInitialized);
        }
        self.active.ok_or(Error::InvalidSlaveSelection)
    }

    fn select_pin(&mut self, slave: SlaveNumber) -> Result<&mut CS, Error<E>> {
        self.selects[slave.index()]
            .as_mut()
            .ok_or(Error::InvalidSlaveSelection)
    }

    fn exchange(
        &mut self,
        slave: SlaveNumber,
        words: &[u16],
        response: &mut [u16],
    ) -> Result<(), Error<E>> {
        self.phase = BusPhase::Transmitting;
        self.select_pin(slave)?.enable().map_err(Error::Pin)?;

        let timeout_ms = self.config.timeout_ms;
        self.config.peripheral.transmit(words, timeout_ms)?;
        self.hold_grace_period();

        if response.is_empty() {
            return Ok(());
        }

        self.direction = None;
        self.config
            .peripheral
            .set_direction(LineDirection::ReceiveOnly)?;
        self.direction = Some(LineDirection::ReceiveOnly);

        #[cfg(feature = "defmt")]
        defmt::trace!("Data line turned to receive");

        self.phase = BusPhase::Receiving;
        self.config.peripheral.receive(response, timeout_ms)?;
        Ok(())
    }

    fn pulse(&mut self, slave: SlaveNumber) -> Result<(), Error<E>> {
        self.config.sck.write(PinState::Low).map_err(Error::Pin)?;
        self.config.mosi.write(PinState::High).map_err(Error::Pin)?;
        self.select_pin(slave)?.enable().map_err(Error::Pin)?;
        self.hold_grace_period();
        Ok(())
    }

    fn deselect(&mut self, slave: SlaveNumber) -> Result<(), Error<E>> {
        self.select_pin(slave)?.disable().map_err(Error::Pin)
    }

    fn restore_transmit(&mut self) -> Result<(), Error<E>> {
        if self.direction == Some(LineDirection::TransmitOnly) {
            return Ok(());
        }
        self.direction = None;
        self.config
            .peripheral
            .set_direction(LineDirection::TransmitOnly)
            .inspect_err(|_e| {
                #[cfg(feature = "defmt")]
                defmt::warn!("Data line stuck out of transmit mode: {}", _e);
            })?;
        self.direction = Some(LineDirection::TransmitOnly);

        #[cfg(feature = "defmt")]
        defmt::trace!("Data line back to transmit");

        Ok(())
    }

    fn hold_grace_period(&self) {
        CycleDelay::new(&self.counter).delay_us(GRACE_PERIOD_US);
    }
}
