//! Slave-scoped view of a shared [`HalfDuplexBus`]

use core::cell::{RefCell, RefMut};

use embedded_hal::spi::{ErrorType, Operation};

use crate::{
    bus::HalfDuplexBus,
    error::Error,
    peripheral::HalfDuplexPeripheral,
    pin::DigitalPin,
    select::{ChipSelectBinding, SlaveNumber},
    timer::CycleCounter,
    transaction::Transaction,
};

/// One sensor on a shared 3-wire bus
///
/// Several `SensorBus` values can point at the same bus, one per chip-select.
/// Every call re-binds this sensor's chip-select before touching the lines,
/// so calls from different adapters may be freely interleaved. A call made
/// while another one is still running on the same bus (e.g. from an
/// interrupt handler) fails with [`Error::ConcurrentAccessViolation`] instead
/// of corrupting the transaction in flight.
pub struct SensorBus<'a, SPI, SCK, DATA, CS, T> {
    bus: &'a RefCell<HalfDuplexBus<SPI, SCK, DATA, CS, T>>,
    owned: SlaveNumber,
    slave: SlaveNumber,
}

impl<'a, SPI, SCK, DATA, CS, T, E> SensorBus<'a, SPI, SCK, DATA, CS, T>
where
    SPI: HalfDuplexPeripheral,
    SCK: DigitalPin<Error = E>,
    DATA: DigitalPin<Error = E>,
    CS: DigitalPin<Error = E>,
    T: CycleCounter,
{
    /// Register `binding` on `bus` and address that slave
    ///
    /// # Errors
    ///
    /// Returns an error if the bus is busy or the chip-select cannot be configured
    pub fn new(
        bus: &'a RefCell<HalfDuplexBus<SPI, SCK, DATA, CS, T>>,
        binding: ChipSelectBinding<CS>,
    ) -> Result<Self, Error<E>> {
        let slave = binding.slave;
        Self::lock(bus)?.attach_select(binding)?;
        Ok(Self {
            bus,
            owned: slave,
            slave,
        })
    }

    /// Bring the shared bus up and bind this sensor's chip-select
    ///
    /// # Errors
    ///
    /// Returns an error if the bus is busy or fails to start
    pub fn initialize(&mut self) -> Result<(), Error<E>> {
        let mut bus = Self::lock(self.bus)?;
        bus.initialize()?;
        bus.bind_select(self.slave)
    }

    /// Address another slave on the same bus
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlaveSelection`] if no chip-select is attached
    /// for `slave`
    pub fn select_slave(&mut self, slave: SlaveNumber) -> Result<(), Error<E>> {
        Self::lock(self.bus)?.bind_select(slave)?;
        self.slave = slave;
        Ok(())
    }

    /// Slave addressed by this adapter
    pub fn slave(&self) -> SlaveNumber {
        self.slave
    }

    /// Send a command (and optional data word) and read `response.len()` words
    ///
    /// # Errors
    ///
    /// Returns an error if the bus is busy, not initialized, or the transfer fails
    pub fn send_receive(
        &mut self,
        command: u16,
        data: Option<u16>,
        response: &mut [u16],
    ) -> Result<(), Error<E>> {
        self.exchange(&Transaction::new(command, data), response)
    }

    /// Make the addressed sensor snapshot its update registers
    ///
    /// Call before reading a register set that has to be consistent.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus is busy, not initialized, or a line cannot be driven
    pub fn trigger_update(&mut self) -> Result<(), Error<E>> {
        let mut bus = Self::lock(self.bus)?;
        bus.bind_select(self.slave)?;
        bus.trigger_update()
    }

    /// Detach this sensor's chip-select from the bus and hand it back
    ///
    /// # Errors
    ///
    /// Returns an error if the bus is busy or the pin cannot be released; the
    /// pin then stays attached and comes back with [`HalfDuplexBus::release`]
    pub fn deinitialize(self) -> Result<CS, Error<E>> {
        Self::lock(self.bus)?.detach_select(self.owned)
    }

    fn exchange(&mut self, transaction: &Transaction, response: &mut [u16]) -> Result<(), Error<E>> {
        let mut bus = Self::lock(self.bus)?;
        bus.bind_select(self.slave)?;
        bus.transact(transaction.words(), response)
    }

    fn run(&mut self, operations: &mut [Operation<'_, u16>]) -> Result<(), Error<E>> {
        match operations {
            [Operation::Write(words)] => {
                let transaction = Transaction::from_words(words).ok_or(Error::InvalidTransaction)?;
                self.exchange(&transaction, &mut [])
            }
            [Operation::Write(words), Operation::Read(response)] => {
                let transaction = Transaction::from_words(words).ok_or(Error::InvalidTransaction)?;
                self.exchange(&transaction, response)
            }
            _ => Err(Error::InvalidTransaction),
        }
    }

    fn lock(
        bus: &'a RefCell<HalfDuplexBus<SPI, SCK, DATA, CS, T>>,
    ) -> Result<RefMut<'a, HalfDuplexBus<SPI, SCK, DATA, CS, T>>, Error<E>> {
        bus.try_borrow_mut().map_err(|_| {
            #[cfg(feature = "defmt")]
            defmt::warn!("3-wire bus accessed while a transaction is in flight");
            Error::ConcurrentAccessViolation
        })
    }
}

impl<SPI, SCK, DATA, CS, T, E> ErrorType for SensorBus<'_, SPI, SCK, DATA, CS, T>
where
    SPI: HalfDuplexPeripheral,
    SCK: DigitalPin<Error = E>,
    DATA: DigitalPin<Error = E>,
    CS: DigitalPin<Error = E>,
    T: CycleCounter,
    E: core::fmt::Debug,
{
    type Error = Error<E>;
}

/// Supports `[Write]` and `[Write, Read]` with a 1 or 2 word write
impl<SPI, SCK, DATA, CS, T, E> embedded_hal::spi::SpiDevice<u16>
    for SensorBus<'_, SPI, SCK, DATA, CS, T>
where
    SPI: HalfDuplexPeripheral,
    SCK: DigitalPin<Error = E>,
    DATA: DigitalPin<Error = E>,
    CS: DigitalPin<Error = E>,
    T: CycleCounter,
    E: core::fmt::Debug,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u16>]) -> Result<(), Self::Error> {
        self.run(operations)
    }
}

/// Runs the blocking transaction to completion; there is no await point
impl<SPI, SCK, DATA, CS, T, E> embedded_hal_async::spi::SpiDevice<u16>
    for SensorBus<'_, SPI, SCK, DATA, CS, T>
where
    SPI: HalfDuplexPeripheral,
    SCK: DigitalPin<Error = E>,
    DATA: DigitalPin<Error = E>,
    CS: DigitalPin<Error = E>,
    T: CycleCounter,
    E: core::fmt::Debug,
{
    async fn transaction(&mut self, operations: &mut [Operation<'_, u16>]) -> Result<(), Self::Error> {
        self.run(operations)
    }
}
