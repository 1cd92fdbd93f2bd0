use core::fmt;

use embedded_hal::spi::ErrorKind;

use crate::peripheral::PeripheralError;

/// Error type for 3-wire bus operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// A chip-select, clock or data pin failed to change state
    Pin(E),
    /// The peripheral exceeded its bounded wait while transmitting or receiving
    PeripheralTimeout,
    /// The peripheral reported a fault other than a timeout
    Peripheral(PeripheralError),
    /// Slave number out of range, or no chip-select pin attached for it
    InvalidSlaveSelection,
    /// The peripheral or the cycle counter failed to start
    InitializationFailure,
    /// A transaction was attempted while another one was in flight on the same bus
    ConcurrentAccessViolation,
    /// The bus has not been initialized yet
    NotInitialized,
    /// The request does not describe a 1 or 2 word command transaction
    InvalidTransaction,
}

impl<E> From<PeripheralError> for Error<E> {
    fn from(error: PeripheralError) -> Self {
        match error {
            PeripheralError::Timeout => Error::PeripheralTimeout,
            other => Error::Peripheral(other),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Pin(e) => write!(f, "pin error: {e:?}"),
            Error::PeripheralTimeout => write!(f, "peripheral timed out"),
            Error::Peripheral(e) => write!(f, "peripheral error: {e:?}"),
            Error::InvalidSlaveSelection => write!(f, "invalid slave selection"),
            Error::InitializationFailure => write!(f, "bus initialization failed"),
            Error::ConcurrentAccessViolation => write!(f, "bus already in use"),
            Error::NotInitialized => write!(f, "bus not initialized"),
            Error::InvalidTransaction => write!(f, "invalid transaction"),
        }
    }
}

impl<E: fmt::Debug> embedded_hal::spi::Error for Error<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Pin(_) | Error::InvalidSlaveSelection => ErrorKind::ChipSelectFault,
            Error::Peripheral(PeripheralError::Overrun) => ErrorKind::Overrun,
            Error::Peripheral(PeripheralError::ModeFault) => ErrorKind::ModeFault,
            _ => ErrorKind::Other,
        }
    }
}
