//! SPI peripheral capability for single-line (half-duplex) operation

/// Direction of the shared data line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineDirection {
    /// The master drives the data line
    TransmitOnly,
    /// The sensor drives the data line
    ReceiveOnly,
}

/// Failure reported by a [`HalfDuplexPeripheral`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralError {
    /// The bounded wait for the transfer expired
    Timeout,
    /// The peripheral is still busy with a previous operation
    Busy,
    /// Received data was overwritten before it was read
    Overrun,
    /// Mode fault detected on the bus
    ModeFault,
    /// Any other hardware fault
    Fault,
}

/// SPI peripheral configured for 16-bit words on a single data line
///
/// Implemented once per hardware target.
pub trait HalfDuplexPeripheral {
    /// Reconfigure the data line direction
    ///
    /// On most parts this is a full de-initialize/re-initialize cycle of the
    /// peripheral.
    ///
    /// # Errors
    ///
    /// Returns an error if the peripheral cannot be reconfigured
    fn set_direction(&mut self, direction: LineDirection) -> Result<(), PeripheralError>;

    /// Clock `words` out, waiting at most `timeout_ms`
    ///
    /// # Errors
    ///
    /// Returns [`PeripheralError::Timeout`] if the transfer did not finish in time
    fn transmit(&mut self, words: &[u16], timeout_ms: u32) -> Result<(), PeripheralError>;

    /// Clock `buffer.len()` words in, waiting at most `timeout_ms`
    ///
    /// # Errors
    ///
    /// Returns [`PeripheralError::Timeout`] if the transfer did not finish in time
    fn receive(&mut self, buffer: &mut [u16], timeout_ms: u32) -> Result<(), PeripheralError>;
}
