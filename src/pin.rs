//! Digital pin capability used for chip-select, clock and data lines

use core::fmt::Debug;

use embedded_hal::digital::{PinState, StatefulOutputPin};

/// Electrical mode of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// High impedance input
    Input,
    /// Input with pull-up resistor
    InputPullUp,
    /// Input with pull-down resistor
    InputPullDown,
    /// Push-pull output
    OutputPushPull,
    /// Open-drain output
    OutputOpenDrain,
}

impl PinMode {
    /// Whether the mode drives the line
    #[must_use]
    pub const fn is_output(self) -> bool {
        matches!(self, PinMode::OutputPushPull | PinMode::OutputOpenDrain)
    }
}

/// Which level counts as "enabled"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// `enable` drives the line high
    ActiveHigh,
    /// `enable` drives the line low
    ActiveLow,
}

impl Polarity {
    /// Level the line is driven to when enabled
    #[must_use]
    pub const fn active_level(self) -> PinState {
        match self {
            Polarity::ActiveHigh => PinState::High,
            Polarity::ActiveLow => PinState::Low,
        }
    }

    /// Level the line is driven to when disabled
    #[must_use]
    pub const fn inactive_level(self) -> PinState {
        match self {
            Polarity::ActiveHigh => PinState::Low,
            Polarity::ActiveLow => PinState::High,
        }
    }
}

/// A single GPIO line
///
/// Implemented once per hardware target. The bus engine only talks to pins
/// through this trait.
pub trait DigitalPin {
    /// Platform error type
    type Error: Debug;

    /// Put the pin into `mode`
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot apply the mode
    fn configure(&mut self, mode: PinMode) -> Result<(), Self::Error>;

    /// Sample the line level
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be read
    fn read(&mut self) -> Result<PinState, Self::Error>;

    /// Drive the line to `level`
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be driven
    fn write(&mut self, level: PinState) -> Result<(), Self::Error>;

    /// Configured polarity, used by [`Self::enable`] and [`Self::disable`]
    fn polarity(&self) -> Polarity;

    /// Drive the line to its active level
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be driven
    fn enable(&mut self) -> Result<(), Self::Error> {
        let level = self.polarity().active_level();
        self.write(level)
    }

    /// Drive the line to its inactive level
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be driven
    fn disable(&mut self) -> Result<(), Self::Error> {
        let level = self.polarity().inactive_level();
        self.write(level)
    }
}

/// Error from a [`HalPin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalPinError<E> {
    /// The wrapped pin failed
    Pin(E),
    /// The pin type cannot be switched into the requested mode
    UnsupportedMode(PinMode),
}

/// [`DigitalPin`] over an `embedded-hal` output pin
///
/// Type-state HALs fix the pin's mode when the output is constructed, so
/// [`DigitalPin::configure`] cannot change it. Output modes are accepted
/// and left to that construction (an open-drain request on a push-pull
/// pin stays push-pull); input and analog modes are rejected.
#[derive(Debug)]
pub struct HalPin<P> {
    pin: P,
    polarity: Polarity,
}

impl<P> HalPin<P>
where
    P: StatefulOutputPin,
{
    /// Wrap `pin` with the given polarity
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Chip-select style wrapper: enabled means driven low
    pub fn active_low(pin: P) -> Self {
        Self::new(pin, Polarity::ActiveLow)
    }

    /// Release the wrapped pin
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P> DigitalPin for HalPin<P>
where
    P: StatefulOutputPin,
{
    type Error = HalPinError<P::Error>;

    fn configure(&mut self, mode: PinMode) -> Result<(), Self::Error> {
        if mode.is_output() {
            Ok(())
        } else {
            Err(HalPinError::UnsupportedMode(mode))
        }
    }

    fn read(&mut self) -> Result<PinState, Self::Error> {
        self.pin
            .is_set_high()
            .map(PinState::from)
            .map_err(HalPinError::Pin)
    }

    fn write(&mut self, level: PinState) -> Result<(), Self::Error> {
        self.pin.set_state(level).map_err(HalPinError::Pin)
    }

    fn polarity(&self) -> Polarity {
        self.polarity
    }
}
