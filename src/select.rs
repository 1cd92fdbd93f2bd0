//! Slave numbering and chip-select bindings

/// Maximum number of sensors addressable on one bus
pub const MAX_SLAVES: usize = 4;

/// Logical slave number on a shared bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SlaveNumber {
    S0 = 0,
    S1 = 1,
    S2 = 2,
    S3 = 3,
}

impl SlaveNumber {
    /// All slave numbers, in index order
    pub const ALL: [SlaveNumber; MAX_SLAVES] = [
        SlaveNumber::S0,
        SlaveNumber::S1,
        SlaveNumber::S2,
        SlaveNumber::S3,
    ];

    /// Position in the chip-select table
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl From<SlaveNumber> for u8 {
    fn from(slave: SlaveNumber) -> u8 {
        slave as u8
    }
}

/// Slave number outside `0..MAX_SLAVES`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidSlaveNumber(pub u8);

impl TryFrom<u8> for SlaveNumber {
    type Error = InvalidSlaveNumber;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SlaveNumber::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(InvalidSlaveNumber(value))
    }
}

impl<E> From<InvalidSlaveNumber> for crate::Error<E> {
    fn from(_: InvalidSlaveNumber) -> Self {
        crate::Error::InvalidSlaveSelection
    }
}

/// A slave's chip-select line
#[derive(Debug)]
pub struct ChipSelectBinding<CS> {
    /// Slave the line belongs to
    pub slave: SlaveNumber,
    /// Chip-select output for that slave
    pub pin: CS,
}

impl<CS> ChipSelectBinding<CS> {
    /// Pair `pin` with `slave`
    pub fn new(slave: SlaveNumber, pin: CS) -> Self {
        Self { slave, pin }
    }
}
