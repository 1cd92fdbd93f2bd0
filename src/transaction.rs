/// Words clocked out in one request: a command, optionally followed by a data word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transaction {
    words: [u16; 2],
    len: usize,
}

impl Transaction {
    /// Command-only request
    #[must_use]
    pub const fn command(command: u16) -> Self {
        Self {
            words: [command, 0],
            len: 1,
        }
    }

    /// Command followed by a data word
    #[must_use]
    pub const fn write(command: u16, data: u16) -> Self {
        Self {
            words: [command, data],
            len: 2,
        }
    }

    /// Build from a command and an optional data word
    #[must_use]
    pub const fn new(command: u16, data: Option<u16>) -> Self {
        match data {
            Some(data) => Self::write(command, data),
            None => Self::command(command),
        }
    }

    /// Build from raw words; only 1 or 2 words form a valid request
    #[must_use]
    pub fn from_words(words: &[u16]) -> Option<Self> {
        match *words {
            [command] => Some(Self::command(command)),
            [command, data] => Some(Self::write(command, data)),
            _ => None,
        }
    }

    /// Words to transmit
    #[must_use]
    pub fn words(&self) -> &[u16] {
        &self.words[..self.len]
    }

    /// First word of the request
    #[must_use]
    pub const fn command_word(&self) -> u16 {
        self.words[0]
    }

    /// Whether a data word follows the command
    #[must_use]
    pub const fn is_write(&self) -> bool {
        self.len == 2
    }
}
