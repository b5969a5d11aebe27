//! SPI transmission modes and bit ordering
//!
//! Each mode is encoded as the ordered list of micro-steps run for one bit.
//! The order is the timing diagram itself, so modes are never merged.

use crate::error::{Error, Result};
use embedded_hal::spi::{Phase, Polarity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Clock polarity / clock phase combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Mode {
    /// CPOL=0, CPHA=0: clock idles low, sample on the rising edge
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1: clock idles low, sample on the falling edge
    Mode1,
    /// CPOL=1, CPHA=0: clock idles high, sample on the falling edge
    Mode2,
    /// CPOL=1, CPHA=1: clock idles high, sample on the rising edge
    Mode3,
}

/// One action inside a bit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Drive MOSI with the current output bit
    Drive,
    /// Wait one half period
    Wait,
    ClockHigh,
    ClockLow,
    /// Read MISO into the current result bit
    Sample,
}

use Step::{ClockHigh, ClockLow, Drive, Sample, Wait};

const MODE_0_STEPS: [Step; 6] = [Drive, Wait, ClockHigh, Sample, Wait, ClockLow];
const MODE_1_STEPS: [Step; 6] = [ClockHigh, Drive, Wait, ClockLow, Sample, Wait];
const MODE_2_STEPS: [Step; 6] = [Drive, Wait, ClockLow, Sample, Wait, ClockHigh];
const MODE_3_STEPS: [Step; 6] = [ClockLow, Drive, Wait, ClockHigh, Sample, Wait];

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Mode0, Mode::Mode1, Mode::Mode2, Mode::Mode3];

    /// Clock polarity bit
    pub const fn cpol(self) -> bool {
        matches!(self, Mode::Mode2 | Mode::Mode3)
    }

    /// Clock phase bit
    pub const fn cpha(self) -> bool {
        matches!(self, Mode::Mode1 | Mode::Mode3)
    }

    /// Level the clock line rests at between transfers
    pub const fn idle_clock(self) -> bool {
        self.cpol()
    }

    pub const fn number(self) -> u8 {
        match self {
            Mode::Mode0 => 0,
            Mode::Mode1 => 1,
            Mode::Mode2 => 2,
            Mode::Mode3 => 3,
        }
    }

    pub(crate) const fn steps(self) -> &'static [Step; 6] {
        match self {
            Mode::Mode0 => &MODE_0_STEPS,
            Mode::Mode1 => &MODE_1_STEPS,
            Mode::Mode2 => &MODE_2_STEPS,
            Mode::Mode3 => &MODE_3_STEPS,
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Mode::Mode0),
            1 => Ok(Mode::Mode1),
            2 => Ok(Mode::Mode2),
            3 => Ok(Mode::Mode3),
            other => Err(Error::InvalidMode(other)),
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> u8 {
        mode.number()
    }
}

impl From<embedded_hal::spi::Mode> for Mode {
    fn from(mode: embedded_hal::spi::Mode) -> Self {
        match (mode.polarity, mode.phase) {
            (Polarity::IdleLow, Phase::CaptureOnFirstTransition) => Mode::Mode0,
            (Polarity::IdleLow, Phase::CaptureOnSecondTransition) => Mode::Mode1,
            (Polarity::IdleHigh, Phase::CaptureOnFirstTransition) => Mode::Mode2,
            (Polarity::IdleHigh, Phase::CaptureOnSecondTransition) => Mode::Mode3,
        }
    }
}

impl From<Mode> for embedded_hal::spi::Mode {
    fn from(mode: Mode) -> Self {
        embedded_hal::spi::Mode {
            polarity: if mode.cpol() {
                Polarity::IdleHigh
            } else {
                Polarity::IdleLow
            },
            phase: if mode.cpha() {
                Phase::CaptureOnSecondTransition
            } else {
                Phase::CaptureOnFirstTransition
            },
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode {} (CPOL={}, CPHA={})",
            self.number(),
            self.cpol() as u8,
            self.cpha() as u8
        )
    }
}

/// Order in which the bits of a byte are shifted out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

impl BitOrder {
    /// Output bit sent during bit slot `slot` (0..8)
    #[inline]
    pub(crate) const fn bit(self, data: u8, slot: u8) -> bool {
        let shift = match self {
            BitOrder::MsbFirst => 7 - slot,
            BitOrder::LsbFirst => slot,
        };
        (data >> shift) & 0x1 != 0
    }
}

impl FromStr for BitOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msb_first" | "msb" => Ok(BitOrder::MsbFirst),
            "lsb_first" | "lsb" => Ok(BitOrder::LsbFirst),
            _ => Err(Error::InvalidBitOrder(s.to_string())),
        }
    }
}

impl fmt::Display for BitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitOrder::MsbFirst => f.write_str("msb_first"),
            BitOrder::LsbFirst => f.write_str("lsb_first"),
        }
    }
}
