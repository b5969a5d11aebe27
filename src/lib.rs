//! Soft SPI - bit-banged SPI master over caller-supplied pins
//!
//! The link drives chip-select, clock and MOSI, samples MISO and waits through
//! a delay capability, following one of the four CPOL/CPHA modes.

pub mod error;
pub mod hal;
pub mod link;
pub mod mode;
pub mod pins;
pub mod shared;

#[cfg(test)]
mod mock;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use hal::HalPins;
pub use link::SpiLink;
pub use mode::{BitOrder, Mode};
pub use pins::{FnPins, LoopbackPins, SpiPins};
pub use shared::SharedSpiLink;
