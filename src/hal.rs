//! [`SpiPins`] over embedded-hal 1.0 GPIO and delay traits.
//!
//! Works with any HAL: `linux_embedded_hal::CdevPin`, `rppal::gpio` pins,
//! microcontroller HAL pins. Pin errors are logged and the transfer carries on,
//! a failed MISO read samples as low.

use crate::pins::SpiPins;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::warn;

pub struct HalPins<Cs, Clk, Mosi, Miso, Delay> {
    chip_select: Cs,
    clock: Clk,
    mosi: Mosi,
    miso: Miso,
    delay: Delay,
}

impl<Cs, Clk, Mosi, Miso, Delay> HalPins<Cs, Clk, Mosi, Miso, Delay>
where
    Cs: OutputPin,
    Clk: OutputPin,
    Mosi: OutputPin,
    Miso: InputPin,
    Delay: DelayNs,
{
    pub fn new(chip_select: Cs, clock: Clk, mosi: Mosi, miso: Miso, delay: Delay) -> Self {
        HalPins {
            chip_select,
            clock,
            mosi,
            miso,
            delay,
        }
    }

    /// Give the pins and delay back
    pub fn release(self) -> (Cs, Clk, Mosi, Miso, Delay) {
        (self.chip_select, self.clock, self.mosi, self.miso, self.delay)
    }
}

fn drive<P: OutputPin>(pin: &mut P, level: bool, line: &str) {
    if let Err(e) = pin.set_state(PinState::from(level)) {
        warn!("Failed to drive {} {}: {:?}", line, level as u8, e);
    }
}

impl<Cs, Clk, Mosi, Miso, Delay> SpiPins for HalPins<Cs, Clk, Mosi, Miso, Delay>
where
    Cs: OutputPin,
    Clk: OutputPin,
    Mosi: OutputPin,
    Miso: InputPin,
    Delay: DelayNs,
{
    fn set_chip_select(&mut self, level: bool) {
        drive(&mut self.chip_select, level, "chip-select");
    }

    fn set_clock(&mut self, level: bool) {
        drive(&mut self.clock, level, "clock");
    }

    fn set_data_out(&mut self, level: bool) {
        drive(&mut self.mosi, level, "MOSI");
    }

    fn read_data_in(&mut self) -> bool {
        match self.miso.is_high() {
            Ok(level) => level,
            Err(e) => {
                warn!("Failed to sample MISO: {:?}", e);
                false
            }
        }
    }

    fn delay_us(&mut self, us: u32) {
        if us > 0 {
            self.delay.delay_us(us);
        }
    }
}
