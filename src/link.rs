//! Bit-banged SPI master link.
//!
//! A [`SpiLink`] owns a [`SpiPins`] capability set and sequences the clock,
//! MOSI, MISO and chip-select lines for one of the four SPI modes.

use crate::error::Result;
use crate::mode::{BitOrder, Mode, Step};
use crate::pins::{FnPins, SpiPins};
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};
use log::{debug, trace};
use std::convert::Infallible;

/// Byte clocked out when a read has nothing to send
const FILLER: u8 = 0x00;

/// Software SPI master on a single chip-select.
///
/// Chip-select is active low. The clock rests at the level given by the mode
/// and is only toggled inside a transfer. Callers sharing one physical bus
/// between several links or threads must serialize transfers themselves,
/// e.g. through [`crate::SharedSpiLink`].
pub struct SpiLink<P> {
    pins: P,
    mode: Mode,
    bit_order: BitOrder,
    half_period_us: u32,
}

impl<P: SpiPins> SpiLink<P> {
    /// Bind a link to its pins.
    ///
    /// Deasserts chip-select and parks the clock at its idle level so the
    /// first transfer does not start with a stray edge.
    pub fn new(mut pins: P, half_period_us: u32, mode: Mode) -> Self {
        pins.set_chip_select(true);
        pins.set_clock(mode.idle_clock());

        debug!(
            "Soft SPI link ready: {}, half period {}us",
            mode, half_period_us
        );

        SpiLink {
            pins,
            mode,
            bit_order: BitOrder::default(),
            half_period_us,
        }
    }

    /// Like [`new`](Self::new) with a numeric mode.
    ///
    /// Modes outside 0..=3 are rejected before any pin is touched.
    pub fn with_raw_mode(pins: P, half_period_us: u32, mode: u8) -> Result<Self> {
        let mode = Mode::try_from(mode)?;
        Ok(Self::new(pins, half_period_us, mode))
    }

    pub fn with_bit_order(mut self, bit_order: BitOrder) -> Self {
        self.bit_order = bit_order;
        self
    }

    pub fn set_bit_order(&mut self, bit_order: BitOrder) {
        self.bit_order = bit_order;
    }

    pub fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn half_period_us(&self) -> u32 {
        self.half_period_us
    }

    /// Nominal clock frequency, `None` when running without delays
    pub fn frequency_hz(&self) -> Option<u32> {
        if self.half_period_us == 0 {
            None
        } else {
            Some(500_000 / self.half_period_us)
        }
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// Give the pins back
    pub fn release(self) -> P {
        self.pins
    }

    /// Full-duplex transfer under one chip-select assertion.
    ///
    /// Sends `buffer_out[k]` and stores the byte clocked in at the same time
    /// into `buffer_in[k]`, for `k` up to the shorter of the two buffers.
    /// An empty transfer still pulses chip-select.
    pub fn transfer(&mut self, buffer_in: &mut [u8], buffer_out: &[u8]) {
        self.select();
        for (rx, &tx) in buffer_in.iter_mut().zip(buffer_out) {
            *rx = self.exchange(tx);
        }
        self.deselect();

        trace!(
            "Transferred {} byte(s)",
            buffer_in.len().min(buffer_out.len())
        );
    }

    /// Transfer where received bytes overwrite the sent ones.
    ///
    /// Byte `k` is read before it is overwritten, so the outcome matches
    /// [`transfer`](Self::transfer) with a copy of the buffer.
    pub fn transfer_in_place(&mut self, buffer: &mut [u8]) {
        self.select();
        for word in buffer.iter_mut() {
            *word = self.exchange(*word);
        }
        self.deselect();

        trace!("Transferred {} byte(s) in place", buffer.len());
    }

    /// Shift one byte out and one in, leaving chip-select alone.
    ///
    /// The caller frames the bytes with chip-select itself, e.g. through the
    /// [`SpiDevice`] implementation.
    #[cfg(feature = "advanced")]
    pub fn transfer_byte(&mut self, data: u8) -> u8 {
        self.exchange(data)
    }

    fn select(&mut self) {
        self.pins.set_chip_select(false);
        self.pins.delay_us(self.half_period_us);
    }

    fn deselect(&mut self) {
        self.pins.delay_us(self.half_period_us);
        self.pins.set_chip_select(true);
    }

    /// Eight bit slots following the mode's step table.
    ///
    /// The bit sampled in slot `i` lands at result bit `i` whatever the bit
    /// order, so an MSB-first link hands back received bytes bit-reversed
    /// relative to the wire.
    fn exchange(&mut self, data: u8) -> u8 {
        let mut result = 0u8;

        for slot in 0..8u8 {
            let out = self.bit_order.bit(data, slot);
            for step in self.mode.steps() {
                match step {
                    Step::Drive => self.pins.set_data_out(out),
                    Step::Wait => self.pins.delay_us(self.half_period_us),
                    Step::ClockHigh => self.pins.set_clock(true),
                    Step::ClockLow => self.pins.set_clock(false),
                    Step::Sample => {
                        if self.pins.read_data_in() {
                            result |= 1 << slot;
                        }
                    }
                }
            }
        }

        result
    }
}

impl<Cs, Miso, Mosi, Clk, Delay> SpiLink<FnPins<Cs, Miso, Mosi, Clk, Delay>>
where
    Cs: FnMut(bool),
    Miso: FnMut() -> bool,
    Mosi: FnMut(bool),
    Clk: FnMut(bool),
    Delay: FnMut(u32),
{
    /// Build a link straight from pin callbacks.
    pub fn from_fns(
        chip_select: Cs,
        miso: Miso,
        mosi: Mosi,
        clock: Clk,
        delay: Delay,
        half_period_us: u32,
        mode: Mode,
    ) -> Self {
        Self::new(
            FnPins::new(chip_select, miso, mosi, clock, delay),
            half_period_us,
            mode,
        )
    }
}

impl<P: SpiPins> ErrorType for SpiLink<P> {
    type Error = Infallible;
}

/// All operations run under a single chip-select assertion.
impl<P: SpiPins> SpiDevice<u8> for SpiLink<P> {
    fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> core::result::Result<(), Infallible> {
        self.select();

        for operation in operations.iter_mut() {
            match operation {
                Operation::Read(words) => {
                    for word in words.iter_mut() {
                        *word = self.exchange(FILLER);
                    }
                }
                Operation::Write(words) => {
                    for &word in words.iter() {
                        self.exchange(word);
                    }
                }
                Operation::Transfer(read, write) => {
                    let len = read.len().max(write.len());
                    for index in 0..len {
                        let out = write.get(index).copied().unwrap_or(FILLER);
                        let received = self.exchange(out);
                        if let Some(slot) = read.get_mut(index) {
                            *slot = received;
                        }
                    }
                }
                Operation::TransferInPlace(words) => {
                    for word in words.iter_mut() {
                        *word = self.exchange(*word);
                    }
                }
                Operation::DelayNs(ns) => {
                    self.pins.delay_us((*ns).div_ceil(1_000));
                }
            }
        }

        self.deselect();
        Ok(())
    }
}
