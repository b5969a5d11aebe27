//! Pin and delay capabilities driven by [`crate::SpiLink`].

/// The four SPI lines plus a blocking delay.
///
/// Every call must complete before it returns; the link relies on strict
/// call ordering for its timing. Levels are `true` for high, `false` for low.
pub trait SpiPins {
    /// Drive chip-select. Active low: `false` selects the device.
    fn set_chip_select(&mut self, level: bool);

    /// Drive the clock line.
    fn set_clock(&mut self, level: bool);

    /// Drive MOSI.
    fn set_data_out(&mut self, level: bool);

    /// Sample MISO.
    fn read_data_in(&mut self) -> bool;

    /// Block for at least `us` microseconds.
    fn delay_us(&mut self, us: u32);
}

impl<P: SpiPins + ?Sized> SpiPins for &mut P {
    fn set_chip_select(&mut self, level: bool) {
        (**self).set_chip_select(level)
    }

    fn set_clock(&mut self, level: bool) {
        (**self).set_clock(level)
    }

    fn set_data_out(&mut self, level: bool) {
        (**self).set_data_out(level)
    }

    fn read_data_in(&mut self) -> bool {
        (**self).read_data_in()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

impl<P: SpiPins + ?Sized> SpiPins for Box<P> {
    fn set_chip_select(&mut self, level: bool) {
        (**self).set_chip_select(level)
    }

    fn set_clock(&mut self, level: bool) {
        (**self).set_clock(level)
    }

    fn set_data_out(&mut self, level: bool) {
        (**self).set_data_out(level)
    }

    fn read_data_in(&mut self) -> bool {
        (**self).read_data_in()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Capability set built from five closures.
pub struct FnPins<Cs, Miso, Mosi, Clk, Delay> {
    chip_select: Cs,
    miso: Miso,
    mosi: Mosi,
    clock: Clk,
    delay: Delay,
}

impl<Cs, Miso, Mosi, Clk, Delay> FnPins<Cs, Miso, Mosi, Clk, Delay>
where
    Cs: FnMut(bool),
    Miso: FnMut() -> bool,
    Mosi: FnMut(bool),
    Clk: FnMut(bool),
    Delay: FnMut(u32),
{
    pub fn new(chip_select: Cs, miso: Miso, mosi: Mosi, clock: Clk, delay: Delay) -> Self {
        FnPins {
            chip_select,
            miso,
            mosi,
            clock,
            delay,
        }
    }
}

impl<Cs, Miso, Mosi, Clk, Delay> SpiPins for FnPins<Cs, Miso, Mosi, Clk, Delay>
where
    Cs: FnMut(bool),
    Miso: FnMut() -> bool,
    Mosi: FnMut(bool),
    Clk: FnMut(bool),
    Delay: FnMut(u32),
{
    fn set_chip_select(&mut self, level: bool) {
        (self.chip_select)(level)
    }

    fn set_clock(&mut self, level: bool) {
        (self.clock)(level)
    }

    fn set_data_out(&mut self, level: bool) {
        (self.mosi)(level)
    }

    fn read_data_in(&mut self) -> bool {
        (self.miso)()
    }

    fn delay_us(&mut self, us: u32) {
        (self.delay)(us)
    }
}

/// Software bus with MOSI wired straight back to MISO.
///
/// Delays are not slept, they are only accumulated in [`elapsed_us`](Self::elapsed_us).
#[derive(Debug, Clone)]
pub struct LoopbackPins {
    chip_select: bool,
    clock: bool,
    data: bool,
    edges: u64,
    elapsed_us: u64,
}

impl LoopbackPins {
    pub fn new() -> Self {
        LoopbackPins {
            chip_select: true,
            clock: false,
            data: false,
            edges: 0,
            elapsed_us: 0,
        }
    }

    pub fn chip_select(&self) -> bool {
        self.chip_select
    }

    pub fn clock(&self) -> bool {
        self.clock
    }

    /// Number of clock level changes seen so far
    pub fn edges(&self) -> u64 {
        self.edges
    }

    /// Total requested delay time
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }
}

impl Default for LoopbackPins {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiPins for LoopbackPins {
    fn set_chip_select(&mut self, level: bool) {
        self.chip_select = level;
    }

    fn set_clock(&mut self, level: bool) {
        if level != self.clock {
            self.edges = self.edges.wrapping_add(1);
        }
        self.clock = level;
    }

    fn set_data_out(&mut self, level: bool) {
        self.data = level;
    }

    fn read_data_in(&mut self) -> bool {
        self.data
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us = self.elapsed_us.saturating_add(u64::from(us));
    }
}
