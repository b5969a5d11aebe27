use crate::config::{Backend, PinConfig};
#[cfg(not(all(feature = "cdev", feature = "rpi")))]
use anyhow::anyhow;
use anyhow::Result;
#[cfg(any(feature = "cdev", feature = "rpi"))]
use anyhow::Context;
#[cfg(feature = "cdev")]
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
#[cfg(feature = "cdev")]
use linux_embedded_hal::CdevPin;
#[cfg(any(feature = "cdev", feature = "rpi"))]
use log::debug;
use log::info;
#[cfg(any(feature = "cdev", feature = "rpi"))]
use soft_spi::HalPins;
use soft_spi::{LoopbackPins, Mode, SpiPins};

#[cfg(feature = "cdev")]
const CONSUMER: &str = "soft-spi";

pub type BoxedPins = Box<dyn SpiPins + Send>;

/// Open the configured pin backend.
///
/// Lines are claimed with chip-select deasserted and the clock at the idle
/// level of `mode`, so nothing glitches before the link takes over.
pub fn open(pins: &PinConfig, mode: Mode) -> Result<BoxedPins> {
    info!(
        "Opening {:?} pins: cs={} clk={} mosi={} miso={}",
        pins.backend, pins.chip_select, pins.clock, pins.mosi, pins.miso
    );

    match pins.backend {
        Backend::Cdev => open_cdev(pins, mode),
        Backend::Rppal => open_rppal(pins, mode),
        Backend::Loopback => Ok(Box::new(LoopbackPins::new())),
    }
}

#[cfg(feature = "cdev")]
fn open_cdev(pins: &PinConfig, mode: Mode) -> Result<BoxedPins> {
    let mut chip =
        Chip::new(&pins.chip).context(format!("Failed to open GPIO chip: {}", pins.chip))?;

    let mut output = |offset: u32, level: bool| -> Result<CdevPin> {
        let handle = chip
            .get_line(offset)
            .and_then(|line| line.request(LineRequestFlags::OUTPUT, level as u8, CONSUMER))
            .context(format!("Failed to request output line {}", offset))?;
        CdevPin::new(handle).context(format!("Failed to wrap output line {}", offset))
    };

    let chip_select = output(pins.chip_select, true)?;
    let clock = output(pins.clock, mode.idle_clock())?;
    let mosi = output(pins.mosi, false)?;

    let handle = chip
        .get_line(pins.miso)
        .and_then(|line| line.request(LineRequestFlags::INPUT, 0, CONSUMER))
        .context(format!("Failed to request input line {}", pins.miso))?;
    let miso = CdevPin::new(handle).context(format!("Failed to wrap input line {}", pins.miso))?;

    debug!("Claimed cdev lines on {}", pins.chip);
    Ok(Box::new(HalPins::new(
        chip_select,
        clock,
        mosi,
        miso,
        linux_embedded_hal::Delay,
    )))
}

#[cfg(feature = "rpi")]
fn open_rppal(pins: &PinConfig, mode: Mode) -> Result<BoxedPins> {
    let gpio = rppal::gpio::Gpio::new().context("Failed to open Raspberry Pi GPIO")?;

    let pin = |number: u32| {
        u8::try_from(number)
            .context(format!("BCM pin number out of range: {}", number))
            .and_then(|bcm| {
                gpio.get(bcm)
                    .context(format!("Failed to claim BCM pin {}", bcm))
            })
    };

    let chip_select = pin(pins.chip_select)?.into_output_high();
    let clock = if mode.idle_clock() {
        pin(pins.clock)?.into_output_high()
    } else {
        pin(pins.clock)?.into_output_low()
    };
    let mosi = pin(pins.mosi)?.into_output_low();
    let miso = pin(pins.miso)?.into_input();

    debug!("Claimed rppal pins");
    Ok(Box::new(HalPins::new(
        chip_select,
        clock,
        mosi,
        miso,
        rppal::hal::Delay::new(),
    )))
}

#[cfg(not(feature = "cdev"))]
fn open_cdev(_pins: &PinConfig, _mode: Mode) -> Result<BoxedPins> {
    Err(anyhow!("cdev backend not built, enable the `cdev` feature"))
}

#[cfg(not(feature = "rpi"))]
fn open_rppal(_pins: &PinConfig, _mode: Mode) -> Result<BoxedPins> {
    Err(anyhow!("rppal backend not built, enable the `rpi` feature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_backend_needs_no_hardware() {
        let config = crate::config::Config::default();
        let mut pins = open(&config.pins, Mode::Mode0).unwrap();
        pins.set_data_out(true);
        assert!(pins.read_data_in());
    }

    #[cfg(feature = "cdev")]
    #[test]
    fn test_cdev_backend_reports_missing_chip() {
        let mut config = crate::config::Config::default();
        config.pins.backend = Backend::Cdev;
        config.pins.chip = "/nonexistent/gpiochip".to_string();
        let err = open(&config.pins, Mode::Mode0).err().unwrap();
        assert!(err.to_string().contains("/nonexistent/gpiochip"));
    }

    #[cfg(not(feature = "cdev"))]
    #[test]
    fn test_cdev_backend_needs_feature() {
        let mut config = crate::config::Config::default();
        config.pins.backend = Backend::Cdev;
        let err = open(&config.pins, Mode::Mode0).err().unwrap();
        assert!(err.to_string().contains("`cdev` feature"));
    }
}
