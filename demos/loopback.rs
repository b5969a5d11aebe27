/// Loopback demo: runs every mode and bit order over a software MOSI->MISO wire
///
/// MSB-first links store the sampled bit of slot i at bit i, so their echo
/// comes back bit-reversed; LSB-first echoes are identical.

use anyhow::Result;
use log::{error, info};
use soft_spi::{BitOrder, LoopbackPins, Mode, SpiLink};

fn main() -> Result<()> {
    // Initialize logging
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .ok();

    info!("Soft SPI loopback demo starting...");

    let payload = [0x9f, 0x01, 0xb0, 0xa5];
    let mut failures = 0;

    for mode in Mode::ALL {
        for bit_order in [BitOrder::MsbFirst, BitOrder::LsbFirst] {
            let mut link = SpiLink::new(LoopbackPins::new(), 5, mode).with_bit_order(bit_order);

            let mut rx = [0u8; 4];
            link.transfer(&mut rx, &payload);

            let expected: Vec<u8> = match bit_order {
                BitOrder::MsbFirst => payload.iter().map(|b| b.reverse_bits()).collect(),
                BitOrder::LsbFirst => payload.to_vec(),
            };

            let pins = link.pins();
            info!(
                "{} {}: tx={:02x?} rx={:02x?} edges={} bus time={}us",
                mode,
                bit_order,
                payload,
                rx,
                pins.edges(),
                pins.elapsed_us()
            );

            if rx[..] == expected[..] {
                info!("✓ Echo verified");
            } else {
                error!("✗ Echo mismatch: expected {:02x?}", expected);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(anyhow::anyhow!("{} loopback run(s) failed", failures));
    }

    info!("Soft SPI loopback demo completed");
    Ok(())
}
