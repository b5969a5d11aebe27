use crate::backend::{self, BoxedPins};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use soft_spi::{SharedSpiLink, SpiLink};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// A configured transfer with its payload decoded
struct Job {
    name: String,
    payload: Vec<u8>,
}

pub struct Daemon {
    /// `None` only while the pins are being reopened
    link: Option<SharedSpiLink<BoxedPins>>,
    /// Blocking transfer task, outlives a poll cancelled by a signal
    in_flight: Option<JoinHandle<(Vec<u8>, Vec<u8>)>>,
    config: Config,
    jobs: Vec<Job>,
}

impl Daemon {
    pub fn new(config: Config) -> Result<Self> {
        let link = Daemon::open_link(&config)?;
        let jobs = Daemon::decode_jobs(&config)?;

        info!("Polling interval: {}ms", config.polling.interval_ms);
        info!("Running {} transfer(s) per poll", jobs.len());

        Ok(Daemon {
            link: Some(link),
            in_flight: None,
            config,
            jobs,
        })
    }

    fn open_link(config: &Config) -> Result<SharedSpiLink<BoxedPins>> {
        let pins = backend::open(&config.pins, config.link.mode)?;
        let link = SpiLink::new(pins, config.link.half_period_us, config.link.mode)
            .with_bit_order(config.link.bit_order);

        info!("Soft SPI link initialized: {}, {}", link.mode(), link.bit_order());
        match link.frequency_hz() {
            Some(hz) => info!("Clock: {} Hz (half period {}us)", hz, link.half_period_us()),
            None => info!("Clock: unthrottled (half period 0us)"),
        }

        Ok(SharedSpiLink::new(link))
    }

    fn decode_jobs(config: &Config) -> Result<Vec<Job>> {
        config
            .transfers
            .iter()
            .map(|transfer| {
                info!(
                    "  - Transfer {}: {:?}",
                    transfer.name, transfer.description
                );
                Ok(Job {
                    name: transfer.name.clone(),
                    payload: transfer.payload()?,
                })
            })
            .collect()
    }

    /// Run every configured transfer once, without waiting afterwards.
    ///
    /// Returns the bytes received by each transfer, in configuration order.
    pub async fn run_once(&mut self) -> Result<Vec<Vec<u8>>> {
        let shared = self
            .link
            .clone()
            .ok_or_else(|| anyhow!("Soft SPI link is not open"))?;

        let mut received = Vec::with_capacity(self.jobs.len());
        for index in 0..self.jobs.len() {
            let name = self.jobs[index].name.clone();
            let link = shared.clone();
            let out = self.jobs[index].payload.clone();

            // Bit-banging blocks for the whole frame, keep it off the runtime
            let task = self.in_flight.insert(tokio::task::spawn_blocking(move || {
                let mut rx = vec![0u8; out.len()];
                link.transfer(&mut rx, &out);
                (out, rx)
            }));
            let (out, rx) = task
                .await
                .context(format!("Transfer task failed: {}", name))?;
            self.in_flight = None;

            info!("{}: tx=[{}] rx=[{}]", name, hex(&out), hex(&rx));
            received.push(rx);
        }
        Ok(received)
    }

    pub async fn poll(&mut self) -> Result<()> {
        self.run_once().await?;

        // Sleep for the configured polling interval
        sleep(Duration::from_millis(self.config.polling.interval_ms)).await;

        Ok(())
    }

    pub async fn reload_config(&mut self, new_config: Config) -> Result<()> {
        new_config.validate()?;
        let jobs = Daemon::decode_jobs(&new_config)?;

        if new_config.pins != self.config.pins || new_config.link != self.config.link {
            debug!("Pin or link settings changed, reopening");
            self.release_link().await?;
            self.link = Some(Daemon::open_link(&new_config)?);
        }

        self.config = new_config;
        self.jobs = jobs;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Give the pins back to the system before they are claimed again.
    ///
    /// Fails, keeping the current link, if anything besides the daemon still
    /// holds it.
    async fn release_link(&mut self) -> Result<()> {
        if let Some(task) = self.in_flight.take() {
            debug!("Waiting for in-flight transfer to finish");
            if let Err(e) = task.await {
                warn!("In-flight transfer failed: {}", e);
            }
        }

        if let Some(shared) = self.link.take() {
            match shared.try_unwrap() {
                Ok(link) => {
                    drop(link.release());
                    debug!("Released soft SPI pins");
                }
                Err(shared) => {
                    self.link = Some(shared);
                    return Err(anyhow!("Soft SPI link still in use, not reopening"));
                }
            }
        }
        Ok(())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use soft_spi::{LoopbackPins, Mode, SpiPins};
    use std::sync::{mpsc, Arc};

    /// Loopback pins that note when they are dropped
    struct TrackedPins {
        inner: LoopbackPins,
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SpiPins for TrackedPins {
        fn set_chip_select(&mut self, level: bool) {
            self.inner.set_chip_select(level)
        }

        fn set_clock(&mut self, level: bool) {
            self.inner.set_clock(level)
        }

        fn set_data_out(&mut self, level: bool) {
            self.inner.set_data_out(level)
        }

        fn read_data_in(&mut self) -> bool {
            self.inner.read_data_in()
        }

        fn delay_us(&mut self, us: u32) {
            self.inner.delay_us(us)
        }
    }

    impl Drop for TrackedPins {
        fn drop(&mut self) {
            self.events.lock().push("released");
        }
    }

    #[test]
    fn test_hex_format() {
        assert_eq!(hex(&[0x9f, 0x00, 0x0a]), "9f 00 0a");
        assert_eq!(hex(&[]), "");
    }

    #[tokio::test]
    async fn test_run_once_on_loopback() {
        let mut config = Config::default();
        config.transfers[0].data = "01 b0".to_string();
        let mut daemon = Daemon::new(config).unwrap();

        // MSB-first echoes come back bit-reversed
        let received = daemon.run_once().await.unwrap();
        assert_eq!(received, [vec![0x80, 0x0d]]);
        assert!(daemon.in_flight.is_none());
    }

    #[tokio::test]
    async fn test_run_once_default_payload_is_palindromic() {
        let mut daemon = Daemon::new(Config::default()).unwrap();
        let received = daemon.run_once().await.unwrap();
        assert_eq!(received, [vec![0xa5, 0x5a]]);
    }

    #[tokio::test]
    async fn test_reload_replaces_jobs() {
        let mut daemon = Daemon::new(Config::default()).unwrap();

        let mut config = Config::default();
        config.transfers[0].data = "01 02 03".to_string();
        config.link.mode = Mode::Mode2;
        daemon.reload_config(config).await.unwrap();

        assert_eq!(daemon.jobs[0].payload, [1, 2, 3]);
        let link = daemon.link.as_ref().unwrap().lock();
        assert_eq!(link.mode(), Mode::Mode2);
    }

    #[tokio::test]
    async fn test_reload_rejects_invalid_config() {
        let mut daemon = Daemon::new(Config::default()).unwrap();

        let mut config = Config::default();
        config.transfers.clear();
        assert!(daemon.reload_config(config).await.is_err());
        assert_eq!(daemon.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_waits_for_in_flight_transfer() {
        let mut daemon = Daemon::new(Config::default()).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let pins: BoxedPins = Box::new(TrackedPins {
            inner: LoopbackPins::new(),
            events: events.clone(),
        });
        let shared = SharedSpiLink::new(SpiLink::new(pins, 0, Mode::Mode0));
        daemon.link = Some(shared.clone());

        // Transfer left behind by a cancelled poll, holding the bus lock
        let (locked_tx, locked_rx) = mpsc::channel();
        let log = events.clone();
        daemon.in_flight = Some(tokio::task::spawn_blocking(move || {
            let mut guard = shared.lock();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(50));
            let mut rx = vec![0u8; 1];
            guard.transfer(&mut rx, &[0x01]);
            log.lock().push("transfer done");
            (vec![0x01], rx)
        }));
        locked_rx.recv().unwrap();

        let mut config = Config::default();
        config.link.mode = Mode::Mode2;
        daemon.reload_config(config).await.unwrap();

        assert_eq!(*events.lock(), ["transfer done", "released"]);
        assert!(daemon.in_flight.is_none());
        assert_eq!(daemon.link.as_ref().unwrap().lock().mode(), Mode::Mode2);
    }

    #[tokio::test]
    async fn test_reload_keeps_link_while_shared() {
        let mut daemon = Daemon::new(Config::default()).unwrap();
        let outside = daemon.link.clone().unwrap();

        let mut config = Config::default();
        config.link.mode = Mode::Mode3;
        assert!(daemon.reload_config(config).await.is_err());

        assert_eq!(daemon.link.as_ref().unwrap().lock().mode(), Mode::Mode0);
        assert_eq!(daemon.config.link.mode, Mode::Mode0);
        drop(outside);
    }
}
