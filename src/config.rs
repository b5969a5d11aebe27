use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use soft_spi::{BitOrder, Mode};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub link: LinkConfig,
    pub pins: PinConfig,
    pub polling: PollingConfig,
    pub transfers: Vec<TransferConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub mode: Mode,
    #[serde(default)]
    pub bit_order: BitOrder,
    pub half_period_us: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Linux GPIO character device through linux-embedded-hal
    Cdev,
    /// Raspberry Pi BCM GPIO through rppal
    Rppal,
    /// In-memory MOSI to MISO wire, no hardware needed
    Loopback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinConfig {
    pub backend: Backend,
    /// GPIO chip device, only used by the cdev backend
    #[serde(default = "default_chip")]
    pub chip: String,
    pub chip_select: u32,
    pub clock: u32,
    pub mosi: u32,
    pub miso: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    pub name: String,
    /// Hex bytes, e.g. "9f 00 00" or "0x9f,0x00"
    pub data: String,
    pub description: Option<String>,
}

fn default_chip() -> String {
    "/dev/gpiochip0".to_string()
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).context("Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.transfers.is_empty() {
            return Err(anyhow!("Configuration error: no transfers configured"));
        }

        let lines = [
            self.pins.chip_select,
            self.pins.clock,
            self.pins.mosi,
            self.pins.miso,
        ];
        let unique: HashSet<u32> = lines.iter().copied().collect();
        if unique.len() != lines.len() && self.pins.backend != Backend::Loopback {
            return Err(anyhow!(
                "Configuration error: chip_select, clock, mosi and miso must be distinct lines"
            ));
        }

        for transfer in &self.transfers {
            transfer.payload()?;
        }
        Ok(())
    }
}

impl TransferConfig {
    /// Decode the hex payload
    pub fn payload(&self) -> Result<Vec<u8>> {
        let byte = Regex::new(r"^(?:0[xX])?([0-9a-fA-F]{1,2})$")?;

        self.data
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| {
                let digits = byte
                    .captures(token)
                    .and_then(|caps| caps.get(1))
                    .ok_or_else(|| {
                        anyhow!(
                            "Invalid byte `{}` in transfer `{}`",
                            token,
                            self.name
                        )
                    })?;
                u8::from_str_radix(digits.as_str(), 16)
                    .context(format!("Invalid byte `{}` in transfer `{}`", token, self.name))
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            link: LinkConfig {
                mode: Mode::Mode0,
                bit_order: BitOrder::MsbFirst,
                half_period_us: 5,
            },
            pins: PinConfig {
                backend: Backend::Loopback,
                chip: default_chip(),
                chip_select: 8,
                clock: 11,
                mosi: 10,
                miso: 9,
            },
            polling: PollingConfig { interval_ms: 1000 },
            transfers: vec![TransferConfig {
                name: "echo".to_string(),
                data: "a5 5a".to_string(),
                description: None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
link:
  mode: 3
  bit_order: lsb_first
  half_period_us: 10
pins:
  backend: cdev
  chip_select: 8
  clock: 11
  mosi: 10
  miso: 9
polling:
  interval_ms: 250
transfers:
  - name: jedec_id
    data: "9f 00 00 00"
    description: Read flash JEDEC id
  - name: status
    data: "0x05,0x00"
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.link.mode, Mode::Mode3);
        assert_eq!(config.link.bit_order, BitOrder::LsbFirst);
        assert_eq!(config.pins.backend, Backend::Cdev);
        assert_eq!(config.pins.chip, "/dev/gpiochip0");
        assert_eq!(config.transfers[0].payload().unwrap(), [0x9f, 0, 0, 0]);
        assert_eq!(config.transfers[1].payload().unwrap(), [0x05, 0x00]);
    }

    #[test]
    fn test_bit_order_defaults_to_msb() {
        let yaml = SAMPLE.replace("  bit_order: lsb_first\n", "");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.link.bit_order, BitOrder::MsbFirst);
    }

    #[test]
    fn test_reject_out_of_range_mode() {
        let yaml = SAMPLE.replace("mode: 3", "mode: 4");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("unsupported transmission mode 4"));
    }

    #[test]
    fn test_reject_bad_payload() {
        let yaml = SAMPLE.replace("0x05,0x00", "0x05 zz");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("`zz`"));
    }

    #[test]
    fn test_reject_shared_lines() {
        let yaml = SAMPLE.replace("miso: 9", "miso: 10");
        assert!(Config::from_yaml(&yaml).is_err());

        let yaml = yaml.replace("backend: cdev", "backend: loopback");
        assert!(Config::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(Config::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_empty_payload() {
        let transfer = TransferConfig {
            name: "nothing".to_string(),
            data: "  ".to_string(),
            description: None,
        };
        assert!(transfer.payload().unwrap().is_empty());
    }
}
