use crate::prelude::*;

use serde::Deserialize;
use serde_yaml;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub cms2000: Cms2000,
    pub currentcost: Option<CurrentCost>,
    pub limitlessled: Option<LimitlessLed>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Cms2000 {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Cms2000 {
    pub host: String,
    pub port: u16,

    pub read_timeout: Option<u64>,
    pub max_unrecognised_frames: Option<usize>,
    pub use_tcp_nodelay: Option<bool>,
    pub poll_interval: Option<u64>,
}
impl Cms2000 {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upper bound on one whole reading cycle, in seconds.
    pub fn read_timeout(&self) -> u64 {
        self.read_timeout.unwrap_or(30)
    }

    pub fn max_unrecognised_frames(&self) -> usize {
        self.max_unrecognised_frames.unwrap_or(64)
    }

    pub fn use_tcp_nodelay(&self) -> bool {
        self.use_tcp_nodelay.unwrap_or(true)
    }

    pub fn poll_interval(&self) -> u64 {
        self.poll_interval.unwrap_or(60)
    }
} // }}}

// CurrentCost {{{
#[derive(Clone, Debug, Deserialize)]
pub struct CurrentCost {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub device: String,
    #[serde(default = "Config::default_currentcost_baudrate")]
    pub baudrate: u32,
}
impl CurrentCost {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }
} // }}}

// LimitlessLed {{{
#[derive(Clone, Debug, Deserialize)]
pub struct LimitlessLed {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub udp: String,

    #[serde(default = "Config::default_led_offline_command")]
    pub offline_command: Vec<u8>,
    #[serde(default = "Config::default_led_online_command")]
    pub online_command: Vec<u8>,
}
impl LimitlessLed {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn udp(&self) -> &str {
        &self.udp
    }

    pub fn offline_command(&self) -> &[u8] {
        &self.offline_command
    }

    pub fn online_command(&self) -> &[u8] {
        &self.online_command
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  CMS2000:");
        info!("    Host: {}", self.cms2000.host);
        info!("    Port: {}", self.cms2000.port);
        info!("    Read Timeout: {}s", self.cms2000.read_timeout());
        info!("    Max Unrecognised Frames: {}", self.cms2000.max_unrecognised_frames());
        info!("    TCP NoDelay: {}", self.cms2000.use_tcp_nodelay());
        info!("    Poll Interval: {}s", self.cms2000.poll_interval());

        match &self.currentcost {
            Some(cc) if cc.enabled => {
                info!("  CurrentCost: enabled");
                info!("    Device: {}", cc.device);
                info!("    Baudrate: {}", cc.baudrate);
            }
            _ => info!("  CurrentCost: disabled"),
        }

        match &self.limitlessled {
            Some(led) if led.enabled => {
                info!("  LimitlessLED: enabled");
                info!("    UDP: {}", led.udp);
            }
            _ => info!("  LimitlessLED: disabled"),
        }

        info!("  Log Level: {}", self.loglevel);
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn currentcost(&self) -> Option<&CurrentCost> {
        self.currentcost.as_ref().filter(|c| c.enabled())
    }

    pub fn limitlessled(&self) -> Option<&LimitlessLed> {
        self.limitlessled.as_ref().filter(|l| l.enabled())
    }

    fn validate(&self) -> Result<()> {
        if self.cms2000.host.is_empty() {
            bail!("cms2000.host cannot be empty");
        }
        if self.cms2000.port == 0 {
            bail!("cms2000.port must be between 1 and 65535");
        }
        if self.cms2000.read_timeout() == 0 {
            bail!("cms2000.read_timeout must be greater than 0");
        }
        if self.cms2000.poll_interval() == 0 {
            bail!("cms2000.poll_interval must be greater than 0");
        }

        if let Some(cc) = self.currentcost() {
            if cc.device.is_empty() {
                bail!("currentcost.device cannot be empty");
            }
            if cc.baudrate == 0 {
                bail!("currentcost.baudrate must be greater than 0");
            }
        }

        if let Some(led) = self.limitlessled() {
            if led.udp.rsplit_once(':').and_then(|(_, p)| p.parse::<u16>().ok()).is_none() {
                bail!("limitlessled.udp must be host:port, got {}", led.udp);
            }
            if led.offline_command.is_empty() || led.online_command.is_empty() {
                bail!("limitlessled commands cannot be empty");
            }
        }

        Ok(())
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_currentcost_baudrate() -> u32 {
        57600
    }

    fn default_led_offline_command() -> Vec<u8> {
        limitlessled::STATUS_OFFLINE.to_vec()
    }

    fn default_led_online_command() -> Vec<u8> {
        limitlessled::STATUS_ONLINE.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() -> Result<()> {
        let config = Config::from_yaml("cms2000:\n  host: 10.0.0.5\n  port: 1234\n")?;

        assert_eq!(config.cms2000.address(), "10.0.0.5:1234");
        assert_eq!(config.cms2000.read_timeout(), 30);
        assert_eq!(config.cms2000.max_unrecognised_frames(), 64);
        assert!(config.cms2000.use_tcp_nodelay());
        assert_eq!(config.cms2000.poll_interval(), 60);
        assert_eq!(config.loglevel, "info");
        assert!(config.currentcost().is_none());
        assert!(config.limitlessled().is_none());

        Ok(())
    }

    #[test]
    fn full_config() -> Result<()> {
        let yaml = r#"
loglevel: debug
cms2000:
  host: inverter.lan
  port: 9999
  read_timeout: 10
  max_unrecognised_frames: 5
  use_tcp_nodelay: false
currentcost:
  device: /dev/ttyUSB0
limitlessled:
  udp: 192.168.1.60:8899
  online_command: [32, 176, 85]
"#;
        let config = Config::from_yaml(yaml)?;

        assert_eq!(config.cms2000.read_timeout(), 10);
        assert_eq!(config.cms2000.max_unrecognised_frames(), 5);
        assert!(!config.cms2000.use_tcp_nodelay());

        let cc = config.currentcost().expect("currentcost enabled");
        assert_eq!(cc.device(), "/dev/ttyUSB0");
        assert_eq!(cc.baudrate(), 57600);

        let led = config.limitlessled().expect("limitlessled enabled");
        assert_eq!(led.offline_command(), &limitlessled::STATUS_OFFLINE[..]);
        assert_eq!(led.online_command(), &[0x20, 0xB0, 0x55][..]);

        Ok(())
    }

    #[test]
    fn disabled_sections_are_hidden() -> Result<()> {
        let yaml = "cms2000: {host: a, port: 1}\ncurrentcost: {enabled: false, device: ''}\n";
        let config = Config::from_yaml(yaml)?;
        assert!(config.currentcost().is_none());
        Ok(())
    }

    #[test]
    fn rejects_zero_port() {
        assert!(Config::from_yaml("cms2000: {host: a, port: 0}").is_err());
    }

    #[test]
    fn rejects_bad_led_address() {
        let yaml = "cms2000: {host: a, port: 1}\nlimitlessled: {udp: nowhere}\n";
        assert!(Config::from_yaml(yaml).is_err());
    }
}
