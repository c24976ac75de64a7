//! Fire-and-forget UDP commands for a LimitlessLED bridge.

use crate::prelude::*;

use tokio::net::UdpSocket;

pub const ALL_OFF: [u8; 3] = [0x21, 0x00, 0x55];
pub const ALL_ON: [u8; 3] = [0x22, 0x00, 0x55];

// default status commands; both are plain colour-set packets
pub const STATUS_OFFLINE: [u8; 3] = [0x20, 0x80, 0x55];
pub const STATUS_ONLINE: [u8; 3] = [0x20, 0x60, 0x55];

#[derive(Clone, Debug)]
pub struct LimitlessLed {
    udp: String,
}

impl LimitlessLed {
    pub fn new(config: &config::LimitlessLed) -> Self {
        Self {
            udp: config.udp().to_string(),
        }
    }

    /// Sends `command` once. The bridge never replies.
    pub async fn command(&self, command: &[u8]) -> Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket
            .connect(self.udp.as_str())
            .await
            .map_err(|err| anyhow!("limitlessled: cannot reach {}: {}", self.udp, err))?;

        debug!("limitlessled {}: TX {:02x?}", self.udp, command);
        let sent = socket.send(command).await?;
        if sent != command.len() {
            bail!("limitlessled: short send, {} of {} bytes", sent, command.len());
        }

        Ok(())
    }
}

/// Shows whether the inverter is producing by sending one of two
/// configured commands after every reading.
pub struct StatusLight {
    led: LimitlessLed,
    offline_command: Vec<u8>,
    online_command: Vec<u8>,
    channels: Channels,
}

impl StatusLight {
    pub fn new(config: &config::LimitlessLed, channels: Channels) -> Self {
        Self {
            led: LimitlessLed::new(config),
            offline_command: config.offline_command().to_vec(),
            online_command: config.online_command().to_vec(),
            channels,
        }
    }

    pub fn command_for(&self, reading: &Reading) -> &[u8] {
        if reading.is_idle() {
            &self.offline_command
        } else {
            &self.online_command
        }
    }

    pub async fn start(&self) -> Result<()> {
        let mut readings = self.channels.readings.subscribe();

        loop {
            match readings.recv().await {
                Ok(reading) => {
                    if let Err(e) = self.led.command(self.command_for(&reading)).await {
                        warn!("{}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("limitlessled: skipped {} readings", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_command_verbatim() -> Result<()> {
        let bridge = UdpSocket::bind("127.0.0.1:0").await?;
        let config = config::LimitlessLed {
            enabled: true,
            udp: bridge.local_addr()?.to_string(),
            offline_command: STATUS_OFFLINE.to_vec(),
            online_command: STATUS_ONLINE.to_vec(),
        };

        let led = LimitlessLed::new(&config);
        led.command(&ALL_ON).await?;

        let mut buf = [0u8; 16];
        let len = tokio::time::timeout(std::time::Duration::from_secs(5), bridge.recv(&mut buf)).await??;
        assert_eq!(&buf[..len], &ALL_ON);

        Ok(())
    }

    #[tokio::test]
    async fn unresolvable_address_is_an_error() {
        let config = config::LimitlessLed {
            enabled: true,
            udp: "not a host".to_string(),
            offline_command: STATUS_OFFLINE.to_vec(),
            online_command: STATUS_ONLINE.to_vec(),
        };

        assert!(LimitlessLed::new(&config).command(&ALL_OFF).await.is_err());
    }

    #[test]
    fn status_follows_lifetime_energy() {
        let config = config::LimitlessLed {
            enabled: true,
            udp: "127.0.0.1:8899".to_string(),
            offline_command: vec![1],
            online_command: vec![2],
        };
        let light = StatusLight::new(&config, Channels::new());

        assert_eq!(light.command_for(&Reading::default()), &[1]);
        let producing = Reading {
            e_total: 1234.5,
            ..Default::default()
        };
        assert_eq!(light.command_for(&producing), &[2]);
    }

    #[tokio::test]
    async fn status_light_sends_on_reading() -> Result<()> {
        let bridge = UdpSocket::bind("127.0.0.1:0").await?;
        let config = config::LimitlessLed {
            enabled: true,
            udp: bridge.local_addr()?.to_string(),
            offline_command: STATUS_OFFLINE.to_vec(),
            online_command: STATUS_ONLINE.to_vec(),
        };
        let channels = Channels::new();
        let light = StatusLight::new(&config, channels.clone());
        let task = tokio::spawn(async move { light.start().await });

        // wait for the light to subscribe
        while channels.readings.receiver_count() == 0 {
            tokio::task::yield_now().await;
        }
        channels.readings.send(Reading::default())?;

        let mut buf = [0u8; 16];
        let len = tokio::time::timeout(std::time::Duration::from_secs(5), bridge.recv(&mut buf)).await??;
        assert_eq!(&buf[..len], &STATUS_OFFLINE);

        task.abort();
        Ok(())
    }
}
