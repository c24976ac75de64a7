use crate::prelude::*;

use crate::coordinator::{ChannelData, Trigger};
use tokio::io::AsyncRead;

/// Decides when readings are taken: once per CurrentCost line when a monitor
/// is attached, otherwise on a fixed interval.
#[derive(Clone)]
pub struct Scheduler {
    config: Config,
    channels: Channels,
}

impl Scheduler {
    pub fn new(config: Config, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        match self.config.currentcost() {
            Some(cc) => {
                let reader = currentcost::open_serial(cc.device(), cc.baudrate())?;
                self.follow_currentcost(reader).await
            }
            None => self.every(std::time::Duration::from_secs(self.config.cms2000.poll_interval())).await,
        }
    }

    pub async fn every(&self, period: std::time::Duration) -> Result<()> {
        info!("scheduler: taking a reading every {}s", period.as_secs());
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            self.trigger(Trigger::Interval)?;
        }
    }

    pub async fn follow_currentcost<R>(&self, mut reader: currentcost::MessageReader<R>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        info!("scheduler: taking a reading for every currentcost message");

        loop {
            match reader.read_message().await {
                Ok(Some(msg)) => self.trigger(Trigger::CurrentCost(msg))?,
                Ok(None) => bail!("currentcost stream ended"),
                Err(e @ (currentcost::Error::LineEmpty | currentcost::Error::LineTooLong)) => {
                    warn!("currentcost: {}", e);
                }
                Err(e) => bail!("currentcost: {}", e),
            }
        }
    }

    fn trigger(&self, trigger: Trigger) -> Result<()> {
        self.channels
            .to_coordinator
            .send(ChannelData::Trigger(trigger))
            .map_err(|_| anyhow!("coordinator is not listening"))?;
        Ok(())
    }
}
