use crate::prelude::*;

use std::sync::Arc;
use tokio::sync::Mutex;

/// What prompted a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Interval,
    CurrentCost(currentcost::Message),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Trigger(Trigger),
    Shutdown,
}

/// Takes a reading from the inverter whenever something asks for one and
/// publishes the result on `channels.readings`.
#[derive(Clone)]
pub struct Coordinator {
    cms2000: Arc<Mutex<Cms2000>>,
    channels: Channels,
}

impl Coordinator {
    pub fn new(config: &Config, channels: Channels) -> Self {
        Self {
            cms2000: Arc::new(Mutex::new(Cms2000::new(config.cms2000.clone()))),
            channels,
        }
    }

    pub fn stop(&self) {
        let _ = self.channels.to_coordinator.send(ChannelData::Shutdown);
    }

    pub async fn start(&self) -> Result<()> {
        let mut receiver = self.channels.to_coordinator.subscribe();

        loop {
            match receiver.recv().await {
                Ok(ChannelData::Shutdown) => {
                    info!("coordinator: received shutdown signal");
                    break;
                }
                Ok(ChannelData::Trigger(trigger)) => {
                    if let Trigger::CurrentCost(msg) = &trigger {
                        info!("currentcost: {}", msg);
                    }
                    // a failed reading is retried on the next trigger
                    if let Err(e) = self.take_reading().await {
                        error!("cms2000: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("coordinator: skipped {} triggers while busy", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    bail!("coordinator channel closed");
                }
            }
        }

        Ok(())
    }

    pub async fn take_reading(&self) -> Result<Reading> {
        let reading = self.cms2000.lock().await.get_reading().await?;

        info!("cms2000: {}", reading);
        debug!("cms2000: {}", serde_json::to_string(&reading)?);

        // nobody listening is fine
        let _ = self.channels.readings.send(reading);

        Ok(reading)
    }
}
