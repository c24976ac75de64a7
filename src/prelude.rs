pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;
pub use tokio::sync::broadcast;

pub use crate::{
    channels::Channels,
    cms2000::{self, Cms2000, Reading},
    config::{self, Config},
    coordinator::{self, Coordinator},
    currentcost, limitlessled,
    options::Options,
    scheduler::{self, Scheduler},
};
