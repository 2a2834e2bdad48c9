mod cache;
mod reconnect;
mod socket;

pub use cache::{ActivityCache, TodayStats};
pub use reconnect::{Reconnect, ReconnectPolicy, Step, SyncStatus};
pub use socket::{Command, Link, SyncClient, Transport, TransportError};
