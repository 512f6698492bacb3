//! Local network discovery of robots

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// TXT record key carrying the advertised robot id
pub const ATTR_PROPERTIES_ID: &str = "id";

/// A zeroconf (mDNS) service announcement
///
/// Everything in here is an unauthenticated hint. Only `host` is used to
/// contact the robot; identity is always taken from the robot itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroconfServiceInfo {
    pub host: String,
    pub hostname: String,
    pub port: u16,
    /// Service type, e.g. `_aicu-http._tcp.local.`
    #[serde(rename = "type")]
    pub service_type: String,
    /// Advertised service name
    pub name: String,
    /// TXT record properties
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl ZeroconfServiceInfo {
    /// The robot id advertised in the TXT record, if any
    pub fn advertised_id(&self) -> Option<&str> {
        self.properties.get(ATTR_PROPERTIES_ID).map(String::as_str)
    }
}

/// Emits service announcements as they arrive
#[async_trait]
pub trait DiscoverySource: Send {
    /// Wait for the next announcement; `None` once the source is exhausted
    async fn next_announcement(&mut self) -> Option<ZeroconfServiceInfo>;
}

#[async_trait]
impl DiscoverySource for mpsc::Receiver<ZeroconfServiceInfo> {
    async fn next_announcement(&mut self) -> Option<ZeroconfServiceInfo> {
        let info = self.recv().await?;
        debug!(
            "Announcement {} from {} (id {:?})",
            info.name,
            info.host,
            info.advertised_id()
        );
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ZeroconfServiceInfo {
        ZeroconfServiceInfo {
            host: "1.2.3.4".to_string(),
            hostname: "myROMY".to_string(),
            port: 8080,
            service_type: "_aicu-http._tcp.local.".to_string(),
            name: "myROMY".to_string(),
            properties: HashMap::from([(ATTR_PROPERTIES_ID.to_string(), "aicu-xyz".to_string())]),
        }
    }

    #[test]
    fn test_advertised_id() {
        assert_eq!(info().advertised_id(), Some("aicu-xyz"));

        let mut bare = info();
        bare.properties.clear();
        assert_eq!(bare.advertised_id(), None);
    }

    #[tokio::test]
    async fn test_channel_source() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(info()).await.unwrap();
        drop(tx);

        assert_eq!(rx.next_announcement().await.map(|i| i.host), Some("1.2.3.4".to_string()));
        assert!(rx.next_announcement().await.is_none());
    }
}
