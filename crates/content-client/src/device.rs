//! Device and network profile.
//!
//! Classifies the runtime once at startup and keeps the result in a watch
//! channel. Network events (online, offline, connection change) update it;
//! clients read the current value before each acquisition to pick retry
//! counts, timeouts, and cache TTLs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use shared::config::{CacheConfig, DeviceConfig, ResilienceConfig};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::retry::RetryPolicy;

static MOBILE_USER_AGENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)android|webos|iphone|ipad|ipod|blackberry|iemobile|opera mini|mobile")
        .expect("mobile user agent pattern is valid")
});

/// Cores or gigabytes at or below which a device counts as low end
const LOW_END_CORES: u32 = 4;
const LOW_END_MEMORY_GB: f64 = 4.0;

/// Effective connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    Wifi,
    Ethernet,
    Unknown,
}

impl ConnectionType {
    /// Parse a connection label; unrecognized labels are `Unknown`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => ConnectionType::Slow2g,
            "2g" => ConnectionType::TwoG,
            "3g" => ConnectionType::ThreeG,
            "4g" => ConnectionType::FourG,
            "wifi" => ConnectionType::Wifi,
            "ethernet" => ConnectionType::Ethernet,
            _ => ConnectionType::Unknown,
        }
    }

    pub fn is_slow(&self) -> bool {
        matches!(
            self,
            ConnectionType::Slow2g | ConnectionType::TwoG | ConnectionType::ThreeG
        )
    }
}

/// Raw signals the profile is computed from
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSignals {
    pub user_agent: Option<String>,
    pub hardware_concurrency: Option<u32>,
    pub device_memory_gb: Option<f64>,
    pub connection_type: ConnectionType,
    pub online: bool,
}

impl DeviceSignals {
    /// Configured overrides, with core count detected from the host
    pub fn from_config(config: &DeviceConfig) -> Self {
        let hardware_concurrency = config.hardware_concurrency.or_else(|| {
            std::thread::available_parallelism()
                .ok()
                .map(|n| n.get() as u32)
        });

        Self {
            user_agent: config.user_agent.clone(),
            hardware_concurrency,
            device_memory_gb: config.device_memory_gb,
            connection_type: config
                .connection_type
                .as_deref()
                .map(ConnectionType::from_label)
                .unwrap_or(ConnectionType::Unknown),
            online: !config.offline,
        }
    }
}

/// Classified runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceProfile {
    pub is_mobile: bool,
    pub is_low_end: bool,
    pub connection_type: ConnectionType,
    pub is_offline: bool,
}

impl DeviceProfile {
    pub fn detect(signals: &DeviceSignals) -> Self {
        let is_mobile = signals
            .user_agent
            .as_deref()
            .map(|ua| MOBILE_USER_AGENT.is_match(ua))
            .unwrap_or(false);

        let is_low_end = signals
            .hardware_concurrency
            .map(|cores| cores <= LOW_END_CORES)
            .unwrap_or(false)
            || signals
                .device_memory_gb
                .map(|gb| gb <= LOW_END_MEMORY_GB)
                .unwrap_or(false);

        Self {
            is_mobile,
            is_low_end,
            connection_type: signals.connection_type,
            is_offline: !signals.online,
        }
    }

    /// Online desktop with an unknown connection
    pub fn desktop() -> Self {
        Self {
            is_mobile: false,
            is_low_end: false,
            connection_type: ConnectionType::Unknown,
            is_offline: false,
        }
    }

    /// Mobile device or slow link
    pub fn is_constrained(&self) -> bool {
        self.is_mobile || self.connection_type.is_slow()
    }

    /// Apply a network event; returns whether the profile changed
    pub fn apply(&mut self, event: NetworkEvent) -> bool {
        let before = *self;
        match event {
            NetworkEvent::Online => self.is_offline = false,
            NetworkEvent::Offline => self.is_offline = true,
            NetworkEvent::ConnectionChanged(connection) => self.connection_type = connection,
        }
        before != *self
    }
}

/// External network notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Online,
    Offline,
    ConnectionChanged(ConnectionType),
}

/// Owner of the current profile; clients hold receivers
pub struct DeviceMonitor {
    sender: watch::Sender<DeviceProfile>,
}

impl DeviceMonitor {
    pub fn new(profile: DeviceProfile) -> Self {
        info!(
            is_mobile = profile.is_mobile,
            is_low_end = profile.is_low_end,
            connection = ?profile.connection_type,
            is_offline = profile.is_offline,
            "Device profile detected"
        );
        let (sender, _) = watch::channel(profile);
        Self { sender }
    }

    pub fn detect(signals: &DeviceSignals) -> Self {
        Self::new(DeviceProfile::detect(signals))
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceProfile> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> DeviceProfile {
        *self.sender.borrow()
    }

    pub fn apply(&self, event: NetworkEvent) {
        let changed = self.sender.send_if_modified(|profile| profile.apply(event));
        if changed {
            info!(event = ?event, "Device profile updated");
        }
    }
}

/// Policy constants selected by the current profile
#[derive(Debug, Clone)]
pub struct DevicePolicy {
    resilience: ResilienceConfig,
    cache: CacheConfig,
}

impl DevicePolicy {
    pub fn new(resilience: ResilienceConfig, cache: CacheConfig) -> Self {
        Self { resilience, cache }
    }

    pub fn max_retries(&self, profile: &DeviceProfile) -> u32 {
        if profile.is_constrained() {
            self.resilience.mobile_retries
        } else {
            self.resilience.desktop_retries
        }
    }

    /// Per-attempt timeout; slow hardware gets the mobile budget too
    pub fn request_timeout(&self, profile: &DeviceProfile) -> Duration {
        if profile.is_constrained() || profile.is_low_end {
            Duration::from_millis(self.resilience.mobile_timeout_ms)
        } else {
            Duration::from_millis(self.resilience.desktop_timeout_ms)
        }
    }

    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.metadata_ttl_seconds)
    }

    pub fn list_ttl(&self, profile: &DeviceProfile) -> Duration {
        if profile.is_mobile {
            Duration::from_secs(self.cache.mobile_list_ttl_seconds)
        } else {
            Duration::from_secs(self.cache.list_ttl_seconds)
        }
    }

    pub fn retry_policy(&self, profile: &DeviceProfile) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries(profile),
            Duration::from_millis(self.resilience.backoff_base_ms),
            Duration::from_millis(self.resilience.backoff_cap_ms),
        )
    }
}

impl Default for DevicePolicy {
    fn default() -> Self {
        Self::new(ResilienceConfig::default(), CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
    const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";

    fn signals(user_agent: &str) -> DeviceSignals {
        DeviceSignals {
            user_agent: Some(user_agent.to_string()),
            hardware_concurrency: Some(8),
            device_memory_gb: Some(16.0),
            connection_type: ConnectionType::Wifi,
            online: true,
        }
    }

    #[test]
    fn test_detect_mobile_user_agent() {
        assert!(DeviceProfile::detect(&signals(IPHONE)).is_mobile);
        assert!(!DeviceProfile::detect(&signals(DESKTOP)).is_mobile);
    }

    #[test]
    fn test_detect_low_end() {
        let mut low = signals(DESKTOP);
        low.hardware_concurrency = Some(2);
        assert!(DeviceProfile::detect(&low).is_low_end);

        let mut small_memory = signals(DESKTOP);
        small_memory.device_memory_gb = Some(2.0);
        assert!(DeviceProfile::detect(&small_memory).is_low_end);

        assert!(!DeviceProfile::detect(&signals(DESKTOP)).is_low_end);
    }

    #[test]
    fn test_connection_labels() {
        assert_eq!(ConnectionType::from_label("slow-2g"), ConnectionType::Slow2g);
        assert_eq!(ConnectionType::from_label("4G"), ConnectionType::FourG);
        assert_eq!(ConnectionType::from_label("carrier pigeon"), ConnectionType::Unknown);
        assert!(ConnectionType::ThreeG.is_slow());
        assert!(!ConnectionType::Wifi.is_slow());
    }

    #[test]
    fn test_policy_by_profile() {
        let policy = DevicePolicy::default();
        let desktop = DeviceProfile::detect(&signals(DESKTOP));
        let mobile = DeviceProfile::detect(&signals(IPHONE));

        assert_eq!(policy.max_retries(&desktop), 1);
        assert_eq!(policy.max_retries(&mobile), 3);
        assert_eq!(policy.request_timeout(&desktop), Duration::from_secs(10));
        assert_eq!(policy.request_timeout(&mobile), Duration::from_secs(15));
        assert_eq!(policy.list_ttl(&desktop), Duration::from_secs(600));
        assert_eq!(policy.list_ttl(&mobile), Duration::from_secs(300));
        assert_eq!(policy.metadata_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_slow_connection_gets_mobile_retries() {
        let policy = DevicePolicy::default();
        let mut slow = signals(DESKTOP);
        slow.connection_type = ConnectionType::TwoG;
        assert_eq!(policy.max_retries(&DeviceProfile::detect(&slow)), 3);
    }

    #[tokio::test]
    async fn test_monitor_applies_network_events() {
        let monitor = DeviceMonitor::new(DeviceProfile::desktop());
        let mut receiver = monitor.subscribe();

        monitor.apply(NetworkEvent::Offline);
        assert!(receiver.has_changed().unwrap());
        assert!(receiver.borrow_and_update().is_offline);

        // Repeating the same state is not a change
        monitor.apply(NetworkEvent::Offline);
        assert!(!receiver.has_changed().unwrap());

        monitor.apply(NetworkEvent::ConnectionChanged(ConnectionType::ThreeG));
        monitor.apply(NetworkEvent::Online);
        let current = monitor.current();
        assert!(!current.is_offline);
        assert_eq!(current.connection_type, ConnectionType::ThreeG);
    }

    #[test]
    fn test_signals_from_config() {
        let config = DeviceConfig {
            user_agent: Some(IPHONE.to_string()),
            hardware_concurrency: Some(6),
            device_memory_gb: None,
            connection_type: Some("3g".to_string()),
            offline: true,
        };
        let signals = DeviceSignals::from_config(&config);
        assert_eq!(signals.hardware_concurrency, Some(6));
        assert_eq!(signals.connection_type, ConnectionType::ThreeG);
        assert!(!signals.online);

        let profile = DeviceProfile::detect(&signals);
        assert!(profile.is_mobile && profile.is_offline);
    }
}
