//! Gateway configuration, loadable from a TOML file and overridable by
//! environment variables (`RINGGATE_*`), following the teacher's
//! per-section `Default` impl convention.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub ring: RingConfig,
    pub stream: StreamConfig,
    pub s3: ObjectConfig,
    pub throttle: ThrottleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            ring: RingConfig::default(),
            stream: StreamConfig::default(),
            s3: ObjectConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply `RINGGATE_*`
    /// environment overrides, falling back to defaults if `path` is
    /// `None`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("RINGGATE").separator("__"));
        builder.build()?.try_deserialize()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the HTTP gateway listens on.
    pub listen: SocketAddr,
    /// Address the Prometheus scrape endpoint listens on.
    pub metrics_listen: SocketAddr,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8443".parse().unwrap(),
            metrics_listen: "0.0.0.0:9090".parse().unwrap(),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RingConfig {
    /// Placement refresh interval, seconds (§4.1 default 1800s).
    pub refresh_interval_secs: u64,
    pub vnode_hash_interval: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 1800,
            vnode_hash_interval: 1 << 24,
        }
    }
}

impl RingConfig {
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Socket idle timeout, seconds (§5 default 120s).
    pub socket_idle_timeout_secs: u64,
    /// Check-Stream idle timeout, seconds (§5 default 45s).
    pub check_stream_idle_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            socket_idle_timeout_secs: 120,
            check_stream_idle_timeout_secs: 45,
        }
    }
}

impl StreamConfig {
    #[must_use]
    pub fn socket_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_idle_timeout_secs)
    }

    #[must_use]
    pub fn check_stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.check_stream_idle_timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Maximum accepted object body size, bytes.
    pub max_object_size: u64,
    /// Default durability level when `Durability-Level` is absent.
    pub default_durability_level: u8,
    /// Maximum durability level a client may request.
    pub max_durability_level: u8,
    /// Default listing page limit.
    pub default_list_limit: u32,
    /// Maximum listing page limit a client may request.
    pub max_list_limit: u32,
    /// Maximum total bytes of `m-*` user metadata headers.
    pub max_user_metadata_bytes: usize,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            max_object_size: 5 * 1024 * 1024 * 1024 * 1024,
            default_durability_level: 2,
            max_durability_level: 6,
            default_list_limit: 1024,
            max_list_limit: 1024,
            max_user_metadata_bytes: 4 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Number of concurrently admitted requests.
    pub max_concurrent: usize,
    /// Maximum FIFO wait-queue depth before rejecting with `Throttled`.
    pub max_queue_depth: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 256,
            max_queue_depth: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.ring.refresh_interval_secs, 1800);
        assert_eq!(config.stream.socket_idle_timeout_secs, 120);
        assert_eq!(config.stream.check_stream_idle_timeout_secs, 45);
        assert_eq!(config.s3.default_durability_level, 2);
        assert_eq!(config.s3.default_list_limit, 1024);
    }

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.network.metrics_listen.port(), 9090);
    }
}
