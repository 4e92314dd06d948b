use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::packet::DHCP_FIXED_HEADER_SIZE;
use crate::reply::Assignment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub server_ip: Ipv4Addr,
    /// The single address handed to every client.
    pub your_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub lease_duration_seconds: u32,
    pub bind_address: Ipv4Addr,
    pub server_port: u16,
    /// Port on the relay agent that replies are sent to.
    pub relay_port: u16,
    /// How long to wait for a REQUEST after sending an OFFER.
    ///
    /// `None` waits forever. No other client is served while waiting.
    pub request_timeout_seconds: Option<u64>,
    pub recv_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_ip: Ipv4Addr::new(10, 1, 5, 5),
            your_ip: Ipv4Addr::new(10, 1, 2, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 254),
            lease_duration_seconds: 86400,
            bind_address: Ipv4Addr::UNSPECIFIED,
            server_port: 67,
            relay_port: 67,
            request_timeout_seconds: None,
            recv_buffer_size: 1024,
        }
    }
}

impl Config {
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.lease_duration_seconds == 0 {
            return Err(Error::InvalidConfig(
                "lease_duration_seconds must be greater than 0".to_string(),
            ));
        }

        if self.your_ip == self.server_ip {
            return Err(Error::InvalidConfig(
                "your_ip must differ from server_ip".to_string(),
            ));
        }

        let mask = u32::from(self.subnet_mask);
        if mask.leading_ones() + mask.trailing_zeros() != 32 {
            return Err(Error::InvalidConfig(format!(
                "subnet_mask {} is not contiguous",
                self.subnet_mask
            )));
        }

        if self.request_timeout_seconds == Some(0) {
            return Err(Error::InvalidConfig(
                "request_timeout_seconds must be greater than 0 when set".to_string(),
            ));
        }

        if self.recv_buffer_size < DHCP_FIXED_HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "recv_buffer_size must be at least {} bytes",
                DHCP_FIXED_HEADER_SIZE
            )));
        }

        Ok(())
    }

    pub fn assignment(&self) -> Assignment {
        Assignment {
            your_ip: self.your_ip,
            server_ip: self.server_ip,
            subnet_mask: self.subnet_mask,
            lease_seconds: self.lease_duration_seconds,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGuard(String);
    impl Drop for TestGuard {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_lease_rejected() {
        let config = Config {
            lease_duration_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_your_ip_equal_to_server_rejected() {
        let config = Config {
            your_ip: Ipv4Addr::new(10, 1, 5, 5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_contiguous_mask_rejected() {
        let config = Config {
            subnet_mask: Ipv4Addr::new(255, 0, 255, 0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            subnet_mask: Ipv4Addr::new(0, 0, 0, 0),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_request_timeout_rejected() {
        let config = Config {
            request_timeout_seconds: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_small_recv_buffer_rejected() {
        let config = Config {
            recv_buffer_size: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_assignment_from_config() {
        let assignment = Config::default().assignment();
        assert_eq!(assignment.your_ip, Ipv4Addr::new(10, 1, 2, 1));
        assert_eq!(assignment.server_ip, Ipv4Addr::new(10, 1, 5, 5));
        assert_eq!(assignment.subnet_mask, Ipv4Addr::new(255, 255, 255, 254));
        assert_eq!(assignment.lease_seconds, 86400);
    }

    #[test]
    fn test_request_timeout_duration() {
        assert_eq!(Config::default().request_timeout(), None);

        let config = Config {
            request_timeout_seconds: Some(30),
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_load_or_create_writes_default_then_reads_it() {
        let path = "test_config_load_or_create.json".to_string();
        let _guard = TestGuard(path.clone());

        let created = Config::load_or_create(&path).unwrap();
        assert_eq!(created, Config::default());
        assert!(Path::new(&path).exists());

        let custom = Config {
            request_timeout_seconds: Some(5),
            ..Default::default()
        };
        custom.save(&path).unwrap();

        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(loaded, custom);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = "test_config_invalid.json".to_string();
        let _guard = TestGuard(path.clone());

        let invalid = Config {
            lease_duration_seconds: 0,
            ..Default::default()
        };
        invalid.save(&path).unwrap();

        assert!(matches!(
            Config::load_or_create(&path),
            Err(Error::InvalidConfig(_))
        ));
    }
}
