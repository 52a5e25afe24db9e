//! Pool configuration
//!
//! The geometry is fixed; only the base address of the pool is
//! configurable. Configuration is read from TOML:
//!
//! ```toml
//! base_address = 0x1000_0000
//! ```

use crate::error::ConfigError;
use crate::slab::{Address, POOL_SIZE, SLAB_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default pool base address
pub const DEFAULT_BASE_ADDRESS: u64 = 0x1000_0000;

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// First byte of the pool; slab 0 starts here
    pub base_address: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_BASE_ADDRESS,
        }
    }
}

impl PoolConfig {
    /// Configuration with the given base address
    pub fn with_base(base_address: u64) -> Self {
        Self { base_address }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: PoolConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&input)?;
        debug!("Loaded pool config from {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Check that the whole pool fits in the address space at a slab boundary
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_address;
        if base == 0 {
            return Err(ConfigError::InvalidBase {
                base,
                reason: "base address must be non-zero",
            });
        }
        if base % SLAB_SIZE as u64 != 0 {
            return Err(ConfigError::InvalidBase {
                base,
                reason: "base address must be aligned to the slab size",
            });
        }
        if base.checked_add(POOL_SIZE as u64).is_none() {
            return Err(ConfigError::InvalidBase {
                base,
                reason: "pool would extend past the end of the address space",
            });
        }
        Ok(())
    }

    /// Base address as an [`Address`]
    pub fn base(&self) -> Address {
        Address(self.base_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base(), Address(0x1000_0000));
    }

    #[test]
    fn test_parse_hex_base() {
        let config = PoolConfig::from_toml_str("base_address = 0x2000_0000").unwrap();
        assert_eq!(config.base_address, 0x2000_0000);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PoolConfig::from_toml_str("").unwrap();
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = PoolConfig::from_toml_str("slab_count = 32").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_bad_bases() {
        for base in [0, 0x1000_0100, u64::MAX - 4095] {
            let err = PoolConfig::with_base(base).validate().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidBase { base: b, .. } if b == base),
                "base {:#x} should be rejected",
                base
            );
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_address = 0x4000").unwrap();

        let config = PoolConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base(), Address(0x4000));
    }

    #[test]
    fn test_from_missing_file() {
        let err = PoolConfig::from_file("/nonexistent/bitslab.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
