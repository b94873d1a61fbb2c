//! Serializable configuration for a fetch-cache family instance
//! (`spec.md` §6, "Configuration").
//!
//! The original sources take these as constructor arguments read out of a
//! `.cfg` file by the surrounding simulator; here they're a
//! `serde`-deserializable struct so a host can load them from JSON (or any
//! other `serde` format) instead of hand-assembling constructor calls.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Shared configuration fields every fetch-cache family member takes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FetchCacheConfig {
    pub ways: usize,
    pub lines: usize,
    pub bytes_per_line: u32,
    pub request_queue_size: usize,
}

impl FetchCacheConfig {
    /// # Errors
    /// Returns [`CacheError::Construction`] if any field fails `spec.md`
    /// §6's "all positive, lines/bytesPerLine powers of two" invariant.
    pub fn validate(&self) -> Result<()> {
        if self.ways == 0 || self.lines == 0 || self.request_queue_size == 0 {
            return Err(CacheError::Construction(
                "ways, lines, and request_queue_size must all be positive".into(),
            ));
        }
        if !self.bytes_per_line.is_power_of_two() {
            return Err(CacheError::Construction("bytes_per_line must be a power of two".into()));
        }
        if !self.lines.is_power_of_two() {
            return Err(CacheError::Construction("lines must be a power of two".into()));
        }
        if self.lines % self.ways != 0 {
            return Err(CacheError::Construction("lines must be evenly divisible by ways".into()));
        }
        Ok(())
    }
}

/// Extra fields the texture cache variant needs beyond
/// [`FetchCacheConfig`] (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextureCacheConfig {
    #[serde(flatten)]
    pub base: FetchCacheConfig,
    pub port_width: u32,
    pub banks: u32,
    pub max_accesses_per_bank: u32,
    pub bank_width: u32,
    pub max_misses_per_cycle: u32,
    pub decompr_latency: u32,
}

impl TextureCacheConfig {
    /// # Errors
    /// Returns [`CacheError::Construction`] if the base fields fail
    /// validation or `banks` is not a power of two.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if !self.banks.is_power_of_two() {
            return Err(CacheError::Construction("banks must be a power of two".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn as_texture_config(&self) -> crate::texture::TextureConfig {
        crate::texture::TextureConfig {
            banks: self.banks,
            max_accesses_per_bank: self.max_accesses_per_bank,
            bank_width: self.bank_width,
            max_misses_per_cycle: self.max_misses_per_cycle,
            decompr_latency: self.decompr_latency,
            port_width: self.port_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_line_size() {
        let config = FetchCacheConfig {
            ways: 4,
            lines: 256,
            bytes_per_line: 63,
            request_queue_size: 4,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{"ways":4,"lines":256,"bytes_per_line":64,"request_queue_size":4}"#;
        let config: FetchCacheConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn texture_config_flattens_base_fields() {
        let json = r#"{
            "ways":4,"lines":256,"bytes_per_line":64,"request_queue_size":4,
            "port_width":16,"banks":4,"max_accesses_per_bank":1,
            "bank_width":16,"max_misses_per_cycle":4,"decompr_latency":2
        }"#;
        let config: TextureCacheConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
    }
}
