//! Service configuration and its fluent builder
//!
//! `ClipperConfig` carries the process-level knobs (queue width, page load
//! deadline, image download policy). Values are validated once in [`ClipperConfigBuilder::build`].

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_USER_AGENT: &str = concat!("clipmark/", env!("CARGO_PKG_VERSION"));

/// Process-wide configuration for a [`crate::Clipper`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipperConfig {
    pub(crate) concurrency: usize,
    pub(crate) image_dir: PathBuf,
    pub(crate) rewrite_absolute: bool,
    #[serde(default = "default_load_timeout_secs")]
    pub(crate) load_timeout_secs: u64,
    pub(crate) image_timeout_secs: u64,
    pub(crate) max_image_bytes: u64,
    pub(crate) user_agent: String,
}

fn default_load_timeout_secs() -> u64 {
    DEFAULT_LOAD_TIMEOUT_SECS
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            image_dir: PathBuf::from("images"),
            rewrite_absolute: false,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            image_timeout_secs: DEFAULT_IMAGE_TIMEOUT_SECS,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClipperConfig {
    #[must_use]
    pub fn builder() -> ClipperConfigBuilder {
        ClipperConfigBuilder::default()
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn image_dir(&self) -> &PathBuf {
        &self.image_dir
    }

    #[must_use]
    pub fn rewrite_absolute(&self) -> bool {
        self.rewrite_absolute
    }

    /// Deadline for fetching a URL payload's document
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    #[must_use]
    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    #[must_use]
    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_bytes
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Fluent builder for [`ClipperConfig`]
#[derive(Debug, Clone, Default)]
pub struct ClipperConfigBuilder {
    concurrency: Option<usize>,
    image_dir: Option<PathBuf>,
    rewrite_absolute: bool,
    load_timeout_secs: Option<u64>,
    image_timeout_secs: Option<u64>,
    max_image_bytes: Option<u64>,
    user_agent: Option<String>,
}

impl ClipperConfigBuilder {
    /// Maximum number of conversions running at once
    #[must_use]
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit);
        self
    }

    /// Directory downloaded images are written to
    #[must_use]
    pub fn image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = Some(dir.into());
        self
    }

    /// Rewrite same-origin absolute image URLs relative to the page
    #[must_use]
    pub fn rewrite_absolute(mut self, enabled: bool) -> Self {
        self.rewrite_absolute = enabled;
        self
    }

    /// Deadline for fetching the document behind a URL payload
    #[must_use]
    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.load_timeout_secs = Some(secs);
        self
    }

    /// Hard deadline for a single image fetch
    #[must_use]
    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.image_timeout_secs = Some(secs);
        self
    }

    /// Images larger than this are left as remote references
    #[must_use]
    pub fn max_image_bytes(mut self, bytes: u64) -> Self {
        self.max_image_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns an error when the concurrency limit, either timeout or the size
    /// limit is zero, or when the user agent is blank.
    pub fn build(self) -> Result<ClipperConfig> {
        let concurrency = self.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(anyhow!("concurrency must be at least 1"));
        }

        let load_timeout_secs = self.load_timeout_secs.unwrap_or(DEFAULT_LOAD_TIMEOUT_SECS);
        if load_timeout_secs == 0 {
            return Err(anyhow!("load_timeout_secs must be greater than zero"));
        }

        let image_timeout_secs = self.image_timeout_secs.unwrap_or(DEFAULT_IMAGE_TIMEOUT_SECS);
        if image_timeout_secs == 0 {
            return Err(anyhow!("image_timeout_secs must be greater than zero"));
        }

        let max_image_bytes = self.max_image_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES);
        if max_image_bytes == 0 {
            return Err(anyhow!("max_image_bytes must be greater than zero"));
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        if user_agent.trim().is_empty() {
            return Err(anyhow!("user_agent must not be blank"));
        }

        Ok(ClipperConfig {
            concurrency,
            image_dir: self.image_dir.unwrap_or_else(|| PathBuf::from("images")),
            rewrite_absolute: self.rewrite_absolute,
            load_timeout_secs,
            image_timeout_secs,
            max_image_bytes,
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() -> Result<()> {
        let config = ClipperConfig::builder().build()?;
        assert_eq!(config.concurrency(), DEFAULT_CONCURRENCY);
        assert_eq!(config.image_timeout(), Duration::from_secs(30));
        assert!(!config.rewrite_absolute());
        Ok(())
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        assert!(ClipperConfig::builder().concurrency(0).build().is_err());
    }

    #[test]
    fn test_load_and_image_timeouts_are_separate() -> Result<()> {
        let config = ClipperConfig::builder()
            .load_timeout_secs(5)
            .image_timeout_secs(60)
            .build()?;
        assert_eq!(config.load_timeout(), Duration::from_secs(5));
        assert_eq!(config.image_timeout(), Duration::from_secs(60));
        assert!(ClipperConfig::builder().load_timeout_secs(0).build().is_err());
        Ok(())
    }

    #[test]
    fn test_builder_rejects_blank_user_agent() {
        assert!(ClipperConfig::builder().user_agent("  ").build().is_err());
    }
}
