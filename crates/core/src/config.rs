//! Page-level configuration.
//!
//! [`MarginaliaConfig`] groups the settings of every component. All fields
//! have defaults, so a TOML file only needs the values it changes:
//!
//! ```toml
//! [index]
//! container = "article"
//!
//! [reading]
//! words_per_minute = 240
//!
//! [metadata]
//! placeholder = "n/a"
//! failure = "hide"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::index::IndexConfig;
use crate::metadata::{FailurePolicy, MetadataConfig};
use crate::reading_time::{EmptyPolicy, ReadingTimeConfig};
use crate::scroll::{ScrollConfig, Threshold};
use crate::toggle::ToggleConfig;
use crate::{MarginaliaError, Result};

/// Settings for every component of the pipeline.
///
/// # Example
///
/// ```rust
/// use marginalia_core::MarginaliaConfig;
///
/// let config = MarginaliaConfig::builder()
///     .container("article")
///     .words_per_minute(240)
///     .metadata_enabled(false)
///     .build();
///
/// assert_eq!(config.index.container, "article");
/// assert_eq!(config.reading.container, "article");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginaliaConfig {
    pub index: IndexConfig,
    pub reading: ReadingTimeConfig,
    pub metadata: MetadataConfig,
    pub scroll: ScrollConfig,
    pub toggle: ToggleConfig,
}

impl MarginaliaConfig {
    pub fn builder() -> MarginaliaConfigBuilder {
        MarginaliaConfigBuilder::new()
    }

    /// Parses TOML. Missing sections and fields take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MarginaliaError::FileNotFound`] if `path` does not exist and
    /// [`MarginaliaError::ConfigError`] if it does not parse or validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MarginaliaError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&content)
    }

    /// `$XDG_CONFIG_HOME/marginalia/config.toml` or the platform equivalent.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("marginalia").join("config.toml"))
    }

    /// Loads the file at [`default_config_path`](Self::default_config_path)
    /// when it exists, defaults otherwise.
    pub fn load_default() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<()> {
        self.index.validate()?;
        self.reading.validate()?;
        self.metadata.validate()?;
        self.scroll.validate()?;
        self.toggle.validate()
    }
}

/// Fluent builder for [`MarginaliaConfig`].
#[derive(Debug, Clone, Default)]
pub struct MarginaliaConfigBuilder {
    config: MarginaliaConfig,
}

impl MarginaliaConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from a file.
    pub fn from_config(config: MarginaliaConfig) -> Self {
        Self { config }
    }

    /// Sets the content container for both the index and reading time.
    pub fn container(mut self, selector: &str) -> Self {
        self.config.index.container = selector.to_string();
        self.config.reading.container = selector.to_string();
        self
    }

    pub fn nav_target(mut self, selector: &str) -> Self {
        self.config.index.nav_target = selector.to_string();
        self
    }

    /// Restricts indexed headings to `min..=max`.
    pub fn heading_levels(mut self, min: u8, max: u8) -> Self {
        self.config.index.min_level = min;
        self.config.index.max_level = max;
        self
    }

    pub fn words_per_minute(mut self, value: u32) -> Self {
        self.config.reading.words_per_minute = value;
        self
    }

    pub fn empty_policy(mut self, policy: EmptyPolicy) -> Self {
        self.config.reading.empty = policy;
        self
    }

    pub fn metadata_enabled(mut self, value: bool) -> Self {
        self.config.metadata.enabled = value;
        self
    }

    pub fn api_base(mut self, url: &str) -> Self {
        self.config.metadata.api_base = url.to_string();
        self
    }

    pub fn token(mut self, token: Option<String>) -> Self {
        self.config.metadata.token = token;
        self
    }

    /// Per-request timeout in milliseconds.
    pub fn timeout_ms(mut self, value: u64) -> Self {
        self.config.metadata.timeout_ms = value;
        self
    }

    pub fn placeholder(mut self, value: &str) -> Self {
        self.config.metadata.placeholder = value.to_string();
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.metadata.failure = policy;
        self
    }

    pub fn scroll_target(mut self, selector: &str) -> Self {
        self.config.scroll.target = selector.to_string();
        self
    }

    /// Replaces the scroll thresholds.
    pub fn thresholds(mut self, thresholds: Vec<Threshold>) -> Self {
        self.config.scroll.thresholds = thresholds;
        self
    }

    /// Minimum time between scroll evaluations; `None` evaluates per frame.
    pub fn scroll_interval_ms(mut self, value: Option<u64>) -> Self {
        self.config.scroll.min_interval_ms = value;
        self
    }

    pub fn open_class(mut self, class: &str) -> Self {
        self.config.toggle.open_class = class.to_string();
        self
    }

    pub fn aria(mut self, value: bool) -> Self {
        self.config.toggle.aria = value;
        self
    }

    pub fn build(self) -> MarginaliaConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scroll::ThresholdOffset;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        assert!(MarginaliaConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = MarginaliaConfig::builder()
            .container("article")
            .words_per_minute(300)
            .placeholder("?")
            .failure_policy(FailurePolicy::Hide)
            .open_class("expanded")
            .build();

        assert_eq!(config.index.container, "article");
        assert_eq!(config.reading.container, "article");
        assert_eq!(config.reading.words_per_minute, 300);
        assert_eq!(config.metadata.placeholder, "?");
        assert_eq!(config.metadata.failure, FailurePolicy::Hide);
        assert_eq!(config.toggle.open_class, "expanded");
    }

    #[test]
    fn test_from_toml_partial() {
        let config = MarginaliaConfig::from_toml_str(
            r#"
            [index]
            container = "article"
            separator = "_"

            [reading]
            words_per_minute = 250
            empty = "omit"

            [metadata]
            failure = "hide"
            timeout_ms = 2500

            [[scroll.thresholds]]
            id = "progress"
            offset = { ratio = 0.5 }
            class = "half-read"
            "#,
        )
        .unwrap();

        assert_eq!(config.index.container, "article");
        assert_eq!(config.index.separator, '_');
        assert_eq!(config.index.nav_target, "[data-toc]");
        assert_eq!(config.reading.words_per_minute, 250);
        assert_eq!(config.reading.empty, EmptyPolicy::Omit);
        assert_eq!(config.metadata.failure, FailurePolicy::Hide);
        assert_eq!(config.metadata.timeout_ms, 2500);
        assert_eq!(config.metadata.api_base, "https://api.github.com");
        assert_eq!(config.scroll.thresholds.len(), 1);
        assert_eq!(config.scroll.thresholds[0].offset, ThresholdOffset::Ratio(0.5));
        assert_eq!(config.toggle, ToggleConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_zero_wpm() {
        let err = MarginaliaConfig::from_toml_str("[reading]\nwords_per_minute = 0\n").unwrap_err();
        assert!(matches!(err, MarginaliaError::ConfigError(_)));
    }

    #[test]
    fn test_from_toml_syntax_error() {
        let err = MarginaliaConfig::from_toml_str("[index\n").unwrap_err();
        assert!(matches!(err, MarginaliaError::ConfigError(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[toggle]\nopen_class = \"shown\"\naria = false").unwrap();

        let config = MarginaliaConfig::load(file.path()).unwrap();
        assert_eq!(config.toggle.open_class, "shown");
        assert!(!config.toggle.aria);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MarginaliaConfig::load("/nonexistent/marginalia.toml").unwrap_err();
        assert!(matches!(err, MarginaliaError::FileNotFound(_)));
    }

    #[test]
    fn test_default_config_path_shape() {
        if let Some(path) = MarginaliaConfig::default_config_path() {
            assert!(path.ends_with("marginalia/config.toml"));
        }
    }
}
