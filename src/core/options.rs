//! Watcher options and their loading from files and environment variables.

use crate::error::{Result, VarError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Timeout applied to each backend call when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options controlling the background watch loop.
///
/// # Examples
///
/// ```rust
/// use runtimevar::core::WatchOptions;
/// use std::time::Duration;
///
/// let options = WatchOptions::default();
/// assert_eq!(options.effective_timeout(), Duration::from_secs(30));
///
/// let options = WatchOptions::default().with_timeout(Duration::from_secs(5));
/// assert_eq!(options.effective_poll_interval(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Upper bound on each backend call. Unset or zero means [`DEFAULT_TIMEOUT`].
    pub timeout: Option<Duration>,
    /// Delay between queries while no change subscription is open.
    /// Unset or zero means the effective timeout.
    pub poll_interval: Option<Duration>,
}

/// Millisecond representation used when loading from config sources.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOptions {
    timeout_ms: Option<i64>,
    poll_interval_ms: Option<i64>,
}

fn positive_millis(ms: Option<i64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0)
        .map(|ms| Duration::from_millis(ms as u64))
}

impl WatchOptions {
    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the polling interval used while no subscription is open.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// The timeout the loop actually applies.
    pub fn effective_timeout(&self) -> Duration {
        self.timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// The polling interval the loop actually applies.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval
            .filter(|t| !t.is_zero())
            .unwrap_or_else(|| self.effective_timeout())
    }

    /// Load options from an optional file and prefixed environment variables.
    ///
    /// Recognised keys are `timeout_ms` and `poll_interval_ms`. The file format
    /// (YAML, TOML or JSON) is detected from its extension and a missing file is
    /// ignored. Environment variables such as `APP_TIMEOUT_MS` override the file.
    /// Non-positive values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`VarError::Config`] if a source cannot be read or a value does not
    /// parse as an integer.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use runtimevar::core::WatchOptions;
    ///
    /// # fn example() -> runtimevar::error::Result<()> {
    /// let options = WatchOptions::load(Some("config/watch.yaml".as_ref()), Some("APP"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load(file: Option<&Path>, env_prefix: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
        }

        if let Some(prefix) = env_prefix {
            builder = builder.add_source(config::Environment::with_prefix(prefix).try_parsing(true));
        }

        let config = builder
            .build()
            .map_err(|e| VarError::Config(format!("Failed to load options: {}", e)))?;

        let raw = config
            .try_deserialize::<RawOptions>()
            .map_err(|e| VarError::Config(format!("Failed to parse options: {}", e)))?;

        tracing::debug!(
            timeout_ms = ?raw.timeout_ms,
            poll_interval_ms = ?raw.poll_interval_ms,
            "Loaded watch options"
        );

        Ok(Self {
            timeout: positive_millis(raw.timeout_ms),
            poll_interval: positive_millis(raw.poll_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = WatchOptions::default();
        assert_eq!(options.effective_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(options.effective_poll_interval(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_zero_timeout_falls_back_to_default() {
        let options = WatchOptions::default().with_timeout(Duration::ZERO);
        assert_eq!(options.effective_timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_explicit_poll_interval() {
        let options = WatchOptions::default()
            .with_timeout(Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(250));
        assert_eq!(options.effective_timeout(), Duration::from_secs(2));
        assert_eq!(options.effective_poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("watch.yaml");
        fs::write(&path, "timeout_ms: 1500\npoll_interval_ms: 200\n").unwrap();

        let options = WatchOptions::load(Some(&path), None).unwrap();
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.poll_interval, Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_load_non_positive_values_are_unset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("watch.toml");
        fs::write(&path, "timeout_ms = -5\npoll_interval_ms = 0\n").unwrap();

        let options = WatchOptions::load(Some(&path), None).unwrap();
        assert_eq!(options, WatchOptions::default());
        assert_eq!(options.effective_timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_load_missing_file_is_ignored() {
        let options = WatchOptions::load(Some(Path::new("/nonexistent/watch.json")), None).unwrap();
        assert_eq!(options, WatchOptions::default());
    }

    #[test]
    fn test_load_rejects_non_numeric_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("watch.json");
        fs::write(&path, r#"{"timeout_ms": "soon"}"#).unwrap();

        assert!(matches!(
            WatchOptions::load(Some(&path), None),
            Err(VarError::Config(_))
        ));
    }
}
