use autoprompt_browser::shared::config::millis;
use autoprompt_browser::{LocatorConfig, TimingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Everything a driver needs besides its document.
///
/// Loadable from TOML; every field is optional:
///
/// ```toml
/// default_delay = 20000
///
/// [timing]
/// input_settle = 1000
///
/// [locator]
/// disabled_classes = ["disabled", "Mui-disabled", "is-busy"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub timing: TimingConfig,
    pub locator: LocatorConfig,
    /// Pause between submissions when a start request does not give one.
    #[serde(with = "millis")]
    pub default_delay: Duration,
    pub command_capacity: usize,
    pub event_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            locator: LocatorConfig::default(),
            default_delay: Duration::from_millis(30000),
            command_capacity: 16,
            event_capacity: 64,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl DriverConfig {
    /// No pauses anywhere; for tests and local pages.
    pub fn fast() -> Self {
        Self {
            timing: TimingConfig::fast(),
            default_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn with_trigger_verbs(mut self, verbs: &[String]) -> Self {
        self.locator = self.locator.with_trigger_verbs(verbs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_the_default() {
        assert_eq!(DriverConfig::from_toml_str("").unwrap(), DriverConfig::default());
    }

    #[test]
    fn nested_tables_override_single_fields() {
        let cfg = DriverConfig::from_toml_str(
            r#"
            default_delay = 5000

            [timing]
            enable_attempts = 10
            enable_interval = 250

            [locator]
            disabled_classes = ["busy"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.default_delay, Duration::from_secs(5));
        assert_eq!(cfg.timing.enable_window(), Duration::from_millis(2500));
        assert_eq!(cfg.timing.input_settle, Duration::from_millis(1500));
        assert_eq!(cfg.locator.disabled_classes, vec!["busy".to_string()]);
        assert_eq!(cfg.locator.input, LocatorConfig::default().input);
    }

    #[test]
    fn custom_strategies_parse_from_toml() {
        let cfg = DriverConfig::from_toml_str(
            r#"
            [[locator.input]]
            selector = "textarea#prompt"
            rule = "visible"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.locator.input.len(), 1);
        assert_eq!(cfg.locator.input[0].selector, "textarea#prompt");
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let err = DriverConfig::from_toml_str(
            r#"
            [[locator.trigger]]
            selector = "button"
            rule = "sometimes"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = DriverConfig::load("/nonexistent/autoprompt.toml").await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/autoprompt.toml"));
    }
}
