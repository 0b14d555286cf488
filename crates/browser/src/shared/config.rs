use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Every settle delay and poll bound used while driving a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Bound on waiting for the document to finish loading.
    #[serde(with = "millis")]
    pub page_load: Duration,
    #[serde(with = "millis")]
    pub load_interval: Duration,

    /// Attempts to find the input before deciding this context is not the one.
    pub probe_attempts: u32,
    #[serde(with = "millis")]
    pub probe_interval: Duration,
    pub trigger_attempts: u32,
    #[serde(with = "millis")]
    pub trigger_interval: Duration,

    #[serde(with = "millis")]
    pub focus_settle: Duration,
    #[serde(with = "millis")]
    pub edit_settle: Duration,
    #[serde(with = "millis")]
    pub keystroke_settle: Duration,
    /// Pause after injecting a prompt, before looking at the trigger.
    #[serde(with = "millis")]
    pub input_settle: Duration,

    pub enable_attempts: u32,
    #[serde(with = "millis")]
    pub enable_interval: Duration,
    #[serde(with = "millis")]
    pub force_settle: Duration,

    #[serde(with = "millis")]
    pub scroll_settle: Duration,
    #[serde(with = "millis")]
    pub press_focus_settle: Duration,
    #[serde(with = "millis")]
    pub press_settle: Duration,
    /// Pause after firing the trigger before looking for progress indicators.
    #[serde(with = "millis")]
    pub indicator_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_load: Duration::from_millis(30000),
            load_interval: Duration::from_millis(1000),
            probe_attempts: 5,
            probe_interval: Duration::from_millis(1000),
            trigger_attempts: 25,
            trigger_interval: Duration::from_millis(1000),
            focus_settle: Duration::from_millis(200),
            edit_settle: Duration::from_millis(100),
            keystroke_settle: Duration::from_millis(50),
            input_settle: Duration::from_millis(1500),
            enable_attempts: 30, // 15s at 500ms
            enable_interval: Duration::from_millis(500),
            force_settle: Duration::from_millis(200),
            scroll_settle: Duration::from_millis(500),
            press_focus_settle: Duration::from_millis(100),
            press_settle: Duration::from_millis(50),
            indicator_delay: Duration::from_millis(2000),
        }
    }
}

impl TimingConfig {
    /// No pauses at all; attempt counts are unchanged.
    pub fn fast() -> Self {
        Self {
            page_load: Duration::ZERO,
            load_interval: Duration::ZERO,
            probe_interval: Duration::ZERO,
            trigger_interval: Duration::ZERO,
            focus_settle: Duration::ZERO,
            edit_settle: Duration::ZERO,
            keystroke_settle: Duration::ZERO,
            input_settle: Duration::ZERO,
            enable_interval: Duration::ZERO,
            force_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            press_focus_settle: Duration::ZERO,
            press_settle: Duration::ZERO,
            indicator_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Total time the trigger is given to become enabled on its own.
    pub fn enable_window(&self) -> Duration {
        self.enable_interval * self.enable_attempts
    }
}

/// (De)serializes a [`Duration`] as whole milliseconds.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enable_window_is_fifteen_seconds() {
        assert_eq!(TimingConfig::default().enable_window(), Duration::from_secs(15));
    }

    #[test]
    fn fast_keeps_attempt_counts() {
        let fast = TimingConfig::fast();
        assert_eq!(fast.probe_attempts, 5);
        assert_eq!(fast.trigger_attempts, 25);
        assert_eq!(fast.enable_window(), Duration::ZERO);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: TimingConfig = serde_json::from_str(r#"{ "input_settle": 250, "probe_attempts": 2 }"#).unwrap();
        assert_eq!(cfg.input_settle, Duration::from_millis(250));
        assert_eq!(cfg.probe_attempts, 2);
        assert_eq!(cfg.scroll_settle, Duration::from_millis(500));
    }
}
