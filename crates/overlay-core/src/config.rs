//! Window settings.
//!
//! [`WindowSettings`] is the body of `GET <page>/api/get_window_settings`.
//! [`OverlayConfig`] is the session view derived from it: sweep intervals
//! (absent = disabled), store capacity (0 = unlimited) and style overrides.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capacity used until settings arrive.
pub const DEFAULT_CAPACITY: usize = 30;

/// Settings as served by the chat server.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    /// Seconds after which messages are removed. 0/absent disables.
    #[serde(default)]
    pub clear_timer: Option<f64>,
    /// Seconds after which messages are marked old. 0/absent disables.
    #[serde(default)]
    pub decay_timer: Option<f64>,
    /// Maximum number of displayed messages. Absent or non-positive means
    /// unlimited.
    #[serde(default)]
    pub message_limit: Option<i64>,
    /// Style overrides keyed by style name.
    #[serde(default)]
    pub style: BTreeMap<String, Value>,
}

/// Session configuration for the store and sweeps.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayConfig {
    /// Age at which `clear` removes a message.
    pub clear_interval: Option<Duration>,
    /// Age at which `decay` marks a message old.
    pub decay_interval: Option<Duration>,
    /// Maximum store length; 0 means unlimited.
    pub capacity: usize,
    /// Style overrides, exposed to renderers as `style_<name>`.
    pub style_overrides: BTreeMap<String, Value>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl OverlayConfig {
    /// Sweeps disabled, no styles, the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            clear_interval: None,
            decay_interval: None,
            capacity,
            style_overrides: BTreeMap::new(),
        }
    }

    /// Derive the session config from fetched settings.
    ///
    /// A missing or non-positive `message_limit` lifts the bound.
    pub fn from_settings(settings: WindowSettings) -> Self {
        let capacity = match settings.message_limit {
            Some(limit) if limit > 0 => limit as usize,
            _ => 0,
        };
        Self {
            clear_interval: interval_from_secs(settings.clear_timer),
            decay_interval: interval_from_secs(settings.decay_timer),
            capacity,
            style_overrides: settings
                .style
                .into_iter()
                .map(|(name, value)| (format!("style_{name}"), value))
                .collect(),
        }
    }

    /// Whether the clear sweep runs.
    pub fn clear_enabled(&self) -> bool {
        self.clear_interval.is_some()
    }

    /// Whether the decay sweep runs.
    pub fn decay_enabled(&self) -> bool {
        self.decay_interval.is_some()
    }
}

/// Seconds to an interval; non-positive, non-finite, out of range or absent
/// disables.
fn interval_from_secs(secs: Option<f64>) -> Option<Duration> {
    secs.filter(|s| *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_sweeps_disabled() {
        let cfg = OverlayConfig::default();
        assert!(!cfg.clear_enabled());
        assert!(!cfg.decay_enabled());
        assert_eq!(cfg.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn settings_convert_seconds_to_intervals() {
        let settings: WindowSettings = serde_json::from_str(
            r#"{"clear_timer":2,"decay_timer":1.5,"message_limit":3,"style":{"message":{"color":"red"}}}"#,
        )
        .unwrap();
        let cfg = OverlayConfig::from_settings(settings);
        assert_eq!(cfg.clear_interval, Some(Duration::from_secs(2)));
        assert_eq!(cfg.decay_interval, Some(Duration::from_millis(1500)));
        assert_eq!(cfg.capacity, 3);
        assert_eq!(cfg.style_overrides["style_message"]["color"], "red");
    }

    #[test]
    fn zero_or_missing_timers_disable_sweeps() {
        let settings: WindowSettings = serde_json::from_str(r#"{"clear_timer":0}"#).unwrap();
        let cfg = OverlayConfig::from_settings(settings);
        assert!(!cfg.clear_enabled());
        assert!(!cfg.decay_enabled());
    }

    #[test]
    fn negative_timer_disables_sweep() {
        let cfg = OverlayConfig::from_settings(WindowSettings {
            decay_timer: Some(-1.0),
            ..Default::default()
        });
        assert!(!cfg.decay_enabled());
    }

    #[test]
    fn oversized_timer_disables_sweep() {
        let settings: WindowSettings =
            serde_json::from_str(r#"{"clear_timer":1e20,"decay_timer":1e300}"#).unwrap();
        let cfg = OverlayConfig::from_settings(settings);
        assert!(!cfg.clear_enabled());
        assert!(!cfg.decay_enabled());
    }

    #[test]
    fn message_limit_rules() {
        let limit = |l: Option<i64>| {
            OverlayConfig::from_settings(WindowSettings {
                message_limit: l,
                ..Default::default()
            })
            .capacity
        };
        assert_eq!(limit(None), 0);
        assert_eq!(limit(Some(0)), 0);
        assert_eq!(limit(Some(-4)), 0);
        assert_eq!(limit(Some(12)), 12);
    }
}
