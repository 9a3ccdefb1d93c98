//! Engine configuration: target app, timing, and overlap policy.

use std::time::Duration;

use serde::Deserialize;

use whatsend_domain::deep_link::DEFAULT_LINK_HOST;
use whatsend_domain::error::ValidationError;
use whatsend_domain::phone::CountryCode;
use whatsend_domain::search::SearchConfig;

/// What to do with a send request that arrives while another is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Hold one request and launch it when the machine returns to idle.
    #[default]
    Queue,
    /// Refuse every overlapping request.
    Reject,
}

/// Fixed delays and the retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between a notification (or a miss) and the next search.
    pub check_delay_ms: u64,
    /// Delay between the click and the first back navigation.
    pub cleanup_delay_ms: u64,
    /// Delay between the first and second back navigation.
    pub back_stagger_ms: u64,
    /// Platform-side debounce between notifications.
    pub notification_timeout_ms: u64,
    /// How long to wait after launch for the target app to report activity
    /// before searching anyway.
    pub await_timeout_ms: u64,
    /// Search attempts before giving up.
    pub max_retries: u32,
}

impl TimingConfig {
    #[must_use]
    pub fn check_delay(&self) -> Duration {
        Duration::from_millis(self.check_delay_ms)
    }

    #[must_use]
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    #[must_use]
    pub fn back_stagger(&self) -> Duration {
        Duration::from_millis(self.back_stagger_ms)
    }

    #[must_use]
    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }

    #[must_use]
    pub fn await_timeout(&self) -> Duration {
        Duration::from_millis(self.await_timeout_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            check_delay_ms: 500,
            cleanup_delay_ms: 500,
            back_stagger_ms: 300,
            notification_timeout_ms: 100,
            await_timeout_ms: 5_000,
            max_retries: 10,
        }
    }
}

/// Everything the automation engine needs to know up front.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Package name of the messaging app.
    pub target_package: String,
    /// Host part of the click-to-chat link.
    pub link_host: String,
    pub country_code: CountryCode,
    pub search: SearchConfig,
    pub timing: TimingConfig,
    pub overlap: OverlapPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_package: "com.whatsapp".to_string(),
            link_host: DEFAULT_LINK_HOST.to_string(),
            country_code: CountryCode::default(),
            search: SearchConfig::default(),
            timing: TimingConfig::default(),
            overlap: OverlapPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Check invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an empty package or link host, a
    /// zero retry budget, or a right-edge fraction outside `(0, 1)`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.target_package.is_empty() {
            return Err(ValidationError::EmptyPackage);
        }
        if self.link_host.is_empty() {
            return Err(ValidationError::EmptyLinkHost);
        }
        if self.timing.max_retries == 0 {
            return Err(ValidationError::ZeroRetries);
        }
        let fraction = self.search.right_edge_fraction;
        let within_unit_interval = fraction > 0.0 && fraction < 1.0;
        if !within_unit_interval {
            return Err(ValidationError::FractionOutOfRange(fraction));
        }
        Ok(())
    }
}
