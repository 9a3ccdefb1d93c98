//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `whatsend.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use whatsend_app::config::{EngineConfig, OverlapPolicy, TimingConfig};
use whatsend_domain::phone::CountryCode;
use whatsend_domain::search::SearchConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target app and send-control recognition.
    pub target: TargetConfig,
    /// Phone number normalisation.
    pub phone: PhoneConfig,
    /// Search delays and retry budget.
    pub timing: TimingConfig,
    /// Identity of our automation service.
    pub service: ServiceConfig,
    /// Overlapping send requests.
    pub queue: QueueConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Virtual platform behaviour.
    pub simulator: SimulatorConfig,
}

/// Target messaging app.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Package name, e.g. `com.whatsapp`.
    pub package: String,
    /// Click-to-chat link host.
    pub link_host: String,
    pub send_view_id: String,
    /// Accepted send-control labels, for localised UIs.
    pub send_labels: Vec<String>,
    pub fallback_class: String,
    /// Fraction of the screen width the fallback control must extend past.
    pub right_edge_fraction: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    /// International dialling prefix, digits only.
    pub country_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// `package/class` identifier looked up in the enabled-services list.
    pub component: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub overlap: OverlapPolicy,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Start with our service already listed as enabled.
    pub enabled_on_start: bool,
    /// Loading frames the virtual target app shows before the chat screen.
    pub render_frames: usize,
}

impl Config {
    /// Load configuration from `whatsend.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("whatsend.toml")?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("WHATSEND_COUNTRY_CODE") {
            self.phone.country_code = val;
        }
        if let Some(val) = var("WHATSEND_TARGET_PACKAGE") {
            self.target.package = val;
        }
        if let Some(val) = var("WHATSEND_MAX_RETRIES") {
            self.timing.max_retries = val.parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "WHATSEND_MAX_RETRIES must be a non-negative integer, got {val:?}"
                ))
            })?;
        }
        if let Some(val) = var("WHATSEND_OVERLAP") {
            self.queue.overlap = match val.as_str() {
                "queue" => OverlapPolicy::Queue,
                "reject" => OverlapPolicy::Reject,
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "WHATSEND_OVERLAP must be \"queue\" or \"reject\", got {val:?}"
                    )));
                }
            };
        }
        if let Some(val) = var("WHATSEND_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.service.component.is_empty() {
            return Err(ConfigError::Validation(
                "service component must not be empty".to_string(),
            ));
        }
        self.engine_config()?
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))
    }

    /// Build the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the country code is not a
    /// non-empty run of digits.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let country_code = CountryCode::new(self.phone.country_code.clone())
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        Ok(EngineConfig {
            target_package: self.target.package.clone(),
            link_host: self.target.link_host.clone(),
            country_code,
            search: SearchConfig {
                send_view_id: self.target.send_view_id.clone(),
                send_labels: self.target.send_labels.clone(),
                fallback_class: self.target.fallback_class.clone(),
                right_edge_fraction: self.target.right_edge_fraction,
            },
            timing: self.timing.clone(),
            overlap: self.queue.overlap,
        })
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        let search = SearchConfig::default();
        let engine = EngineConfig::default();
        Self {
            package: engine.target_package,
            link_host: engine.link_host,
            send_view_id: search.send_view_id,
            send_labels: search.send_labels,
            fallback_class: search.fallback_class,
            right_edge_fraction: search.right_edge_fraction,
        }
    }
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            country_code: CountryCode::default().as_str().to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            component: "com.ghazali.whatsend/com.ghazali.whatsend.SendAutomationService"
                .to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "whatsendd=info,whatsend_app=info,whatsend_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled_on_start: true,
            render_frames: 1,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
