use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::permissions::PermissionState;

/// Main configuration structure for the attendance tracker
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Generative AI address lookup
    pub ai: AiConfig,
    /// Location source and request policy
    pub geolocation: GeolocationConfig,
    /// Camera source and photo encoding
    pub camera: CameraConfig,
    /// Where confirmed records are sent
    pub persistence: PersistenceConfig,
    /// Workflow timing
    pub workflow: WorkflowConfig,
    /// Decisions made before the session starts
    pub permissions: PermissionsConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    /// API key for the completion service (can be set via env var)
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub requests_per_minute: u32,
    /// How long resolved addresses stay cached
    pub cache_ttl_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None, // Read from GEMINI_API_KEY or API_KEY when unset
            model: crate::address::completion::DEFAULT_MODEL.to_string(),
            base_url: crate::address::completion::DEFAULT_BASE_URL.to_string(),
            requests_per_minute: 30,
            cache_ttl_seconds: 600,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSourceKind {
    Fixed,
    Ip,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub source: LocationSourceKind,
    /// Coordinates reported by the fixed source
    pub latitude: f64,
    pub longitude: f64,
    pub ip_lookup_url: String,
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            source: LocationSourceKind::Fixed,
            latitude: 12.9716,
            longitude: 77.5946,
            ip_lookup_url: "http://ip-api.com/json/".to_string(),
            high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraSourceKind {
    TestPattern,
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraSourceKind,
    /// Image served as the preview when `source = "file"`
    pub image_path: Option<String>,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSourceKind::TestPattern,
            image_path: None,
            width: 640,
            height: 480,
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Record-append endpoint; unset means saves are simulated
    pub endpoint: Option<String>,
    /// Object storage base URL for photos; unset means photos are inlined
    pub photo_upload_url: Option<String>,
    pub auth_token: Option<String>,
    pub simulated_latency_ms: u64,
    pub request_timeout_seconds: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            photo_upload_url: None,
            auth_token: None,
            simulated_latency_ms: 1500,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Delay before the workflow resets after a surfaced error
    pub reset_delay_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            reset_delay_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub location: PermissionState,
    pub camera: PermissionState,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive used when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON logs instead of human-readable lines
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: true,
        }
    }
}

impl AttendanceConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (attendance.toml, .attendance-rc)
    /// 3. Environment variables (prefixed with ATTENDANCE_, sections split by __)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("attendance.toml").exists() {
            builder = builder.add_source(File::with_name("attendance"));
        }

        if Path::new(".attendance-rc").exists() {
            builder = builder.add_source(
                File::with_name(".attendance-rc").format(config::FileFormat::Toml),
            );
        }

        Self::from_builder(builder)
    }

    /// Load from one explicit file plus environment overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let builder = Config::builder().add_source(
            File::from(path.as_ref()).format(config::FileFormat::Toml),
        );
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder
            .add_source(
                Environment::with_prefix("ATTENDANCE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut attendance_config: AttendanceConfig = config.try_deserialize()?;
        attendance_config.apply_credential_fallback();
        Ok(attendance_config)
    }

    /// Fall back to the conventional API key variables
    fn apply_credential_fallback(&mut self) {
        let configured = self
            .ai
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if configured {
            return;
        }

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.ai.api_key = Some(key);
        } else if let Ok(key) = std::env::var("API_KEY") {
            self.ai.api_key = Some(key);
        }
    }

    /// Copy of this configuration safe to print
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.ai.api_key.is_some() {
            copy.ai.api_key = Some("<redacted>".to_string());
        }
        if copy.persistence.auth_token.is_some() {
            copy.persistence.auth_token = Some("<redacted>".to_string());
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<AttendanceConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = AttendanceConfig::load_env_file();
        AttendanceConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static AttendanceConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
