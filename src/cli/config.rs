//! wagate configuration file handling
//!
//! Provides default configuration generation and loading for the gateway.
//! Configuration files are TOML and live in the wagate data directory next to
//! the persisted WhatsApp credentials.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wagate::whatsapp::lifecycle::{DEFAULT_MAX_QR_ATTEMPTS, DEFAULT_QR_TIMEOUT};
use wagate::whatsapp::retry::RetryPolicy;
use wagate::whatsapp::{BridgeConfig, LifecycleConfig};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default API bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Default bridge endpoint
const DEFAULT_BRIDGE_URL: &str = "ws://127.0.0.1:3001";

/// wagate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WagateConfig {
    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// WhatsApp session settings
    pub whatsapp: WhatsAppConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the REST API listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// WhatsApp-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Where the credential blob is persisted
    pub credentials_path: PathBuf,

    /// WebSocket URL of the WhatsApp bridge
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// QR codes issued per pairing cycle before giving up
    #[serde(default = "default_max_qr_attempts")]
    pub max_qr_attempts: u32,

    /// How long each QR code stays visible
    #[serde(default = "default_qr_timeout", with = "humantime_duration")]
    pub qr_timeout: Duration,

    /// How long to wait for the bridge to acknowledge a send
    #[serde(default = "default_send_timeout", with = "humantime_duration")]
    pub send_timeout: Duration,

    /// Bound on a single bridge dial (TCP connect plus handshake)
    #[serde(default = "default_dial_timeout", with = "humantime_duration")]
    pub dial_timeout: Duration,

    /// Retries for the initial bridge dial
    #[serde(default = "default_dial_retries")]
    pub dial_retries: u32,

    /// Also print QR codes to the terminal
    #[serde(default = "default_print_qr")]
    pub print_qr_in_terminal: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}

fn default_max_qr_attempts() -> u32 {
    DEFAULT_MAX_QR_ATTEMPTS
}

fn default_qr_timeout() -> Duration {
    DEFAULT_QR_TIMEOUT
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_dial_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_dial_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_print_qr() -> bool {
    true
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Durations as human-readable strings ("5s", "1m 30s")
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl WagateConfig {
    /// Create a new configuration with the given credentials path
    #[cfg(test)]
    pub fn new(credentials_path: PathBuf) -> Self {
        Self {
            server: ServerConfig::default(),
            whatsapp: WhatsAppConfig {
                credentials_path,
                bridge_url: default_bridge_url(),
                max_qr_attempts: default_max_qr_attempts(),
                qr_timeout: default_qr_timeout(),
                send_timeout: default_send_timeout(),
                dial_timeout: default_dial_timeout(),
                dial_retries: default_dial_retries(),
                print_qr_in_terminal: default_print_qr(),
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: WagateConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        if config.whatsapp.max_qr_attempts == 0 {
            return Err(format!(
                "Invalid config file '{}': max_qr_attempts must be at least 1",
                path.display()
            )
            .into());
        }

        Ok(config)
    }

    /// Save configuration to a TOML file
    #[cfg(test)]
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Load the config at `path`, writing the commented default first if missing
    pub fn load_or_create(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            println!("📝 No config file found. Creating default configuration...");
            Self::create_default(path, &default_credentials_path())?;
            println!("   Created: {}", path.display());
        }
        Self::load(path)
    }

    /// Lifecycle settings derived from this config
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            max_qr_attempts: self.whatsapp.max_qr_attempts,
            qr_timeout: self.whatsapp.qr_timeout,
            print_qr_in_terminal: self.whatsapp.print_qr_in_terminal,
        }
    }

    /// Bridge settings derived from this config
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            url: self.whatsapp.bridge_url.clone(),
            send_timeout: self.whatsapp.send_timeout,
            dial_timeout: self.whatsapp.dial_timeout,
            dial_retry: RetryPolicy {
                max_retries: self.whatsapp.dial_retries,
                ..RetryPolicy::default()
            },
        }
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(credentials_path: &Path) -> String {
        format!(
            r#"# wagate configuration

[server]
# Address the REST API listens on
bind = "{bind}"

[whatsapp]
# Persisted WhatsApp credentials (delete with `wagate reset-credentials`)
credentials_path = "{credentials_path}"

# WebSocket URL of the WhatsApp bridge process
bridge_url = "{bridge_url}"

# QR codes issued per pairing attempt before the session is dropped
max_qr_attempts = {max_qr_attempts}

# How long each QR code stays visible ("5s", "1m")
qr_timeout = "5s"

# How long to wait for the bridge to acknowledge a message
send_timeout = "30s"

# Give up on a bridge connection attempt after this long
dial_timeout = "10s"

# Retries for the initial bridge connection
dial_retries = {dial_retries}

# Also print each QR code to the terminal
print_qr_in_terminal = true

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/wagate/wagate.log"
"#,
            bind = DEFAULT_BIND,
            credentials_path = credentials_path.display(),
            bridge_url = DEFAULT_BRIDGE_URL,
            max_qr_attempts = DEFAULT_MAX_QR_ATTEMPTS,
            dial_retries = default_dial_retries(),
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        credentials_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(credentials_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// wagate data directory (`~/.local/share/wagate` on Linux)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wagate")
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

pub fn default_credentials_path() -> PathBuf {
    default_data_dir().join("auth_info.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let credentials_path = PathBuf::from("/data/wagate/auth_info.json");
        let config = WagateConfig::new(credentials_path.clone());

        assert_eq!(config.whatsapp.credentials_path, credentials_path);
        assert_eq!(config.whatsapp.max_qr_attempts, 5);
        assert_eq!(config.whatsapp.qr_timeout, Duration::from_secs(5));
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = WagateConfig::new(PathBuf::from("/data/wagate/auth_info.json"));
        config.whatsapp.qr_timeout = Duration::from_secs(90);
        config.save(&config_path).unwrap();

        let loaded = WagateConfig::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let credentials_path = temp_dir.path().join("auth_info.json");

        WagateConfig::create_default(&config_path, &credentials_path).unwrap();

        let config = WagateConfig::load(&config_path).unwrap();
        assert_eq!(config.whatsapp.credentials_path, credentials_path);
        assert_eq!(config, WagateConfig::new(credentials_path));
    }

    #[test]
    fn test_load_config_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let minimal_config = r#"
[whatsapp]
credentials_path = "/tmp/auth_info.json"
"#;
        fs::write(&config_path, minimal_config).unwrap();

        let config = WagateConfig::load(&config_path).unwrap();

        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.whatsapp.bridge_url, DEFAULT_BRIDGE_URL);
        assert_eq!(config.whatsapp.max_qr_attempts, DEFAULT_MAX_QR_ATTEMPTS);
        assert_eq!(config.whatsapp.send_timeout, Duration::from_secs(30));
        assert!(config.whatsapp.print_qr_in_terminal);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_humantime_durations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[whatsapp]
credentials_path = "/tmp/auth_info.json"
qr_timeout = "1m 30s"
send_timeout = "250ms"
dial_timeout = "2s"
"#,
        )
        .unwrap();

        let config = WagateConfig::load(&config_path).unwrap();
        assert_eq!(config.whatsapp.qr_timeout, Duration::from_secs(90));
        assert_eq!(config.whatsapp.send_timeout, Duration::from_millis(250));
        assert_eq!(config.whatsapp.dial_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[whatsapp]
credentials_path = "/tmp/auth_info.json"
qr_timeout = "soon"
"#,
        )
        .unwrap();

        assert!(WagateConfig::load(&config_path).is_err());
    }

    #[test]
    fn test_zero_attempt_budget_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[whatsapp]
credentials_path = "/tmp/auth_info.json"
max_qr_attempts = 0
"#,
        )
        .unwrap();

        let err = WagateConfig::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("max_qr_attempts"));
    }

    #[test]
    fn test_derived_component_configs() {
        let mut config = WagateConfig::new(PathBuf::from("/tmp/auth_info.json"));
        config.whatsapp.max_qr_attempts = 3;
        config.whatsapp.dial_retries = 0;
        config.whatsapp.dial_timeout = Duration::from_secs(3);

        let lifecycle = config.lifecycle_config();
        assert_eq!(lifecycle.max_qr_attempts, 3);
        assert_eq!(lifecycle.qr_timeout, DEFAULT_QR_TIMEOUT);

        let bridge = config.bridge_config();
        assert_eq!(bridge.url, DEFAULT_BRIDGE_URL);
        assert_eq!(bridge.dial_retry.max_retries, 0);
        assert_eq!(bridge.dial_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_default_paths_share_data_dir() {
        assert_eq!(default_config_path().parent(), Some(default_data_dir().as_path()));
        assert_eq!(
            default_credentials_path().parent(),
            Some(default_data_dir().as_path())
        );
    }
}
