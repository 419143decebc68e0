//! Configuration for the capture server

use std::path::Path;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::capture::error::ConfigError;
use crate::capture::relay::RelayFilter;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// SMTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Decoding of captured messages
    #[serde(default)]
    pub storage: StorageConfig,

    /// Relay-domain filtering
    #[serde(default)]
    pub relay: RelayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SMTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname announced in greetings and trace headers
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `bind_address:port`, ready for `TcpListener::bind`
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    2525
}

/// Decoding of captured messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Encoding label of incoming message data (e.g. `UTF-8`, `ISO-8859-1`)
    #[serde(default)]
    pub charset: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            charset: Some("UTF-8".to_string()),
        }
    }
}

impl StorageConfig {
    /// Resolve the configured charset.
    ///
    /// Fails when the charset is missing or blank, unknown, or not
    /// ASCII-compatible (message lines are split on LF before decoding).
    pub fn encoding(&self) -> Result<&'static Encoding, ConfigError> {
        let label = self
            .charset
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .ok_or(ConfigError::MissingCharset)?;

        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| ConfigError::UnknownCharset(label.to_string()))?;
        if !encoding.is_ascii_compatible() {
            return Err(ConfigError::UnsupportedCharset(encoding.name()));
        }
        Ok(encoding)
    }
}

/// Relay-domain filtering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Accepted recipient domain suffixes; empty disables filtering
    #[serde(default)]
    pub domains: Vec<String>,
}

impl RelayConfig {
    pub fn filter(&self) -> RelayFilter {
        RelayFilter::new(self.domains.iter().cloned())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CaptureConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `MAILSINK_PORT`: listening port
    /// - `MAILSINK_CHARSET`: storage charset label
    /// - `MAILSINK_RELAY_DOMAINS`: comma-separated relay domains
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = std::env::var("MAILSINK_PORT") {
            self.server.port = parse_port(&port)?;
        }
        if let Ok(charset) = std::env::var("MAILSINK_CHARSET") {
            self.storage.charset = Some(charset);
        }
        if let Ok(domains) = std::env::var("MAILSINK_RELAY_DOMAINS") {
            self.relay.domains = split_domains(&domains);
        }
        Ok(())
    }
}

/// Parse a port given as text (command line or environment).
pub fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|source| ConfigError::InvalidPort {
            value: value.to_string(),
            source,
        })
}

fn split_domains(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|domain| !domain.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();

        assert_eq!(config.server.hostname, "localhost");
        assert_eq!(config.server.address(), "127.0.0.1:2525");
        assert_eq!(config.storage.charset.as_deref(), Some("UTF-8"));
        assert!(config.relay.domains.is_empty());
        assert!(!config.relay.filter().is_filtering());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let config = CaptureConfig::parse(
            r#"
            [server]
            hostname = "capture.local"
            bind_address = "0.0.0.0"
            port = 2626

            [storage]
            charset = "ISO-8859-1"

            [relay]
            domains = ["example.com", "example.org"]

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.address(), "0.0.0.0:2626");
        assert_eq!(config.server.hostname, "capture.local");
        assert_eq!(config.storage.encoding().unwrap(), encoding_rs::WINDOWS_1252);
        assert_eq!(config.relay.domains, vec!["example.com", "example.org"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = CaptureConfig::parse("").unwrap();
        assert_eq!(config.server.port, 2525);
        assert_eq!(config.storage.encoding().unwrap(), encoding_rs::UTF_8);
    }

    #[test]
    fn test_storage_table_without_charset() {
        let config = CaptureConfig::parse("[storage]\n").unwrap();
        assert!(matches!(
            config.storage.encoding(),
            Err(ConfigError::MissingCharset)
        ));
    }

    #[test]
    fn test_blank_charset() {
        let storage = StorageConfig {
            charset: Some("  ".to_string()),
        };
        assert!(matches!(storage.encoding(), Err(ConfigError::MissingCharset)));
    }

    #[test]
    fn test_unknown_charset() {
        let storage = StorageConfig {
            charset: Some("klingon".to_string()),
        };
        assert!(matches!(
            storage.encoding(),
            Err(ConfigError::UnknownCharset(label)) if label == "klingon"
        ));
    }

    #[test]
    fn test_utf16_is_refused() {
        let storage = StorageConfig {
            charset: Some("UTF-16LE".to_string()),
        };
        assert!(matches!(
            storage.encoding(),
            Err(ConfigError::UnsupportedCharset("UTF-16LE"))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            CaptureConfig::parse("[server]\nport = \"abc\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("2525").unwrap(), 2525);
        assert_eq!(parse_port(" 25 ").unwrap(), 25);
        assert!(matches!(
            parse_port("25a"),
            Err(ConfigError::InvalidPort { value, .. }) if value == "25a"
        ));
        assert!(parse_port("70000").is_err());
        assert!(parse_port("").is_err());
    }

    #[test]
    fn test_split_domains() {
        assert_eq!(
            split_domains(" a.com, ,b.org,"),
            vec!["a.com".to_string(), "b.org".to_string()]
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[relay]\ndomains = [\"accept.com\"]").unwrap();

        let config = CaptureConfig::load(file.path()).unwrap();
        assert_eq!(config.relay.domains, vec!["accept.com"]);
    }

    // All environment handling lives in this one test so nothing else races
    // on the process environment.
    #[test]
    fn test_load_with_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 2600\n\n[storage]\ncharset = \"UTF-8\"\n\n[relay]\ndomains = [\"file.com\"]"
        )
        .unwrap();

        unsafe {
            std::env::set_var("MAILSINK_PORT", "2700");
            std::env::set_var("MAILSINK_CHARSET", "ISO-8859-1");
            std::env::set_var("MAILSINK_RELAY_DOMAINS", "a.com, b.org");
        }
        let config = CaptureConfig::load_with_env(file.path());

        unsafe {
            std::env::set_var("MAILSINK_PORT", "not-a-port");
        }
        let bad_port = CaptureConfig::load_with_env(file.path());

        unsafe {
            std::env::remove_var("MAILSINK_PORT");
            std::env::remove_var("MAILSINK_CHARSET");
            std::env::remove_var("MAILSINK_RELAY_DOMAINS");
        }
        let untouched = CaptureConfig::load_with_env(file.path()).unwrap();

        let config = config.unwrap();
        assert_eq!(config.server.port, 2700);
        assert_eq!(config.storage.encoding().unwrap(), encoding_rs::WINDOWS_1252);
        assert_eq!(config.relay.domains, vec!["a.com", "b.org"]);

        assert!(matches!(
            bad_port,
            Err(ConfigError::InvalidPort { value, .. }) if value == "not-a-port"
        ));

        assert_eq!(untouched.server.port, 2600);
        assert_eq!(untouched.storage.charset.as_deref(), Some("UTF-8"));
        assert_eq!(untouched.relay.domains, vec!["file.com"]);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            CaptureConfig::load("/nonexistent/mailsink.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
