use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::log::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HTTPConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}
impl AppConfig {
    /// Loads the TOML config file (if any), then applies `GEMINI_API_KEY` and `PORT`.
    ///
    /// An explicitly given path must exist. Without one, a missing `config.toml`
    /// simply means every value is defaulted.
    pub fn load(config_filepath: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_filepath {
            Some(config_path) => Self::from_file(config_path)?,
            None => {
                let config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if config_path.is_file() {
                    Self::from_file(config_path)?
                } else {
                    debug!("No {DEFAULT_CONFIG_PATH} found, using default configuration");
                    Self::default()
                }
            }
        };

        config.apply_overrides(
            std::env::var("GEMINI_API_KEY").ok(),
            std::env::var("PORT").ok(),
        )?;
        Ok(config)
    }

    fn from_file(config_path: PathBuf) -> Result<Self> {
        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;

        let config: AppConfig = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse TOML config file: {config_path:?}"))?;

        info!("Loaded configuration from {config_path:?}");
        Ok(config)
    }

    fn apply_overrides(&mut self, api_key: Option<String>, port: Option<String>) -> Result<()> {
        if let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) {
            self.gemini.api_key = Some(api_key);
        }

        if let Some(port) = port.filter(|port| !port.trim().is_empty()) {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT environment variable: {port:?}"))?;
            self.http.address.set_port(port);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HTTPConfig {
    #[serde(default = "default_http_address")]
    pub address: SocketAddr,

    #[serde(default)]
    pub tls: Option<TLSConfig>,
}
impl Default for HTTPConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            tls: None,
        }
    }
}

#[cfg_attr(
    not(any(feature = "tls-rustls", feature = "tls-native")),
    allow(dead_code)
)]
#[derive(Debug, Clone, Deserialize)]
pub struct TLSConfig {
    #[serde(deserialize_with = "deserialize_existing_file")]
    pub certificate_path: PathBuf,

    #[serde(deserialize_with = "deserialize_existing_file")]
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// Initial API key, usually supplied through `GEMINI_API_KEY` instead.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Request timeout in seconds, no timeout when unset.
    #[serde(default)]
    pub timeout: Option<u64>,
}
impl GeminiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}
impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_gemini_endpoint(),
            model: default_gemini_model(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    /// Directory holding the protocol engine session files.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    /// Name shown in the phone's linked devices list.
    #[serde(default = "default_device_name")]
    pub device_name: String,
}
impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            device_name: default_device_name(),
        }
    }
}

fn default_http_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000)
}
fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_session_dir() -> PathBuf {
    PathBuf::from("./session")
}
fn default_device_name() -> String {
    "Chrome".to_string()
}

fn deserialize_existing_file<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = PathBuf::deserialize(deserializer)?;
    if !path.exists() {
        return Err(serde::de::Error::custom(format!(
            "File does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(serde::de::Error::custom(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }
    Ok(path)
}
