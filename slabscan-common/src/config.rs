//! Configuration loading for slabscan services
//!
//! Each key resolves environment variable first, then the TOML config file,
//! then the compiled default. The config file lives at `$SLABSCAN_CONFIG`
//! if set, otherwise `~/.config/slabscan/config.toml`; a missing file is
//! not an error.
//!
//! Provider credential blocks are optional: when absent, the corresponding
//! provider runs in its deterministic fallback mode rather than failing.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "*";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_VISION_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MARKETPLACE_ID: &str = "EBAY-US";

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub allowed_origin: String,
    /// Vision provider credential; None switches identity resolution to
    /// the deterministic offline resolver
    pub vision: Option<VisionConfig>,
    /// Marketplace credential; None switches valuation to the heuristic
    /// fallback
    pub marketplace: Option<MarketplaceConfig>,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub client_id: String,
    pub client_secret: String,
    pub marketplace_id: String,
}

/// On-disk configuration file shape. All keys optional.
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub allowed_origin: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub ebay_client_id: Option<String>,
    pub ebay_client_secret: Option<String>,
    pub ebay_marketplace_id: Option<String>,
}

impl AppConfig {
    /// Resolve configuration from environment and config file
    pub fn load() -> Self {
        let file = load_config_file();
        Self::from_sources(&file)
    }

    /// Resolve configuration against an explicit file layer (env still
    /// takes priority). Split out so tests can drive the file layer.
    pub fn from_sources(file: &TomlConfig) -> Self {
        let port = resolve("SLABSCAN_PORT", file.port.map(|p| p.to_string()))
            .and_then(|value| match value.parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    warn!(value = %value, "Invalid port value, using default");
                    None
                }
            })
            .unwrap_or(DEFAULT_PORT);

        let allowed_origin = resolve("SLABSCAN_ALLOWED_ORIGIN", file.allowed_origin.clone())
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.to_string());

        let vision = resolve("SLABSCAN_OPENAI_API_KEY", file.openai_api_key.clone()).map(
            |api_key| VisionConfig {
                api_key,
                model: resolve("SLABSCAN_OPENAI_MODEL", file.openai_model.clone())
                    .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
                base_url: resolve("SLABSCAN_OPENAI_BASE_URL", file.openai_base_url.clone())
                    .unwrap_or_else(|| DEFAULT_VISION_BASE_URL.to_string()),
            },
        );

        let client_id = resolve("SLABSCAN_EBAY_CLIENT_ID", file.ebay_client_id.clone());
        let client_secret = resolve("SLABSCAN_EBAY_CLIENT_SECRET", file.ebay_client_secret.clone());
        let marketplace = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(MarketplaceConfig {
                client_id,
                client_secret,
                marketplace_id: resolve(
                    "SLABSCAN_EBAY_MARKETPLACE_ID",
                    file.ebay_marketplace_id.clone(),
                )
                .unwrap_or_else(|| DEFAULT_MARKETPLACE_ID.to_string()),
            }),
            (None, None) => None,
            _ => {
                warn!("Marketplace credentials incomplete (need both client id and secret), ignoring");
                None
            }
        };

        Self {
            port,
            allowed_origin,
            vision,
            marketplace,
        }
    }
}

/// Env var wins over the file layer; empty values are treated as unset.
fn resolve(env_name: &str, file_value: Option<String>) -> Option<String> {
    if let Ok(value) = std::env::var(env_name) {
        if !value.trim().is_empty() {
            return Some(value);
        }
    }
    file_value.filter(|value| !value.trim().is_empty())
}

fn load_config_file() -> TomlConfig {
    let Some(path) = config_file_path() else {
        return TomlConfig::default();
    };
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using env/defaults");
        return TomlConfig::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded config file");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse config file, ignoring");
                TomlConfig::default()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read config file, ignoring");
            TomlConfig::default()
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SLABSCAN_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("slabscan").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_parses_partial_file() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 8080
            ebay_client_id = "app-id"
            ebay_client_secret = "app-secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, Some(8080));
        assert_eq!(config.ebay_client_id.as_deref(), Some("app-id"));
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn missing_credentials_disable_providers() {
        let config = AppConfig::from_sources(&TomlConfig::default());
        assert!(config.vision.is_none());
        assert!(config.marketplace.is_none());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.allowed_origin, DEFAULT_ALLOWED_ORIGIN);
    }

    #[test]
    fn file_layer_fills_credential_blocks() {
        let file = TomlConfig {
            openai_api_key: Some("sk-test".to_string()),
            ebay_client_id: Some("id".to_string()),
            ebay_client_secret: Some("secret".to_string()),
            ..TomlConfig::default()
        };

        let config = AppConfig::from_sources(&file);
        let vision = config.vision.expect("vision block");
        assert_eq!(vision.model, DEFAULT_VISION_MODEL);
        let marketplace = config.marketplace.expect("marketplace block");
        assert_eq!(marketplace.marketplace_id, DEFAULT_MARKETPLACE_ID);
    }

    #[test]
    fn lone_client_id_is_ignored() {
        let file = TomlConfig {
            ebay_client_id: Some("id-only".to_string()),
            ..TomlConfig::default()
        };

        let config = AppConfig::from_sources(&file);
        assert!(config.marketplace.is_none());
    }
}
