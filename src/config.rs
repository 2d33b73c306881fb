use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind address (default: "0.0.0.0")
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port number (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Payment configuration
    #[serde(default)]
    pub payment: PaymentConfig,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Document store backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store, optionally seeded from a directory of JSON files
    Memory {
        #[serde(default)]
        seed: Option<PathBuf>,
    },
    /// MongoDB server; the database defaults to the one named in the URI
    Mongo {
        uri: String,
        #[serde(default)]
        database: Option<String>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { seed: None }
    }
}

/// Payment gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// ISO currency code charged in (default: "usd")
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "usd".to_string()
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            store: StoreConfig::default(),
            payment: PaymentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, environment, and CLI arguments
    pub fn load(
        config_path: Option<&PathBuf>,
        cli_bind: Option<&str>,
        cli_port: Option<u16>,
        cli_seed_path: Option<&PathBuf>,
        cli_db_uri: Option<&str>,
    ) -> anyhow::Result<Self> {
        // Start with default config
        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            // Try default config file
            if let Ok(content) = std::fs::read_to_string("storefront.toml") {
                toml::from_str(&content)?
            } else {
                Config::default()
            }
        };

        // Override with environment variables
        if let Ok(bind) = std::env::var("STOREFRONT_BIND") {
            config.bind = bind;
        }
        if let Ok(port) = std::env::var("STOREFRONT_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(path) = std::env::var("STOREFRONT_SEED_PATH") {
            config.store = StoreConfig::Memory {
                seed: Some(PathBuf::from(path)),
            };
        }
        if let Ok(uri) = std::env::var("STOREFRONT_DB_URI") {
            config.store = StoreConfig::Mongo {
                uri,
                database: std::env::var("STOREFRONT_DB_NAME").ok(),
            };
        }
        if let Ok(currency) = std::env::var("STOREFRONT_CURRENCY") {
            config.payment.currency = currency.to_lowercase();
        }

        // Override with CLI arguments
        if let Some(bind) = cli_bind {
            config.bind = bind.to_string();
        }
        if let Some(port) = cli_port {
            config.port = port;
        }
        if let Some(path) = cli_seed_path {
            config.store = StoreConfig::Memory {
                seed: Some(path.clone()),
            };
        }
        if let Some(uri) = cli_db_uri {
            let database = match &config.store {
                StoreConfig::Mongo { database, .. } => database.clone(),
                StoreConfig::Memory { .. } => None,
            };
            config.store = StoreConfig::Mongo {
                uri: uri.to_string(),
                database,
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_fill_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            port = 4000

            [store]
            type = "memory"
            seed = "./seed"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 4000);
        assert_eq!(config.store, StoreConfig::Memory { seed: Some(PathBuf::from("./seed")) });
        assert_eq!(config.payment.currency, "usd");
    }

    #[test]
    fn cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storefront.toml");
        std::fs::write(&path, "bind = \"127.0.0.1\"\nport = 4000\n").unwrap();

        let seed = PathBuf::from("/srv/seed");
        let config = Config::load(Some(&path), None, Some(5000), Some(&seed), None).unwrap();
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.store, StoreConfig::Memory { seed: Some(seed) });
    }

    #[test]
    fn mongo_backend_from_file() {
        let config: Config = toml::from_str(
            r#"
            [store]
            type = "mongo"
            uri = "mongodb://localhost:27017"
            database = "shop"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Mongo {
                uri: "mongodb://localhost:27017".into(),
                database: Some("shop".into()),
            }
        );
    }

    #[test]
    fn cli_uri_keeps_configured_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storefront.toml");
        std::fs::write(&path, "[store]\ntype = \"mongo\"\nuri = \"mongodb://a\"\ndatabase = \"shop\"\n").unwrap();

        let config = Config::load(Some(&path), None, None, None, Some("mongodb://b")).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Mongo {
                uri: "mongodb://b".into(),
                database: Some("shop".into()),
            }
        );
    }
}
