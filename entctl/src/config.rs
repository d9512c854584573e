//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `ENTCTL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `ENTCTL_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `ENTCTL_AUTH__BASIC__ENABLED=false` disables basic authentication.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ENTCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Username for the initial admin user (created on first startup)
    pub admin_username: String,
    /// Password for the initial admin user (optional, can be set via environment)
    pub admin_password: Option<String>,
    /// Authentication configuration for various auth methods
    pub auth: AuthConfig,
    /// Paging defaults and limits for list endpoints
    pub paging: PagingConfig,
}

/// Individual pool configuration with all SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
        }
    }
}

/// External PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string for the database
    pub url: String,
    /// Connection pool settings
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/entctl".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// The authentication strategies, named for chain-order configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Trusted identity headers from a co-located caller
    TrustedHeader,
    /// TLS client certificate common name forwarded by the terminator
    ClientCert,
    /// Bearer access token
    BearerToken,
    /// HTTP Basic username/password
    Basic,
}

/// Authentication configuration for all supported auth methods.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Order in which enabled strategies are consulted. The first strategy
    /// that resolves a principal wins; disabled strategies are skipped.
    pub strategy_order: Vec<StrategyKind>,
    /// Trusted header authentication (for co-located internal callers)
    pub trusted_header: TrustedHeaderAuthConfig,
    /// TLS client certificate authentication
    pub client_cert: ClientCertAuthConfig,
    /// Bearer access token authentication
    pub bearer_token: BearerTokenAuthConfig,
    /// HTTP Basic username/password authentication
    pub basic: BasicAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            strategy_order: vec![
                StrategyKind::TrustedHeader,
                StrategyKind::ClientCert,
                StrategyKind::BearerToken,
                StrategyKind::Basic,
            ],
            trusted_header: TrustedHeaderAuthConfig::default(),
            client_cert: ClientCertAuthConfig::default(),
            bearer_token: BearerTokenAuthConfig::default(),
            basic: BasicAuthConfig::default(),
        }
    }
}

/// Trusted header authentication configuration.
///
/// Reads user identity from HTTP headers set by a trusted co-located caller.
/// Only enable this behind a boundary that strips these headers from external
/// traffic; a caller who can set them is fully trusted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrustedHeaderAuthConfig {
    /// Enable trusted header authentication
    pub enabled: bool,
    /// Header carrying the asserted username
    pub user_header: String,
    /// Header requesting a role lookup for the asserted user. When the value
    /// is "true", roles are loaded from the identity store instead of
    /// granting full access.
    pub lookup_header: String,
}

impl Default for TrustedHeaderAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user_header: "cp-user".to_string(),
            lookup_header: "cp-lookup-permissions".to_string(),
        }
    }
}

/// TLS client certificate authentication configuration.
///
/// The TLS terminator verifies the certificate and forwards the subject
/// common name in a header.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientCertAuthConfig {
    /// Enable client certificate authentication
    pub enabled: bool,
    /// Header carrying the verified certificate common name
    pub common_name_header: String,
}

impl Default for ClientCertAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            common_name_header: "x-ssl-client-cn".to_string(),
        }
    }
}

/// Bearer access token authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BearerTokenAuthConfig {
    /// Enable bearer token authentication
    pub enabled: bool,
}

impl Default for BearerTokenAuthConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// HTTP Basic authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BasicAuthConfig {
    /// Enable basic authentication
    pub enabled: bool,
}

impl Default for BasicAuthConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Paging defaults and limits for list endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagingConfig {
    /// Per-page value substituted when `page` is supplied without `per_page`
    pub default_per_page: i32,
    /// Largest accepted `per_page` value. Requests above this are rejected,
    /// not clamped.
    pub max_per_page: i32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            max_per_page: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database: DatabaseConfig::default(),
            admin_username: "admin".to_string(),
            admin_password: None,
            auth: AuthConfig::default(),
            paging: PagingConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("ENTCTL_").split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()).split("."))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let enabled = |kind: &StrategyKind| match kind {
            StrategyKind::TrustedHeader => self.auth.trusted_header.enabled,
            StrategyKind::ClientCert => self.auth.client_cert.enabled,
            StrategyKind::BearerToken => self.auth.bearer_token.enabled,
            StrategyKind::Basic => self.auth.basic.enabled,
        };

        if !self.auth.strategy_order.iter().any(enabled) {
            return Err(Error::Internal {
                operation: "Config validation: No authentication strategies are both enabled and listed in \
                            auth.strategy_order. Enable at least one strategy."
                    .to_string(),
            });
        }

        for (i, kind) in self.auth.strategy_order.iter().enumerate() {
            if self.auth.strategy_order[..i].contains(kind) {
                return Err(Error::Internal {
                    operation: format!("Config validation: auth.strategy_order lists {kind:?} more than once"),
                });
            }
        }

        if self.paging.default_per_page < 1 {
            return Err(Error::Internal {
                operation: "Config validation: paging.default_per_page must be at least 1".to_string(),
            });
        }

        if self.paging.max_per_page < self.paging.default_per_page {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: paging.max_per_page ({}) cannot be less than paging.default_per_page ({})",
                    self.paging.max_per_page, self.paging.default_per_page
                ),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.paging.default_per_page, 10);
        assert_eq!(config.auth.strategy_order[0], StrategyKind::TrustedHeader);
    }

    #[test]
    fn test_yaml_with_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 8080
auth:
  trusted_header:
    enabled: true
    user_header: x-internal-user
paging:
  default_per_page: 25
"#,
            )?;
            jail.set_env("ENTCTL_AUTH__BASIC__ENABLED", "false");

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args).expect("config should load");

            assert_eq!(config.port, 8080);
            assert!(config.auth.trusted_header.enabled);
            assert_eq!(config.auth.trusted_header.user_header, "x-internal-user");
            assert!(!config.auth.basic.enabled);
            assert_eq!(config.paging.default_per_page, 25);
            Ok(())
        });
    }

    #[test]
    fn test_database_url_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 8080\n")?;
            jail.set_env("DATABASE_URL", "postgres://db.internal:5432/entitlements");

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args).expect("config should load");
            assert_eq!(config.database.url, "postgres://db.internal:5432/entitlements");
            Ok(())
        });
    }

    #[test]
    fn test_rejects_all_strategies_disabled() {
        let mut config = Config::default();
        config.auth.bearer_token.enabled = false;
        config.auth.basic.enabled = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_strategy_order() {
        let mut config = Config::default();
        config.auth.strategy_order.push(StrategyKind::Basic);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_max_per_page_below_default() {
        let mut config = Config::default();
        config.paging.max_per_page = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "not_a_real_field: true\n")?;
            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };
            assert!(Config::load(&args).is_err());
            Ok(())
        });
    }
}
