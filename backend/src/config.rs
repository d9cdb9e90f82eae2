//! Configuration management for the Household Pantry backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with PANTRY_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Shopping list planning configuration
    pub planning: PlanningConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for verifying JWT tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlanningConfig {
    /// Priced batches averaged for a price estimate (at least 1)
    pub price_history_limit: u32,

    /// Days of consumption history behind the forecast
    pub forecast_lookback_days: u32,

    /// Allow generating a list while another one is still active
    pub allow_multiple_active_lists: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("PANTRY_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("planning.price_history_limit", 10)?
            .set_default("planning.forecast_lookback_days", 30)?
            .set_default("planning.allow_multiple_active_lists", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PANTRY_ prefix)
            .add_source(
                Environment::with_prefix("PANTRY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.planning.validate()?;
        Ok(config)
    }
}

impl PlanningConfig {
    /// Reject settings the planner cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.price_history_limit == 0 {
            return Err(ConfigError::Message(
                "planning.price_history_limit must be at least 1".to_string(),
            ));
        }
        if self.forecast_lookback_days == 0 {
            return Err(ConfigError::Message(
                "planning.forecast_lookback_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            price_history_limit: 10,
            forecast_lookback_days: 30,
            allow_multiple_active_lists: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_planning_is_valid() {
        assert!(PlanningConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_price_history_rejected() {
        let planning = PlanningConfig {
            price_history_limit: 0,
            ..PlanningConfig::default()
        };
        assert!(planning.validate().is_err());
    }

    #[test]
    fn test_negative_price_history_fails_to_load() {
        let source = config::Config::builder()
            .set_override("price_history_limit", -5)
            .and_then(|b| b.set_override("forecast_lookback_days", 30))
            .and_then(|b| b.set_override("allow_multiple_active_lists", false))
            .and_then(|b| b.build())
            .unwrap();
        assert!(source.try_deserialize::<PlanningConfig>().is_err());
    }
}
