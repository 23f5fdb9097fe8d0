//! Configuration module
//!
//! This module provides configuration for the API service: database,
//! server, CORS, and membership-invitation settings.

use std::env;

use crate::error::AppError;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const INVITATION_EXPIRY_DAYS: i64 = 14;

/// Application configuration, read from the environment once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub invitation_expiry_days: i64,
    pub environment: String,
}

impl AppConfig {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(AppError::Configuration(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
                    .to_string(),
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let config = AppConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| {
                    AppError::Configuration("PORT must be a valid number".to_string())
                })?,
            database_url: env::var("DATABASE_URL").map_err(|_| {
                AppError::Configuration("DATABASE_URL must be set".to_string())
            })?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            invitation_expiry_days: env::var("INVITATION_EXPIRY_DAYS")
                .unwrap_or_else(|_| INVITATION_EXPIRY_DAYS.to_string())
                .parse()
                .unwrap_or(INVITATION_EXPIRY_DAYS),
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(AppError::Configuration(
                "DATABASE_URL must be a valid PostgreSQL connection string".to_string(),
            ));
        }

        if self.invitation_expiry_days < 1 {
            return Err(AppError::Configuration(
                "INVITATION_EXPIRY_DAYS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
