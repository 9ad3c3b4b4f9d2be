// src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

const GATEWAY_SANDBOX_URL: &str = "https://sandbox-app.vindi.com.br/api/v1";
const GATEWAY_PRODUCTION_URL: &str = "https://app.vindi.com.br/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl FromStr for GatewayEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" | "producao" => Ok(Self::Production),
            other => Err(format!("unknown gateway environment: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: GatewayEnvironment,
    pub base_url: String,
    pub api_key: Option<String>,
    pub public_key: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EsignConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub template_id: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_attempts: i32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub http_timeout_secs: u64,
    pub cors_allowed_origins: Vec<String>,
    pub reconcile_interval_secs: u64,
    pub reconcile_batch_size: i64,
    pub gateway: GatewayConfig,
    pub esign: EsignConfig,
    pub registry: RegistryConfig,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Failed to parse {key}")),
        None => Ok(default),
    }
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded by the binary).
    ///
    /// Only the database URL and the JWT secret are mandatory. Provider keys may be
    /// missing; the operations that need them fail with a configuration error instead.
    pub fn from_env() -> Result<Self> {
        let database_url = optional("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = optional("JWT_SECRET").context("JWT_SECRET must be set")?;

        let environment: GatewayEnvironment = match optional("GATEWAY_ENVIRONMENT") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Failed to parse GATEWAY_ENVIRONMENT")?,
            None => GatewayEnvironment::default(),
        };
        let gateway_base_url = optional("GATEWAY_BASE_URL").unwrap_or_else(|| {
            match environment {
                GatewayEnvironment::Sandbox => GATEWAY_SANDBOX_URL,
                GatewayEnvironment::Production => GATEWAY_PRODUCTION_URL,
            }
            .to_string()
        });

        let cors_allowed_origins = optional("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            host: parsed("SERVER_HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parsed("SERVER_PORT", 8080)?,
            database_url,
            jwt_secret,
            jwt_ttl_days: parsed("JWT_TTL_DAYS", 7)?,
            http_timeout_secs: parsed("HTTP_TIMEOUT_SECS", 15)?,
            cors_allowed_origins,
            reconcile_interval_secs: parsed("RECONCILE_INTERVAL_SECS", 300)?,
            reconcile_batch_size: parsed("RECONCILE_BATCH_SIZE", 50)?,
            gateway: GatewayConfig {
                environment,
                base_url: gateway_base_url.trim_end_matches('/').to_string(),
                api_key: optional("GATEWAY_API_KEY"),
                public_key: optional("GATEWAY_PUBLIC_KEY"),
                webhook_secret: optional("GATEWAY_WEBHOOK_SECRET"),
            },
            esign: EsignConfig {
                base_url: optional("ESIGN_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
                api_key: optional("ESIGN_API_KEY"),
                template_id: optional("ESIGN_TEMPLATE_ID"),
                webhook_secret: optional("ESIGN_WEBHOOK_SECRET"),
            },
            registry: RegistryConfig {
                base_url: optional("REGISTRY_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
                api_key: optional("REGISTRY_API_KEY"),
                max_attempts: parsed("REGISTRY_MAX_ATTEMPTS", 5)?,
            },
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.gateway.environment == GatewayEnvironment::Production
    }
}
