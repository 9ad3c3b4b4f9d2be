// src/lib.rs

pub mod api;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod esign;
pub mod gateway;
pub mod models;
pub mod registry;
pub mod services;
pub mod validation;
pub mod worker;

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::esign::EsignClient;
use crate::gateway::GatewayClient;
use crate::registry::RegistryClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub gateway: GatewayClient,
    pub esign: EsignClient,
    pub registry: RegistryClient,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("benefits-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            gateway: GatewayClient::new(&config.gateway, http.clone()),
            esign: EsignClient::new(&config.esign, http.clone()),
            registry: RegistryClient::new(&config.registry, http),
            pool,
            config: Arc::new(config),
        })
    }
}
