use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::codec::DEFAULT_MAX_RECORDS;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            run_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    /// Sunshine assumed for sites with no forecast data
    #[serde(default = "default_sunshine_percent")]
    pub default_sunshine_percent: u8,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            default_sunshine_percent: default_sunshine_percent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_max_schedules")]
    pub max_schedules: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_schedules: default_max_schedules(),
        }
    }
}

/// An energy site managed by this instance
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    /// Fixed sunshine forecast for the site, overriding the default
    #[serde(default)]
    pub sunshine_percent: Option<u8>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_tick_seconds() -> u64 {
    300
}
fn default_true() -> bool {
    true
}
fn default_sunshine_percent() -> u8 {
    100
}
fn default_max_schedules() -> usize {
    DEFAULT_MAX_RECORDS
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("ESC__").split("__"));
        Ok(figment.extract()?)
    }

    /// Site that import records without an `energySiteId` are assigned to
    pub fn default_site_id(&self) -> Option<&str> {
        self.sites.first().map(|s| s.id.as_str())
    }

    /// Sites schedules may target
    pub fn site_ids(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.id.clone()).collect()
    }
}
