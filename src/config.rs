//! Control-plane configuration.
//!
//! Loaded as a layered build (defaults → optional file → environment,
//! prefix `FLEET_`) and deserialized into a typed struct — config values are
//! never read field-by-field from `std::env` below this module.

use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration for the control plane process.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::registry_endpoint")]
    pub registry_endpoint: String,

    #[serde(default = "defaults::fargate_cluster_name")]
    pub fargate_cluster_name: String,

    #[serde(default = "defaults::subnet_1")]
    pub subnet_1: String,

    #[serde(default = "defaults::subnet_2")]
    pub subnet_2: String,

    #[serde(default = "defaults::security_group")]
    pub security_group: String,

    #[serde(default = "defaults::task_definition")]
    pub task_definition: String,

    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub scaler: ScalerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_endpoint: defaults::registry_endpoint(),
            fargate_cluster_name: defaults::fargate_cluster_name(),
            subnet_1: defaults::subnet_1(),
            subnet_2: defaults::subnet_2(),
            security_group: defaults::security_group(),
            task_definition: defaults::task_definition(),
            bind_address: defaults::bind_address(),
            scaler: ScalerConfig::default(),
        }
    }
}

/// Autoscaler policy knobs. Passed explicitly into the autoscaler loop
/// rather than held as process-globals, so tests can exercise the scaling
/// decision deterministically with any values they like.
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerConfig {
    #[serde(default = "defaults::containers_in_task")]
    pub containers_in_task: u32,

    #[serde(default = "defaults::total_game_servers_target_min")]
    pub total_game_servers_target_min: u32,

    #[serde(default = "defaults::max_game_servers_to_start")]
    pub max_game_servers_to_start: u32,

    #[serde(default = "defaults::available_game_servers_target_percentage")]
    pub available_game_servers_target_percentage: f64,

    #[serde(default = "defaults::max_players")]
    pub max_players: u32,

    #[serde(default = "defaults::server_startup_grace_period_secs")]
    pub server_startup_grace_period_secs: u64,

    #[serde(default = "defaults::tick_duration_secs")]
    pub tick_duration_secs: u64,

    #[serde(default = "defaults::inner_cadence_secs")]
    pub inner_cadence_secs: u64,
}

impl ScalerConfig {
    pub fn server_startup_grace_period(&self) -> Duration {
        Duration::from_secs(self.server_startup_grace_period_secs)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs(self.tick_duration_secs)
    }

    pub fn inner_cadence(&self) -> Duration {
        Duration::from_secs(self.inner_cadence_secs)
    }
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            containers_in_task: defaults::containers_in_task(),
            total_game_servers_target_min: defaults::total_game_servers_target_min(),
            max_game_servers_to_start: defaults::max_game_servers_to_start(),
            available_game_servers_target_percentage:
                defaults::available_game_servers_target_percentage(),
            max_players: defaults::max_players(),
            server_startup_grace_period_secs: defaults::server_startup_grace_period_secs(),
            tick_duration_secs: defaults::tick_duration_secs(),
            inner_cadence_secs: defaults::inner_cadence_secs(),
        }
    }
}

mod defaults {
    pub fn registry_endpoint() -> String {
        "redis://127.0.0.1:6379/0".into()
    }

    pub fn fargate_cluster_name() -> String {
        "game-servers".into()
    }

    pub fn subnet_1() -> String {
        String::new()
    }

    pub fn subnet_2() -> String {
        String::new()
    }

    pub fn security_group() -> String {
        String::new()
    }

    pub fn task_definition() -> String {
        String::new()
    }

    pub fn bind_address() -> String {
        "0.0.0.0:8080".into()
    }

    pub fn containers_in_task() -> u32 {
        10
    }

    pub fn total_game_servers_target_min() -> u32 {
        30
    }

    pub fn max_game_servers_to_start() -> u32 {
        30
    }

    pub fn available_game_servers_target_percentage() -> f64 {
        0.20
    }

    pub fn max_players() -> u32 {
        2
    }

    pub fn server_startup_grace_period_secs() -> u64 {
        60
    }

    pub fn tick_duration_secs() -> u64 {
        58
    }

    pub fn inner_cadence_secs() -> u64 {
        2
    }
}

/// Load configuration from defaults, an optional `fleet.toml`/`fleet.yaml` in
/// the working directory, then the `FLEET_` environment prefix — plus the
/// handful of env vars the source system used directly, kept for parity.
pub fn load() -> Result<Config, crate::Error> {
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::with_name("fleet").required(false))
        .add_source(::config::Environment::with_prefix("FLEET").separator("__"));

    // Parity env vars from the original deployment, taking precedence over
    // defaults but not over an explicit FLEET_-prefixed override.
    if let Ok(v) = std::env::var("REDIS_ENDPOINT") {
        builder = builder.set_override("registry_endpoint", v).map_err(cfg_err)?;
    }
    if let Ok(v) = std::env::var("FARGATE_CLUSTER_NAME") {
        builder = builder
            .set_override("fargate_cluster_name", v)
            .map_err(cfg_err)?;
    }
    if let Ok(v) = std::env::var("SUBNET_1") {
        builder = builder.set_override("subnet_1", v).map_err(cfg_err)?;
    }
    if let Ok(v) = std::env::var("SUBNET_2") {
        builder = builder.set_override("subnet_2", v).map_err(cfg_err)?;
    }
    if let Ok(v) = std::env::var("SECURITY_GROUP") {
        builder = builder.set_override("security_group", v).map_err(cfg_err)?;
    }
    if let Ok(v) = std::env::var("TASK_DEFINITION") {
        builder = builder.set_override("task_definition", v).map_err(cfg_err)?;
    }

    builder
        .build()
        .map_err(cfg_err)?
        .try_deserialize()
        .map_err(cfg_err)
}

fn cfg_err(e: impl std::fmt::Display) -> crate::Error {
    crate::Error::Config(e.to_string())
}
