//! Configuration for the thesis-supervision services: a `tsup.toml` file
//! merged with `TSUP_`-prefixed environment variables.

use std::path::PathBuf;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct SweepConfig {
    /// JSON snapshot of the engine state the sweep job reads and writes.
    pub snapshot: PathBuf,
    /// Seconds between sweeps; unset means run once and exit.
    pub interval_secs: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub sweep: SweepConfig,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] figment::Error),
}

pub fn get_config() -> Result<Config, ConfigError> {
    Ok(Figment::new()
        .merge(Toml::file("tsup.toml"))
        .merge(Env::prefixed("TSUP_").split("__"))
        .extract()?)
}
