use crate::consts::{DEFAULT_PARTICLES, DEFAULT_WORKERS};
use crate::error::{SpuxError, SpuxResult};
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub executor: ExecutorParams,
    #[command(flatten)]
    pub filter: FilterParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorParams {
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,
}

impl Default for ExecutorParams {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    #[arg(long, default_value_t = DEFAULT_PARTICLES)]
    pub particles: usize,
    #[arg(long, default_value_t = 10)]
    pub snapshots: usize,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    // Random walk model
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,
    #[arg(long, default_value_t = 0.5)]
    pub observation_noise: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            particles: DEFAULT_PARTICLES,
            snapshots: 10,
            seed: 42,
            noise: 1.0,
            observation_noise: 0.5,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SpuxResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn validate(&self) -> SpuxResult<()> {
        if self.executor.workers < 1 {
            return Err(SpuxError::Configuration(
                "--workers must be at least 1".to_string(),
            ));
        }
        if self.filter.particles < 1 {
            return Err(SpuxError::Configuration(
                "--particles must be at least 1".to_string(),
            ));
        }
        if self.filter.snapshots < 1 {
            return Err(SpuxError::Configuration(
                "--snapshots must be at least 1".to_string(),
            ));
        }
        if !(self.filter.noise > 0.0 && self.filter.observation_noise > 0.0) {
            return Err(SpuxError::Configuration(
                "noise levels must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Overrides file values with the arguments given explicitly on the
    /// command line.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($section:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$section.$field = cli.$section.$field.clone();
                }
            };
        }

        update_if_present!(executor.workers);

        update_if_present!(filter.particles);
        update_if_present!(filter.snapshots);
        update_if_present!(filter.seed);
        update_if_present!(filter.noise);
        update_if_present!(filter.observation_noise);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.executor.workers = 0;
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"executor":{"workers":5}}"#).unwrap();
        assert_eq!(config.executor.workers, 5);
        assert_eq!(config.filter.particles, DEFAULT_PARTICLES);
    }
}
