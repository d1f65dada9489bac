use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::warn;

pub(crate) const DEFAULT_REGISTRY_PATH: &str = "providers/registry.yml";
pub(crate) const DEFAULT_EVALUATORS_DIR: &str = "evaluators";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("failed to read config \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct Execution {
    /// Program and arguments of the evaluation process.
    #[serde(default)]
    pub command: Vec<String>,
    /// Seconds before an evaluation process is killed.
    pub timeout: Option<u64>,
    pub jobs: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct Logging {
    pub json: Option<bool>,
    pub level: Option<String>,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct Config {
    pub registry: Option<PathBuf>,
    pub evaluators: Option<PathBuf>,
    #[serde(default)]
    pub execution: Execution,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub(crate) fn registry_path(&self) -> PathBuf {
        self.registry
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_PATH))
    }

    pub(crate) fn evaluators_dir(&self) -> PathBuf {
        self.evaluators
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EVALUATORS_DIR))
    }

    pub(crate) fn timeout_secs(&self) -> u64 {
        self.execution.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/xeval/config.toml", ".xeval.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/xeval.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a String>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        if let Some(config_value) = config.get(user_key) {
            if let (toml::Value::Table(user_value), toml::Value::Table(config_value)) =
                (user_value, config_value)
            {
                extra_fields_helper(path, user_value, config_value, extra);
            }
        } else {
            let path: Vec<&str> = path.iter().map(|&s| s.as_str()).collect();

            extra.push(path.join("."));
        }

        path.pop();
    }
}

/// Dotted paths of keys in `raw_config` that `config` does not know about.
fn extra_fields(config: &Config, raw_config: &str) -> Result<Vec<String>, Error> {
    let user_config: toml::Table = toml::de::from_str(raw_config)?;

    let known = match toml::Value::try_from(config) {
        Ok(toml::Value::Table(table)) => table,
        _ => toml::Table::new(),
    };

    let mut path = Vec::new();
    let mut extra = Vec::new();

    extra_fields_helper(&mut path, &user_config, &known, &mut extra);

    Ok(extra)
}

pub(crate) fn parse_config(raw_config: &str) -> Result<Config, Error> {
    let config: Config = toml::de::from_str(raw_config)?;

    for key in extra_fields(&config, raw_config)? {
        warn!("config contains extraneous key \"{}\", ignoring", key);
    }

    Ok(config)
}

/// Read the config at `config`, or the first one found in the default locations. No config
/// file at all yields the defaults.
pub(crate) fn read_config(config: Option<&Path>) -> Result<Config, Error> {
    let config_path = config.map(Path::to_path_buf).or_else(get_config_path);

    match config_path {
        Some(path) => {
            let raw_config = std::fs::read_to_string(&path).map_err(|e| Error::Read {
                path: path.clone(),
                source: e,
            })?;

            parse_config(&raw_config)
        }
        None => Ok(Config::default()),
    }
}
