use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::MAX_QUEUE_SIZE;
use crate::error::{ConfigError, ValidationError};
use crate::lifecycle::controller::DEFAULT_STOP_TIMEOUT;
use crate::providers::llm::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::types::FactoryConfig;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FactorySection {
    pub goal: Option<String>,
    pub backstory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub host: String,
    pub port: u16,
    pub queue_capacity: usize,
    pub stop_timeout_secs: f64,
    pub log_file: Option<PathBuf>,
    /// Run the crew with the scripted runner instead of calling the model.
    pub offline: bool,
    pub factory: FactorySection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            host: "0.0.0.0".to_string(),
            port: 5001,
            queue_capacity: MAX_QUEUE_SIZE,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT.as_secs_f64(),
            log_file: Some(PathBuf::from("crew_server.log")),
            offline: false,
            factory: FactorySection::default(),
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_VAR).filter(|k| !k.trim().is_empty()) {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.openai_base_url = Some(url);
        }
        if let Some(model) = lookup("CREW_MODEL") {
            self.model = model;
        }
        if let Some(value) = lookup("CREW_TEMPERATURE") {
            self.temperature = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CREW_TEMPERATURE",
                value,
            })?;
        }
        if let Some(host) = lookup("CREW_HOST") {
            self.host = host;
        }
        if let Some(value) = lookup("CREW_PORT") {
            self.port = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CREW_PORT",
                value,
            })?;
        }
        Ok(())
    }

    /// Fails fast when the model cannot be reached for lack of credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.offline && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingEnv(API_KEY_VAR));
        }
        self.stop_timeout()?;
        self.factory_config()?;
        Ok(())
    }

    pub fn factory_config(&self) -> Result<FactoryConfig, ValidationError> {
        let mut config = FactoryConfig::default();
        if let Some(goal) = &self.factory.goal {
            config.set_goal(goal.as_str())?;
        }
        if let Some(backstory) = &self.factory.backstory {
            config.set_backstory(backstory.as_str())?;
        }
        Ok(config)
    }

    pub fn stop_timeout(&self) -> Result<Duration, ConfigError> {
        let secs = self.stop_timeout_secs;
        Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
            key: "stop_timeout_secs",
            value: secs.to_string(),
        })
    }
}
