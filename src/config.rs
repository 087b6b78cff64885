use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::allocation::{BatchConfig, CreditCostRule, PlannerConfig};
use crate::reach::ReachModelConfig;
use crate::scoring::{AdjacencyMatrix, RankingConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8790,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ServerConfig {
    pub fn assignments_path(&self) -> PathBuf {
        self.data_dir.join("assignments.json")
    }

    pub fn proposals_path(&self) -> PathBuf {
        self.data_dir.join("proposals.json")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub log_level: String,
    pub reach: ReachModelConfig,
    pub ranking: RankingConfig,
    pub planner: PlannerConfig,
    pub batch: BatchConfig,
    pub costing: CreditCostRule,
    pub adjacency: Option<AdjacencyMatrix>,
    pub server: ServerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            reach: ReachModelConfig::default(),
            ranking: RankingConfig::default(),
            planner: PlannerConfig::default(),
            batch: BatchConfig::default(),
            costing: CreditCostRule::default(),
            adjacency: None,
            server: ServerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>), String> {
        let config_path = path.or_else(default_config_path);
        let mut config = if let Some(path) = config_path.as_ref() {
            if path.exists() {
                let contents = std::fs::read_to_string(path)
                    .map_err(|err| format!("failed to read config: {}", err))?;
                Self::from_toml(&contents)?
            } else {
                EngineConfig::default()
            }
        } else {
            EngineConfig::default()
        };

        config.apply_env_overrides();
        Ok((config, config_path))
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|err| format!("failed to parse config: {}", err))
    }

    pub fn write(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| format!("failed to create config dir: {}", err))?;
            }
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| format!("failed to serialize config: {}", err))?;
        std::fs::write(path, payload)
            .map_err(|err| format!("failed to write config: {}", err))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let reach_factor: Option<f64> =
            lookup("ALLOC_DEFAULT_REACH_FACTOR").and_then(|v| v.trim().parse().ok());
        if let Some(value) = reach_factor {
            if value.is_finite() && value > 0.0 {
                self.ranking.default_reach_factor = value;
            }
        }
        let max_supporters: Option<usize> =
            lookup("ALLOC_MAX_SUPPORTERS").and_then(|v| v.trim().parse().ok());
        if let Some(value) = max_supporters {
            self.planner.max_supporters = value;
        }
        let network_cap: Option<u64> =
            lookup("ALLOC_NETWORK_CAP").and_then(|v| v.trim().parse().ok());
        if let Some(value) = network_cap {
            self.reach.network_cap = Some(value);
        }
        if let Some(value) = lookup("ALLOC_ROUND_TO").and_then(|v| v.trim().parse::<i64>().ok()) {
            self.reach.round_to = value;
        }
        if let Some(rule) = lookup("ALLOC_COSTING").and_then(|v| CreditCostRule::from_str(&v)) {
            self.costing = rule;
        }
        if let Some(dir) = lookup("ALLOC_DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("ALLOC_LOG_LEVEL") {
            self.log_level = level;
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("ENGINE_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/engine.toml")))
}
