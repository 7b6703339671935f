//! Configuration loading and typed config structures for the Waymark
//! simulation.
//!
//! The canonical configuration lives in `waymark-config.yaml` at the project
//! root. Every section and field has a default, so an empty file (or no
//! file at all) yields a runnable setup.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use waymark_transport::{TransportConfig, Tribe};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of its allowed range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration, mirroring `waymark-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings.
    #[serde(default)]
    pub world: WorldConfig,

    /// Transport network tunables.
    #[serde(default)]
    pub transport: TransportSection,

    /// Ware and worker tables.
    #[serde(default)]
    pub tribe: Tribe,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Run boundaries.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Which network to start with.
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file.
    ///
    /// The `WAYMARK_LOG` environment variable overrides `logging.level`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.logging.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.world.game_ms_per_tick == 0 {
            return Err(ConfigError::Invalid {
                field: "world.game_ms_per_tick",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.tribe.wares.is_empty() {
            return Err(ConfigError::Invalid {
                field: "tribe.wares",
                reason: "at least one ware type is required".to_owned(),
            });
        }
        for worker in &self.tribe.workers {
            if let Some(name) = worker
                .buildcost
                .keys()
                .find(|name| self.tribe.ware_index(name).is_none())
            {
                return Err(ConfigError::Invalid {
                    field: "tribe.workers",
                    reason: format!("{} costs unknown ware {name}", worker.name),
                });
            }
        }
        if self.scenario.grid_rows == 0 || self.scenario.grid_cols == 0 {
            return Err(ConfigError::Invalid {
                field: "scenario.grid_rows",
                reason: "grid dimensions must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for generated scenarios.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real-time milliseconds between ticks (0 runs as fast as possible).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Game milliseconds that pass per tick.
    #[serde(default = "default_game_ms_per_tick")]
    pub game_ms_per_tick: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            game_ms_per_tick: default_game_ms_per_tick(),
        }
    }
}

/// The `transport` section: network tunables plus carrier speed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportSection {
    /// Passed through to every [`Transport`](waymark_transport::Transport).
    #[serde(flatten)]
    pub network: TransportConfig,

    /// Game milliseconds a carrier needs per step of route cost.
    #[serde(default = "default_carrier_ms_per_step")]
    pub carrier_ms_per_step: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            network: TransportConfig::default(),
            carrier_ms_per_step: default_carrier_ms_per_step(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log a stock summary every this many ticks (0 disables it).
    #[serde(default = "default_summary_interval_ticks")]
    pub summary_interval_ticks: u64,
}

impl LoggingConfig {
    /// Apply the `WAYMARK_LOG` override.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("WAYMARK_LOG") {
            self.level = level;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            summary_interval_ticks: default_summary_interval_ticks(),
        }
    }
}

/// Run boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many ticks (0 runs until stopped).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Verify the economy partition after every tick.
    #[serde(default = "default_true")]
    pub check_invariants: bool,

    /// Where to write a JSON snapshot of the network when the run ends.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            check_invariants: default_true(),
            snapshot_path: None,
        }
    }
}

/// Starting network: a scenario file, or a generated grid when no path
/// is given.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioConfig {
    /// Path of a scenario YAML file.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Rows of the generated grid.
    #[serde(default = "default_grid_size")]
    pub grid_rows: u32,

    /// Columns of the generated grid.
    #[serde(default = "default_grid_size")]
    pub grid_cols: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            path: None,
            grid_rows: default_grid_size(),
            grid_cols: default_grid_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Waymark".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_game_ms_per_tick() -> u64 {
    250
}

const fn default_carrier_ms_per_step() -> u64 {
    1800
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_summary_interval_ticks() -> u64 {
    40
}

const fn default_max_ticks() -> u64 {
    400
}

const fn default_true() -> bool {
    true
}

const fn default_grid_size() -> u32 {
    4
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.game_ms_per_tick, 250);
        assert_eq!(config.transport.network.balance_delay_ms, 200);
        assert_eq!(config.transport.carrier_ms_per_step, 1800);
        assert_eq!(config.tribe.ware_index("log"), Some(waymark_types::WareIndex(0)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  name: "River Valley"
  seed: 7
  tick_interval_ms: 0
  game_ms_per_tick: 100

transport:
  balance_delay_ms: 400
  cost_cutoff: 60
  carrier_ms_per_step: 500

tribe:
  name: "islanders"
  wares:
    - name: log
      default_target_quantity: 8
      preciousness: 3
    - name: stone
  workers:
    - name: carrier
    - name: builder

logging:
  level: "debug"
  summary_interval_ticks: 5

simulation:
  max_ticks: 12
  check_invariants: false
  snapshot_path: "out/final.json"

scenario:
  path: "scenarios/two_villages.yaml"
"#;
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.name, "River Valley");
        assert_eq!(config.world.game_ms_per_tick, 100);
        assert_eq!(config.transport.network.balance_delay_ms, 400);
        assert_eq!(config.transport.network.cost_cutoff, Some(60));
        assert_eq!(config.transport.carrier_ms_per_step, 500);
        assert_eq!(config.tribe.wares.len(), 2);
        assert_eq!(config.tribe.wares[1].default_target_quantity, 1);
        assert_eq!(config.simulation.max_ticks, 12);
        assert!(!config.simulation.check_invariants);
        assert_eq!(
            config.simulation.snapshot_path.as_deref(),
            Some(Path::new("out/final.json"))
        );
        assert_eq!(
            config.scenario.path.as_deref(),
            Some(Path::new("scenarios/two_villages.yaml"))
        );
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("world:\n  seed: 9\n").unwrap();
        assert_eq!(config.world.seed, 9);
        assert_eq!(config.simulation.max_ticks, 400);
        assert_eq!(config.tribe, Tribe::default());
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SimulationConfig::parse("").is_ok());
    }

    #[test]
    fn zero_game_time_per_tick_is_rejected() {
        let result = SimulationConfig::parse("world:\n  game_ms_per_tick: 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "world.game_ms_per_tick",
                ..
            })
        ));
    }

    #[test]
    fn unknown_buildcost_ware_is_rejected() {
        let mut config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        if let Some(miner) = config.tribe.workers.iter_mut().find(|w| w.name == "miner") {
            miner.buildcost.insert("mithril".to_owned(), 1);
        }
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "tribe.workers",
                ..
            })
        ));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("waymark-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "failed to load project config: {config:?}");
        }
    }
}
