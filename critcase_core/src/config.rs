//! Configuration file support for Critical Case.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/critcase/config.toml`.

use crate::notify::{DEFAULT_NOTIFICATION_TTL_SECS, MAX_NOTIFICATION_TTL_SECS};
use crate::probability::DEFAULT_DECEPTIVE_CHANCE;
use crate::{Difficulty, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub game: GameConfig,

    #[serde(default)]
    pub leaderboard: LeaderboardConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Game rules that may be tuned without touching the protocol logic
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_time_budget_secs")]
    pub time_budget_secs: u32,

    #[serde(default)]
    pub difficulty: Difficulty,

    /// Chance that a hard case shows misleading probabilities
    #[serde(default = "default_deceptive_chance")]
    pub deceptive_chance: f64,

    #[serde(default = "default_notification_ttl_secs")]
    pub notification_ttl_secs: i64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: default_time_budget_secs(),
            difficulty: Difficulty::default(),
            deceptive_chance: default_deceptive_chance(),
            notification_ttl_secs: default_notification_ttl_secs(),
        }
    }
}

/// Leaderboard display configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

/// External feedback generator
///
/// When `command` is empty the templated fallback is used.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default)]
    pub command: Vec<String>,

    /// Seconds to wait for the command before using the template
    #[serde(default = "default_feedback_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_feedback_timeout_secs(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(std::env::temp_dir)
    });
    base.join("critcase")
}

fn default_time_budget_secs() -> u32 {
    300
}

fn default_deceptive_chance() -> f64 {
    DEFAULT_DECEPTIVE_CHANCE
}

fn default_notification_ttl_secs() -> i64 {
    DEFAULT_NOTIFICATION_TTL_SECS
}

fn default_top_n() -> usize {
    10
}

fn default_feedback_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(std::env::temp_dir)
        });
        base.join("critcase").join("config.toml")
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.game.time_budget_secs == 0 {
            return Err(Error::Config("game.time_budget_secs must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.game.deceptive_chance) {
            return Err(Error::Config(format!(
                "game.deceptive_chance must be between 0 and 1, got {}",
                self.game.deceptive_chance
            )));
        }
        if !(0..=MAX_NOTIFICATION_TTL_SECS).contains(&self.game.notification_ttl_secs) {
            return Err(Error::Config(format!(
                "game.notification_ttl_secs must be between 0 and {}, got {}",
                MAX_NOTIFICATION_TTL_SECS, self.game.notification_ttl_secs
            )));
        }
        if self.feedback.timeout_secs == 0 {
            return Err(Error::Config("feedback.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.game.time_budget_secs, 300);
        assert_eq!(config.game.difficulty, Difficulty::Medium);
        assert_eq!(config.game.notification_ttl_secs, 2);
        assert_eq!(config.leaderboard.top_n, 10);
        assert!(config.feedback.command.is_empty());
        assert_eq!(config.feedback.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.game.difficulty = Difficulty::Hard;
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert_eq!(parsed.game.difficulty, Difficulty::Hard);
        assert_eq!(parsed.game.time_budget_secs, config.game.time_budget_secs);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[game]
difficulty = "easy"
time_budget_secs = 120
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.game.difficulty, Difficulty::Easy);
        assert_eq!(config.game.time_budget_secs, 120);
        assert_eq!(config.game.deceptive_chance, 0.3); // default
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.game.deceptive_chance = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.game.time_budget_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_huge_notification_ttl_rejected() {
        let toml_str = "[game]\nnotification_ttl_secs = 9223372036854775807\n";
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.game.notification_ttl_secs = MAX_NOTIFICATION_TTL_SECS;
        assert!(config.validate().is_ok());
        config.game.notification_ttl_secs = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_feedback_timeout_parsed_and_validated() {
        let config: Config =
            toml::from_str("[feedback]\ncommand = [\"llm\"]\ntimeout_secs = 5\n").unwrap();
        assert_eq!(config.feedback.timeout_secs, 5);
        assert!(config.validate().is_ok());

        let config: Config = toml::from_str("[feedback]\ntimeout_secs = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
