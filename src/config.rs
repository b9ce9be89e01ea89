//! Simulation parameters, loadable from a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Position;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Grid size, map generation, and clock settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub cols: i32,
    pub rows: i32,
    /// Random obstacle draws; repeats land on the same cell.
    pub obstacle_attempts: usize,
    /// Where the agent starts. Kept clear of obstacles.
    pub start: Position,
    /// External clock rate used by the watch driver.
    pub tick_hz: u32,
    /// Seed for obstacle and task placement.
    pub seed: u64,
    /// Tasks the demo driver creates.
    pub demo_tasks: usize,
    /// Safety cap on ticks for the headless drivers.
    pub max_ticks: u64,
    /// Fixed map rows (`#` = obstacle). Overrides random generation.
    pub layout: Option<Vec<String>>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cols: 15,
            rows: 15,
            obstacle_attempts: 60,
            start: Position::new(0, 0),
            tick_hz: 10,
            seed: 42,
            demo_tasks: 5,
            max_ticks: 10_000,
            layout: None,
        }
    }
}

impl SimConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(layout) = &self.layout {
            let width = layout.first().map(|row| row.chars().count()).unwrap_or(0);
            if layout.iter().any(|row| row.chars().count() != width) {
                return Err(ConfigError::Invalid("layout rows differ in width".into()));
            }
            if width as i32 != self.cols || layout.len() as i32 != self.rows {
                return Err(ConfigError::Invalid(format!(
                    "layout is {width}x{} but cols/rows are {}x{}",
                    layout.len(),
                    self.cols,
                    self.rows
                )));
            }
        }
        if self.cols <= 0 || self.rows <= 0 {
            return Err(ConfigError::Invalid("cols and rows must be > 0".into()));
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::Invalid("tick_hz must be > 0".into()));
        }
        let Position { x, y } = self.start;
        if x < 0 || x >= self.cols || y < 0 || y >= self.rows {
            return Err(ConfigError::Invalid(format!(
                "start {} is outside the {}x{} grid",
                self.start, self.cols, self.rows
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = SimConfig::default();
        assert_eq!((config.cols, config.rows), (15, 15));
        assert_eq!(config.obstacle_attempts, 60);
        assert_eq!(config.tick_hz, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = SimConfig::from_toml("seed = 7\ncols = 8\nrows = 6\n").expect("valid toml");
        assert_eq!(config.seed, 7);
        assert_eq!((config.cols, config.rows), (8, 6));
        assert_eq!(config.tick_hz, 10);
    }

    #[test]
    fn start_and_layout_are_parsed() {
        let text = r#"
cols = 3
rows = 2
start = { x = 2, y = 1 }
layout = ["..#", "..."]
"#;
        let config = SimConfig::from_toml(text).expect("valid toml");
        assert_eq!(config.start, Position::new(2, 1));
        assert_eq!(config.layout.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(matches!(
            SimConfig::from_toml("tick_hz = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SimConfig::from_toml("cols = 2\nrows = 2\nstart = { x = 5, y = 0 }"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SimConfig::from_toml("cols = 2\nrows = 2\nlayout = [\"..\", \"...\"]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SimConfig::from_toml("cols = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
