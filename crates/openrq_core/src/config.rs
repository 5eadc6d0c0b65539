//! Engine configuration.
//!
//! # Responsibility
//! - Hold the tunables of the engine and the logger with working defaults.
//! - Load them from JSON and reject values the engine cannot use.
//!
//! # Invariants
//! - Every field has a default, so a partial (or empty) JSON object is valid.
//! - A config returned by `from_json_str`/`load` has passed `validate`.

use crate::logging::normalize_level;
use crate::model::item::{Point, Size};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const MAX_GRID_SHIFT: u32 = 16;
/// One character plus the ellipsis.
const MIN_LABEL_CHARS: usize = 4;

/// Errors from loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// Config text is not valid JSON for this shape.
    Parse(serde_json::Error),
    /// Config parsed but holds an unusable value.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Drop snapping grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Grid cell is `1 << shift` units.
    pub shift: u32,
    /// Subtracted after snapping so a new item is centred on the drop point.
    pub offset: Point,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            shift: 5,
            offset: Point::new(64, 32),
        }
    }
}

/// Logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Absolute log directory. `None` uses `<tmp>/openrq-logs`.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

impl LogConfig {
    /// Configured directory, or the default under the system temp dir.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("openrq-logs"))
    }
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size given to items created by a drop.
    pub item_size: Size,
    pub grid: GridConfig,
    /// Maximum label length before truncation, ellipsis included.
    pub label_max_chars: usize,
    /// Refuse links that would close a parent cycle.
    pub reject_cycles: bool,
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            item_size: Size::new(128, 64),
            grid: GridConfig::default(),
            label_max_chars: 46,
            reject_cycles: false,
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.item_size.width <= 0 || self.item_size.height <= 0 {
            return Err(ConfigError::Invalid(format!(
                "item_size must be positive, got {}x{}",
                self.item_size.width, self.item_size.height
            )));
        }
        if self.grid.shift > MAX_GRID_SHIFT {
            return Err(ConfigError::Invalid(format!(
                "grid.shift must be at most {MAX_GRID_SHIFT}, got {}",
                self.grid.shift
            )));
        }
        if self.label_max_chars < MIN_LABEL_CHARS {
            return Err(ConfigError::Invalid(format!(
                "label_max_chars must be at least {MIN_LABEL_CHARS}, got {}",
                self.label_max_chars
            )));
        }
        normalize_level(&self.log.level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.log.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use crate::model::item::{Point, Size};

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.item_size, Size::new(128, 64));
        assert_eq!(config.grid.shift, 5);
        assert_eq!(config.grid.offset, Point::new(64, 32));
        assert_eq!(config.label_max_chars, 46);
        assert!(!config.reject_cycles);
    }

    #[test]
    fn partial_object_overrides_only_named_fields() {
        let config = EngineConfig::from_json_str(
            r#"{ "reject_cycles": true, "grid": { "shift": 4 }, "log": { "level": "warn" } }"#,
        )
        .unwrap();
        assert!(config.reject_cycles);
        assert_eq!(config.grid.shift, 4);
        assert_eq!(config.grid.offset, Point::new(64, 32));
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn rejects_unusable_values() {
        for text in [
            r#"{ "item_size": { "width": 0, "height": 64 } }"#,
            r#"{ "grid": { "shift": 40 } }"#,
            r#"{ "label_max_chars": 2 }"#,
            r#"{ "log": { "level": "loud" } }"#,
            r#"{ "log": { "dir": "relative/logs" } }"#,
        ] {
            assert!(
                matches!(EngineConfig::from_json_str(text), Err(ConfigError::Invalid(_))),
                "accepted {text}"
            );
        }
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ reject_cycles: yes"),
            Err(ConfigError::Parse(_))
        ));
    }
}
