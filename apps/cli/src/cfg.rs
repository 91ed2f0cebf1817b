//! Application configuration: resource limits loadable from an optional
//! TOML file, then overridden by whichever CLI flags were actually
//! given.

use std::fs;
use std::io::ErrorKind::NotFound;
use std::path::Path;

use seqmine_core::interp::Limits;
use serde::Deserialize;
use thiserror::Error;

/// Resource limits, every field optional so a partially specified file
/// (or no file at all) falls back to [`Limits::default`] and no
/// wall-clock budget.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_cycles: Option<u64>,
    pub max_memory: Option<i64>,
    pub max_eval_secs: Option<u64>,
}

impl Config {
    /// Reads and parses `path`; a missing file yields [`Config::default`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] for any I/O failure other than the file
    /// not existing, or [`Error::Parse`] if it exists but isn't valid
    /// TOML matching this shape.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let body = match fs::read_to_string(path) {
            Ok(body) => body,
            Err(err) if err.kind() == NotFound => return Ok(Self::default()),
            Err(err) => return Err(Error::Read(err)),
        };
        toml::from_str(&body).map_err(Error::Parse)
    }

    /// Overlays `other`'s present fields onto `self`, `other` winning on
    /// every field it sets. Used to apply CLI-flag overrides on top of
    /// a loaded file: `file_config.merge(flags_as_config)`.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            max_cycles: other.max_cycles.or(self.max_cycles),
            max_memory: other.max_memory.or(self.max_memory),
            max_eval_secs: other.max_eval_secs.or(self.max_eval_secs),
        }
    }

    /// Projects the configured cycle/memory bounds into [`Limits`],
    /// falling back to its defaults for anything unset.
    #[must_use]
    pub fn limits(&self) -> Limits {
        let defaults = Limits::default();
        Limits {
            max_cycles: self.max_cycles.unwrap_or(defaults.max_cycles),
            max_memory: self.max_memory.or(defaults.max_memory),
        }
    }
}

/// An error loading [`Config`] from a file.
#[derive(Debug, Error)]
pub enum Error {
    #[error("reading configuration failed")]
    Read(#[source] std::io::Error),
    #[error("parsing configuration failed")]
    Parse(#[source] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/seqmine.toml")).unwrap();
        assert_eq!(config.max_cycles, None);
    }

    #[test]
    fn merge_prefers_the_override() {
        let file = Config { max_cycles: Some(10), max_memory: Some(20), ..Config::default() };
        let flags = Config { max_cycles: Some(99), ..Config::default() };
        let merged = file.merge(flags);
        assert_eq!(merged.max_cycles, Some(99));
        assert_eq!(merged.max_memory, Some(20));
    }
}
