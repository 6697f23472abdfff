//! Interpreter configuration, loaded from TOML.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// Nested evaluation depth allowed before a call fails with a recursion-limit error.
pub const DEFAULT_MAX_DEPTH: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum nested (non-tail) evaluation depth
    pub max_depth: usize,

    /// Load the map/filter/reduce prelude into new sessions
    pub prelude: bool,

    /// REPL prompt
    pub prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            prelude: true,
            prompt: "> ".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => {
                let contents = fs::read_to_string(path)?;
                Config::from_toml(&contents)
            }
            None => Ok(Config::default()),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Config> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LispError;
    use std::io::Write;

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = Config::from_toml("max_depth = 50").unwrap();
        assert_eq!(config.max_depth, 50);
        assert!(config.prelude);
        assert_eq!(config.prompt, "> ");
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(matches!(
            Config::from_toml("max_depht = 5"),
            Err(LispError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prelude = false\nprompt = \"lisp> \"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert!(!config.prelude);
        assert_eq!(config.prompt, "lisp> ");
    }

    #[test]
    fn test_load_without_path() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load(Some(Path::new("/definitely/not/here.toml"))),
            Err(LispError::Io(_))
        ));
    }
}
