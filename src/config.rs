// Persisted settings: the roster file used last time plus the validation
// parameters. Lives in a small JSON file in the user's home directory.

use crate::error::{Result, RosterError};
use crate::validation::ValidationRules;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".student_roster.json";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_file_path: Option<PathBuf>,
    #[serde(flatten)]
    pub rules: ValidationRules,
}

/// A `Config` together with the file it was read from and is written to.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// `~/.student_roster.json`, or the current directory when there is no
    /// home directory.
    pub fn default_path() -> PathBuf {
        let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.join(CONFIG_FILE_NAME)
    }

    /// Reads the config at `path`. A missing or unreadable file gives the
    /// defaults; the caller then asks the user for a roster path.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("ignoring malformed config {}: {}", path.display(), e);
                Config::default()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Config::default()
            }
            Err(e) => {
                warn!("cannot read config {}: {}", path.display(), e);
                Config::default()
            }
        };
        ConfigStore { path, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn save(&self) -> Result<()> {
        self.write(&self.config)
    }

    fn write(&self, config: &Config) -> Result<()> {
        let text = serde_json::to_string_pretty(config)
            .map_err(|e| RosterError::Config(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                RosterError::Config(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        fs::write(&self.path, text).map_err(|e| {
            RosterError::Config(format!("cannot write {}: {}", self.path.display(), e))
        })?;
        debug!("wrote config to {}", self.path.display());
        Ok(())
    }

    /// Records `file` as the roster to open next time and saves right away.
    /// On failure the in-memory config keeps its previous value.
    pub fn set_last_file_path(&mut self, file: &Path) -> Result<()> {
        if self.config.last_file_path.as_deref() == Some(file) {
            return Ok(());
        }
        let next = Config {
            last_file_path: Some(file.to_path_buf()),
            ..self.config.clone()
        };
        self.write(&next)?;
        self.config = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join("config.json"));
        assert_eq!(store.config(), &Config::default());
        assert!(store.config().last_file_path.is_none());
    }

    #[test]
    fn only_last_file_path_is_required() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"last_file_path": "students.csv"}"#).unwrap();
        let store = ConfigStore::load(&path);
        assert_eq!(
            store.config().last_file_path,
            Some(PathBuf::from("students.csv"))
        );
        assert_eq!(store.config().rules, ValidationRules::default());
    }

    #[test]
    fn validation_keys_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"phone_length": 11, "email_domains": ["example.com"]}"#,
        )
        .unwrap();
        let rules = ConfigStore::load(&path).config().rules.clone();
        assert_eq!(rules.phone_length, 11);
        assert_eq!(rules.email_domains, vec!["example.com".to_string()]);
        assert_eq!(rules.email_max_length, 254);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(ConfigStore::load(&path).config(), &Config::default());
    }

    #[test]
    fn last_file_path_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.json");
        let mut store = ConfigStore::load(&path);
        store.set_last_file_path(Path::new("class_a.csv")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["last_file_path"], "class_a.csv");

        let reloaded = ConfigStore::load(&path);
        assert_eq!(reloaded.config(), store.config());
    }

    #[test]
    fn failed_write_keeps_previous_last_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let mut store = ConfigStore::load(blocker.join("config.json"));

        let file = Path::new("class_a.csv");
        assert!(matches!(
            store.set_last_file_path(file),
            Err(RosterError::Config(_))
        ));
        assert!(store.config().last_file_path.is_none());
        // not short-circuited as unchanged on the retry
        assert!(store.set_last_file_path(file).is_err());
    }
}
