use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::segmentation::SegmenterConfig;

pub const APP_DIR: &str = "daytrace";
const SETTINGS_FILE: &str = "settings.json";
const DATABASE_FILE: &str = "events.db";

pub const ENV_SERVER_URL: &str = "DAYTRACE_SERVER_URL";
pub const ENV_API_KEY: &str = "DAYTRACE_API_KEY";
pub const ENV_USER_ID: &str = "DAYTRACE_USER_ID";
pub const ENV_DEBUG: &str = "DAYTRACE_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub server_url: String,
    pub api_key: String,
    pub user_id: i64,
    pub poll_interval_secs: u64,
    pub flush_interval_secs: u64,
    pub idle_threshold_secs: f64,
    pub max_title_chars: usize,
    /// Local SQLite store; defaults to `<data_dir>/daytrace/events.db`.
    pub database_path: Option<PathBuf>,
    pub debug: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        let live = SegmenterConfig::default();
        Self {
            server_url: "http://localhost:5000".into(),
            api_key: String::new(),
            user_id: 1,
            poll_interval_secs: 5,
            flush_interval_secs: 60,
            idle_threshold_secs: live.idle_threshold_secs,
            max_title_chars: live.max_title_chars,
            database_path: None,
            debug: false,
        }
    }
}

impl AgentSettings {
    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            idle_threshold_secs: self.idle_threshold_secs,
            max_title_chars: self.max_title_chars,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| app_data_dir().join(DATABASE_FILE))
    }

    /// Applies `DAYTRACE_*` overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(id) = lookup(ENV_USER_ID) {
            match id.trim().parse() {
                Ok(id) => self.user_id = id,
                Err(_) => log::warn!("ignoring {ENV_USER_ID}={id:?}: not an integer"),
            }
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            self.debug = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Sets one field from its textual form, as used by `config set`.
    /// An empty value clears `database_path`.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "server_url" => self.server_url = value.to_string(),
            "api_key" => self.api_key = value.to_string(),
            "user_id" => self.user_id = parse_value(key, value)?,
            "poll_interval_secs" => self.poll_interval_secs = parse_positive(key, value)?,
            "flush_interval_secs" => self.flush_interval_secs = parse_positive(key, value)?,
            "idle_threshold_secs" => {
                let secs: f64 = parse_value(key, value)?;
                if !secs.is_finite() || secs <= 0.0 {
                    bail!("idle_threshold_secs must be a positive number of seconds");
                }
                self.idle_threshold_secs = secs;
            }
            "max_title_chars" => self.max_title_chars = parse_value(key, value)?,
            "database_path" => {
                self.database_path = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "debug" => self.debug = parse_value(key, value)?,
            _ => bail!("unknown setting {key:?}"),
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value {value:?} for {key}"))
}

fn parse_positive(key: &str, value: &str) -> Result<u64> {
    match parse_value(key, value)? {
        0 => bail!("{key} must be at least 1"),
        secs => Ok(secs),
    }
}

pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn default_settings_path() -> PathBuf {
    app_data_dir().join(SETTINGS_FILE)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AgentSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing file gives defaults; a broken one
    /// gives defaults and a warning.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("invalid settings in {}, using defaults: {err}", path.display());
                AgentSettings::default()
            })
        } else {
            AgentSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored settings, without environment overrides.
    pub fn stored(&self) -> AgentSettings {
        self.read().clone()
    }

    /// Stored settings with environment overrides applied.
    pub fn effective(&self) -> AgentSettings {
        let mut settings = self.stored();
        settings.apply_env();
        settings
    }

    /// Applies `change` to the stored settings and writes them back. Nothing
    /// changes in memory when `change` fails.
    pub fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut AgentSettings) -> Result<()>,
    {
        let mut guard = self.write();
        let mut next = guard.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, data: &AgentSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, AgentSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AgentSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.stored();
        assert_eq!(settings, AgentSettings::default());
        assert_eq!(settings.poll_interval_secs, 5);
        assert_eq!(settings.idle_threshold_secs, 180.0);
    }

    #[test]
    fn broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.stored(), AgentSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"user_id": 42, "flush_interval_secs": 10}"#).unwrap();
        let settings = SettingsStore::new(path).unwrap().stored();
        assert_eq!(settings.user_id, 42);
        assert_eq!(settings.flush_interval_secs, 10);
        assert_eq!(settings.max_title_chars, 120);
    }

    #[test]
    fn update_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(|s| {
                s.set_field("server_url", "https://tracker.example.com")?;
                s.set_field("user_id", "5")
            })
            .unwrap();
        assert_eq!(store.stored().user_id, 5);

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.stored().user_id, 5);
        assert_eq!(reopened.stored().server_url, "https://tracker.example.com");
    }

    #[test]
    fn failed_update_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let result = store.update(|s| {
            s.set_field("user_id", "9")?;
            s.set_field("poll_interval_secs", "0")
        });
        assert!(result.is_err());
        assert_eq!(store.stored().user_id, 1);
        assert!(!path.exists());
    }

    #[test]
    fn set_field_parses_and_validates() {
        let mut settings = AgentSettings::default();
        settings.set_field("idle_threshold_secs", "90.5").unwrap();
        settings.set_field("debug", "true").unwrap();
        settings.set_field("database_path", "/tmp/day.db").unwrap();
        assert_eq!(settings.idle_threshold_secs, 90.5);
        assert!(settings.debug);
        assert_eq!(settings.database_path(), PathBuf::from("/tmp/day.db"));

        settings.set_field("database_path", "").unwrap();
        assert_eq!(settings.database_path, None);

        assert!(settings.set_field("user_id", "abc").is_err());
        assert!(settings.set_field("idle_threshold_secs", "-1").is_err());
        assert!(settings.set_field("colour", "blue").is_err());
    }

    #[test]
    fn overrides_replace_stored_values() {
        let env: HashMap<&str, &str> = [
            (ENV_SERVER_URL, "http://10.0.0.2:5000"),
            (ENV_API_KEY, "secret"),
            (ENV_USER_ID, "12"),
            (ENV_DEBUG, "TRUE"),
        ]
        .into_iter()
        .collect();

        let mut settings = AgentSettings::default();
        settings.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.server_url, "http://10.0.0.2:5000");
        assert_eq!(settings.api_key, "secret");
        assert_eq!(settings.user_id, 12);
        assert!(settings.debug);
    }

    #[test]
    fn bad_user_id_override_is_ignored() {
        let mut settings = AgentSettings::default();
        settings.apply_overrides(|name| (name == ENV_USER_ID).then(|| "abc".to_string()));
        assert_eq!(settings.user_id, 1);
    }
}
