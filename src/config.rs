//! Persistent settings, stored as a JSON file.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\jukebox\settings.json
//! - macOS: ~/Library/Application Support/jukebox/settings.json
//! - Linux: ~/.config/jukebox/settings.json
//!
//! The file is loaded once at process startup and written through on any
//! mutation, via a single guarded accessor rather than a global mutable
//! pointer. Unknown keys are ignored by `#[serde(default)]` field-by-field
//! deserialization rather than rejected, so an operator can add keys a
//! future version understands without breaking the current one.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide persistent settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Poll interval for the playback loops and flood-control clear checks.
    pub async_sleep_refresh_rate_secs: f64,
    /// Absolute volume ceiling the players accept (player-unit, not percent).
    pub max_absolute_volume: u32,
    /// Absolute volume that corresponds to "100%" logical volume.
    pub hundred_percent_volume_value: u32,
    /// Weeknight quiet-hours start, as an hour-of-day in `[0, 24)`.
    pub normal_quiet_hours_start_time: f64,
    /// Weekend quiet-hours start, as an hour-of-day in `[0, 24)`.
    pub weekend_quiet_hours_start_time: f64,
    /// Quiet-hours end, as an hour-of-day in `[0, 24)`.
    pub quiet_hours_end_time: f64,
    /// Extra buffer added on top of a `RetryAfter` delay before retrying.
    pub flood_control_buffer_time_secs: f64,
    /// Retry attempts for flood-controlled outbound calls.
    pub max_flood_control_retries: u32,
    /// Buffer before retrying after a timeout.
    pub time_out_buffer_time_secs: f64,
    /// Retry attempts for timed-out outbound calls.
    pub max_time_out_retries: u32,
    /// The chat the worker/supervisor are bound to.
    pub registered_primary_chat_id: Option<i64>,
    /// The bot owner's user id.
    pub owner_id: Option<i64>,
    /// User ids who should be pinged by `/complain`-style commands.
    pub comptroller_ids: Vec<i64>,
    /// Directory sound-effect files (e.g. `hampter.wav`) are read from.
    pub sfx_path: PathBuf,
    /// Path to the worker's bot token file.
    pub worker_token_file: Option<PathBuf>,
    /// Path to the supervisor's bot token file.
    pub supervisor_token_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            async_sleep_refresh_rate_secs: 0.25,
            max_absolute_volume: 2,
            hundred_percent_volume_value: 100,
            normal_quiet_hours_start_time: 1.0,
            weekend_quiet_hours_start_time: 2.0,
            quiet_hours_end_time: 9.0,
            flood_control_buffer_time_secs: 1.0,
            max_flood_control_retries: 4,
            time_out_buffer_time_secs: 1.0,
            max_time_out_retries: 4,
            registered_primary_chat_id: None,
            owner_id: None,
            comptroller_ids: Vec::new(),
            sfx_path: PathBuf::from("sfx"),
            worker_token_file: None,
            supervisor_token_file: None,
        }
    }
}

impl Settings {
    pub fn async_sleep_refresh_rate(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.async_sleep_refresh_rate_secs.max(0.0))
    }

    pub fn flood_control_buffer_time(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.flood_control_buffer_time_secs.max(0.0))
    }

    pub fn time_out_buffer_time(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.time_out_buffer_time_secs.max(0.0))
    }
}

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("jukebox"))
}

/// Get the full path to the settings file.
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("settings.json"))
}

/// Load settings from disk.
///
/// Returns default settings if the file doesn't exist or can't be parsed;
/// this always yields a usable `Settings`, logging the reason when it falls
/// back.
pub fn load() -> Settings {
    let Some(path) = settings_path() else {
        tracing::warn!("could not determine config directory, using default settings");
        return Settings::default();
    };

    if !path.exists() {
        tracing::info!("no settings file found at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(settings) => {
                tracing::info!("loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::error!("failed to parse settings file {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            tracing::error!("failed to read settings file {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Save settings to disk, writing through atomically (write temp, rename).
pub fn save(settings: &Settings) -> crate::error::Result<()> {
    use crate::error::ResultExt;

    let dir = config_dir().ok_or_else(|| crate::error::Error::config("no config directory"))?;
    std::fs::create_dir_all(&dir).with_context(format!("creating config directory {dir:?}"))?;

    let path = dir.join("settings.json");
    let contents = serde_json::to_string_pretty(settings)?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, &contents).with_context(format!("writing {temp_path:?}"))?;
    std::fs::rename(&temp_path, &path).with_context(format!("renaming {temp_path:?} to {path:?}"))?;

    tracing::info!("saved settings to {:?}", path);
    Ok(())
}

/// A shared, guarded accessor for the settings record: a plain typed
/// record written through on mutation via a single guarded accessor,
/// never a global mutable pointer. Every process holds one
/// `SharedSettings`, not a global.
#[derive(Clone)]
pub struct SharedSettings(Arc<RwLock<Settings>>);

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    pub fn load_from_disk() -> Self {
        Self::new(load())
    }

    pub async fn get(&self) -> Settings {
        self.0.read().await.clone()
    }

    /// Apply a mutation and write the result through to disk.
    pub async fn mutate(&self, f: impl FnOnce(&mut Settings)) -> crate::error::Result<()> {
        let mut guard = self.0.write().await;
        f(&mut guard);
        save(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_serializes() {
        let settings = Settings::default();
        let json = serde_json::to_string_pretty(&settings).unwrap();
        assert!(json.contains("sfx_path"));
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut settings = Settings::default();
        settings.owner_id = Some(42);
        settings.comptroller_ids.push(7);

        let json = serde_json::to_string_pretty(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.owner_id, Some(42));
        assert_eq!(parsed.comptroller_ids, vec![7]);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let json = r#"{"owner_id": 1, "totally_unknown_key": "whatever"}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.owner_id, Some(1));
        assert_eq!(settings.max_absolute_volume, Settings::default().max_absolute_volume);
    }

    #[tokio::test]
    async fn test_shared_settings_get_reflects_construction() {
        let shared = SharedSettings::new(Settings {
            owner_id: Some(99),
            ..Settings::default()
        });
        assert_eq!(shared.get().await.owner_id, Some(99));
    }
}
