//! Persisted user preferences.
//!
//! The settings blob is a flat JSON object. Every field is read on its own so
//! that one bad value only costs that value: anything missing or ill-typed
//! falls back to its default while the rest of the file is kept. Durations
//! outside their accepted range are clamped to the nearest bound.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Error;

pub const MIN_IMAGE_DURATION_SECS: u32 = 10;
pub const MAX_IMAGE_DURATION_SECS: u32 = 3600;
pub const MIN_SESSION_DURATION_SECS: u32 = 60;
pub const MAX_SESSION_DURATION_SECS: u32 = 8 * 60 * 60;

/// Folder path mapped to whether it feeds the catalog.
pub type FolderConfig = BTreeMap<PathBuf, bool>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preferences {
    pub folders: FolderConfig,
    /// Seconds each image stays on screen.
    pub image_duration: u32,
    /// Total session length in seconds.
    pub session_duration: u32,
    pub shuffle: bool,
    pub halfway_sound: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            folders: FolderConfig::new(),
            image_duration: default_image_duration(),
            session_duration: default_session_duration(),
            shuffle: true,
            halfway_sound: true,
        }
    }
}

fn default_image_duration() -> u32 {
    60
}

fn default_session_duration() -> u32 {
    30 * 60
}

impl Preferences {
    /// Parse a settings blob, tolerating partial corruption.
    ///
    /// # Errors
    /// Fails only when `text` is not a JSON object at all.
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(Error::SettingsNotObject);
        }
        let raw: RawPreferences = serde_json::from_value(value)?;
        Ok(raw.into_preferences())
    }

    /// Folders that are enabled, in path order.
    #[must_use]
    pub fn enabled_folders(&self) -> Vec<PathBuf> {
        self.folders
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Session length in whole minutes, as edited in the settings dialog.
    #[must_use]
    pub fn session_minutes(&self) -> u32 {
        self.session_duration / 60
    }

    pub fn set_session_minutes(&mut self, minutes: u32) {
        self.session_duration = minutes.saturating_mul(60);
    }

    /// Clamp both durations into their accepted ranges.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.image_duration = self
            .image_duration
            .clamp(MIN_IMAGE_DURATION_SECS, MAX_IMAGE_DURATION_SECS);
        self.session_duration = self
            .session_duration
            .clamp(MIN_SESSION_DURATION_SECS, MAX_SESSION_DURATION_SECS);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPreferences {
    #[serde(default, deserialize_with = "lenient_folders")]
    folders: Option<FolderConfig>,
    #[serde(default, deserialize_with = "lenient")]
    image_duration: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    session_duration: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    shuffle: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    halfway_sound: Option<bool>,
}

impl RawPreferences {
    fn into_preferences(self) -> Preferences {
        let defaults = Preferences::default();
        Preferences {
            folders: self.folders.unwrap_or(defaults.folders),
            image_duration: self
                .image_duration
                .map(|secs| secs.clamp(MIN_IMAGE_DURATION_SECS, MAX_IMAGE_DURATION_SECS))
                .unwrap_or(defaults.image_duration),
            session_duration: self
                .session_duration
                .map(|secs| secs.clamp(MIN_SESSION_DURATION_SECS, MAX_SESSION_DURATION_SECS))
                .unwrap_or(defaults.session_duration),
            shuffle: self.shuffle.unwrap_or(defaults.shuffle),
            halfway_sound: self.halfway_sound.unwrap_or(defaults.halfway_sound),
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match serde_json::from_value(value) {
        Ok(v) => Ok(Some(v)),
        Err(err) => {
            debug!("ignoring malformed settings value: {err}");
            Ok(None)
        }
    }
}

/// Accepts `{path: bool}` and, for files written before folders could be
/// disabled, a plain list of paths (all enabled). Non-boolean flags are dropped.
fn lenient_folders<'de, D>(deserializer: D) -> Result<Option<FolderConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let folders = match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(path, enabled)| enabled.as_bool().map(|e| (PathBuf::from(path), e)))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(|p| (PathBuf::from(p), true)))
            .collect(),
        other => {
            debug!(value = %other, "ignoring malformed folders value");
            return Ok(None);
        }
    };
    Ok(Some(folders))
}

/// Loads and saves [`Preferences`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/figure-timer/settings.json`, if the platform has one.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("figure-timer").join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences, falling back to defaults on any failure.
    pub fn load(&self) -> Preferences {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no settings file; using defaults");
                return Preferences::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), "failed to read settings; using defaults: {err}");
                return Preferences::default();
            }
        };
        match Preferences::from_json_str(&text) {
            Ok(prefs) => {
                debug!(path = %self.path.display(), ?prefs, "settings loaded");
                prefs
            }
            Err(err) => {
                warn!(path = %self.path.display(), "corrupt settings; using defaults: {err}");
                Preferences::default()
            }
        }
    }

    /// Persist `prefs` by writing a temp sibling and renaming it over the
    /// settings file.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written or renamed.
    pub fn save(&self, prefs: &Preferences) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut body = serde_json::to_vec_pretty(prefs)?;
        body.push(b'\n');

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let prefs = Preferences::from_json_str("{}").unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.image_duration, 60);
        assert_eq!(prefs.session_duration, 1800);
        assert!(prefs.shuffle);
        assert!(prefs.halfway_sound);
        assert!(prefs.folders.is_empty());
    }

    #[test]
    fn ill_typed_fields_fall_back_individually() {
        let prefs = Preferences::from_json_str(
            r#"{"image_duration": "soon", "session_duration": 600, "shuffle": 3, "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(prefs.image_duration, 60);
        assert_eq!(prefs.session_duration, 600);
        assert!(prefs.shuffle);
    }

    #[test]
    fn out_of_range_durations_are_clamped_on_load() {
        let prefs =
            Preferences::from_json_str(r#"{"image_duration": 5, "session_duration": 999999}"#)
                .unwrap();
        assert_eq!(prefs.image_duration, MIN_IMAGE_DURATION_SECS);
        assert_eq!(prefs.session_duration, MAX_SESSION_DURATION_SECS);

        let prefs =
            Preferences::from_json_str(r#"{"image_duration": 7200, "session_duration": 30}"#)
                .unwrap();
        assert_eq!(prefs.image_duration, MAX_IMAGE_DURATION_SECS);
        assert_eq!(prefs.session_duration, MIN_SESSION_DURATION_SECS);
    }

    #[test]
    fn folders_accept_map_and_legacy_list() {
        let prefs =
            Preferences::from_json_str(r#"{"folders": {"/a": true, "/b": false, "/c": "yes"}}"#)
                .unwrap();
        assert_eq!(prefs.folders.len(), 2);
        assert_eq!(prefs.enabled_folders(), vec![PathBuf::from("/a")]);

        let prefs = Preferences::from_json_str(r#"{"folders": ["/x", "/y"]}"#).unwrap();
        assert_eq!(
            prefs.enabled_folders(),
            vec![PathBuf::from("/x"), PathBuf::from("/y")]
        );
    }

    #[test]
    fn non_object_is_an_error() {
        assert!(Preferences::from_json_str("not json").is_err());
        assert!(Preferences::from_json_str("[1, 2]").is_err());
    }

    #[test]
    fn clamped_pulls_durations_into_range() {
        let prefs = Preferences {
            image_duration: 1,
            session_duration: u32::MAX,
            ..Preferences::default()
        }
        .clamped();
        assert_eq!(prefs.image_duration, MIN_IMAGE_DURATION_SECS);
        assert_eq!(prefs.session_duration, MAX_SESSION_DURATION_SECS);
    }

    #[test]
    fn session_minutes_round_trip() {
        let mut prefs = Preferences::default();
        prefs.set_session_minutes(45);
        assert_eq!(prefs.session_duration, 2700);
        assert_eq!(prefs.session_minutes(), 45);
    }
}
