#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persisted road report settings and the archive of dismissed reports.
//!
//! [`Settings`] is loaded once at startup, mutated by user actions, and
//! written back through a [`store::KeyValueStore`] after every mutating
//! action and on shutdown. The serialized form keeps the field names of
//! the long-standing settings record so existing data keeps loading:
//!
//! ```json
//! {
//!   "lastVersion": "0.3",
//!   "layerVisible": true,
//!   "state": "VA",
//!   "hideArchivedReports": true,
//!   "archivedReports": { "5": { "updateNumber": "5" } }
//! }
//! ```

pub mod paths;
pub mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::store::KeyValueStore;

/// Key under which the settings record is stored.
pub const DEFAULT_SETTINGS_KEY: &str = "va_dot_report_settings";

/// Errors that can occur while loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// I/O error on the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record is not valid JSON for [`Settings`].
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A store lock was poisoned by a panicking writer.
    #[error("Settings store lock poisoned")]
    Poisoned,
}

/// Marker persisted for each archived report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Version marker recorded when the report was archived. Reserved for
    /// staleness checks against newer report updates.
    #[serde(
        rename = "updateNumber",
        deserialize_with = "road_reports_report_models::serde_id::deserialize"
    )]
    pub archived_at_version: String,
}

/// Process-wide preferences plus the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Application version that last saved these settings.
    #[serde(default)]
    pub last_version: Option<String>,
    /// Whether the report layer is shown on the map.
    #[serde(default = "default_true", deserialize_with = "true_unless_false")]
    pub layer_visible: bool,
    /// Region label (e.g. a state abbreviation) shown in prompts.
    #[serde(default)]
    pub state: Option<String>,
    /// Whether archived reports are hidden from the map and table.
    #[serde(
        rename = "hideArchivedReports",
        default = "default_true",
        deserialize_with = "true_unless_false"
    )]
    pub hide_archived: bool,
    /// Archived report ids and their markers.
    #[serde(
        rename = "archivedReports",
        default,
        deserialize_with = "lenient_archive"
    )]
    pub archive: BTreeMap<String, ArchiveEntry>,
}

const fn default_true() -> bool {
    true
}

fn true_unless_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// Reads the archive map entry by entry. Membership is what matters, so an
/// entry with a missing or malformed marker keeps its id and falls back to
/// the id as the marker. A non-object archive loads as empty.
fn lenient_archive<'de, D>(deserializer: D) -> Result<BTreeMap<String, ArchiveEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => return Ok(BTreeMap::new()),
        Some(serde_json::Value::Object(entries)) => entries,
        Some(other) => {
            log::warn!("Ignoring archivedReports that is not an object: {other}");
            return Ok(BTreeMap::new());
        }
    };

    Ok(entries
        .into_iter()
        .map(|(id, value)| {
            let entry = ArchiveEntry::deserialize(&value).unwrap_or_else(|e| {
                log::warn!("Malformed archive entry '{id}' ({e}), using the id as marker");
                ArchiveEntry {
                    archived_at_version: id.clone(),
                }
            });
            (id, entry)
        })
        .collect())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_version: None,
            layer_visible: true,
            state: None,
            hide_archived: true,
            archive: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Loads the record stored under `key`.
    ///
    /// Returns `Ok(None)` when no record exists yet. Missing fields in an
    /// existing record take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the store cannot be read or the record
    /// is not valid JSON.
    pub fn load(store: &dyn KeyValueStore, key: &str) -> Result<Option<Self>, SettingsError> {
        let Some(raw) = store.get(key)? else {
            log::debug!("No stored settings under '{key}'");
            return Ok(None);
        };
        let settings: Self = serde_json::from_str(&raw)?;
        log::debug!(
            "Loaded settings under '{key}' ({} archived reports)",
            settings.archive.len()
        );
        Ok(Some(settings))
    }

    /// Serializes the settings and writes them under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if serialization or the store write fails.
    pub fn save(&self, store: &dyn KeyValueStore, key: &str) -> Result<(), SettingsError> {
        let json = serde_json::to_string(self)?;
        store.set(key, &json)?;
        log::debug!("Settings saved");
        Ok(())
    }

    /// Returns `true` if `id` is in the archive.
    #[must_use]
    pub fn is_archived(&self, id: &str) -> bool {
        self.archive.contains_key(id)
    }

    /// Adds `id` to the archive, recording `version` as its marker.
    pub fn archive(&mut self, id: &str, version: &str) {
        self.archive.insert(
            id.to_string(),
            ArchiveEntry {
                archived_at_version: version.to_string(),
            },
        );
    }

    /// Removes `id` from the archive. Returns `true` if it was present.
    pub fn unarchive(&mut self, id: &str) -> bool {
        self.archive.remove(id).is_some()
    }

    /// Returns `true` if these settings were last saved by a different
    /// application version than `current`.
    #[must_use]
    pub fn is_new_version(&self, current: &str) -> bool {
        self.last_version.as_deref() != Some(current)
    }
}
