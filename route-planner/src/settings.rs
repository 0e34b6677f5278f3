//! Map export settings, and the versioned document they're remembered in between sessions.

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

pub const SETTINGS_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct ExportSettings {
    /// Walking speed in km/h
    pub velocity: f64,
    pub map_scaling: f64,
    /// Local time as `YYYY-MM-DDTHH:MM`
    pub departure_time: String,
    pub creator_name: String,
    pub map_layers: String,
    pub auto_scale: bool,
    pub route_name: String,
    pub name_points_in_export: bool,
    pub automatic_waypoint_selection: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            velocity: 4.5,
            map_scaling: 15_000.0,
            departure_time: Utc::now().format("%Y-%m-%dT%H:%M").to_string(),
            creator_name: String::new(),
            map_layers: "ch.swisstopo.pixelkarte-farbe".to_string(),
            auto_scale: false,
            route_name: String::new(),
            name_points_in_export: true,
            automatic_waypoint_selection: true,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredSettings {
    version: u32,
    settings: ExportSettings,
}

pub fn persist_settings(settings: &ExportSettings) -> Result<String> {
    Ok(serde_json::to_string(&StoredSettings {
        version: SETTINGS_VERSION,
        settings: settings.clone(),
    })?)
}

/// Reads whatever was remembered last time. Older unversioned form dumps are migrated field by
/// field; anything unreadable yields the defaults.
pub fn restore_settings(stored: Option<&str>) -> ExportSettings {
    let Some(stored) = stored else {
        return ExportSettings::default();
    };
    let value: Value = match serde_json::from_str(stored) {
        Ok(value) => value,
        Err(err) => {
            warn!("Ignoring stored settings that aren't JSON: {err}");
            return ExportSettings::default();
        }
    };
    let Value::Object(fields) = value else {
        warn!("Ignoring stored settings that aren't an object");
        return ExportSettings::default();
    };

    match fields.get("version").and_then(Value::as_u64) {
        Some(version) if version == SETTINGS_VERSION as u64 => {
            let settings = fields.get("settings").cloned().unwrap_or(Value::Null);
            serde_json::from_value(settings).unwrap_or_else(|err| {
                warn!("Stored settings are damaged, using defaults: {err}");
                ExportSettings::default()
            })
        }
        Some(version) => {
            warn!("Stored settings have unknown version {version}, using defaults");
            ExportSettings::default()
        }
        None => {
            info!("Migrating unversioned settings");
            migrate_legacy(fields)
        }
    }
}

// Legacy dumps were raw form values: keys could be hyphenated, and fields that no longer exist or
// changed type are dropped, keeping the default.
fn migrate_legacy(fields: Map<String, Value>) -> ExportSettings {
    let defaults = ExportSettings::default();
    let Ok(Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
        return defaults;
    };
    for (key, value) in fields {
        let key = key.replace('-', "_");
        if let Some(current) = merged.get_mut(&key) {
            if same_kind(current, &value) {
                *current = value;
            }
        }
    }
    serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_versioned_document() {
        let settings = ExportSettings {
            creator_name: "Wandergruppe".to_string(),
            velocity: 3.8,
            ..Default::default()
        };
        let stored = persist_settings(&settings).unwrap();
        assert!(stored.contains("\"version\":1"));
        assert_eq!(restore_settings(Some(&stored)), settings);
    }

    #[test]
    fn legacy_form_dump_is_migrated() {
        let stored = r#"{
            "velocity": 5,
            "map-scaling": 25000,
            "departure-time": "2023-07-01T08:30",
            "creator-name": "Pfadi",
            "create-map-pdfs": true,
            "auto_scale": "yes"
        }"#;
        let settings = restore_settings(Some(stored));
        assert_eq!(settings.velocity, 5.0);
        assert_eq!(settings.map_scaling, 25_000.0);
        assert_eq!(settings.departure_time, "2023-07-01T08:30");
        assert_eq!(settings.creator_name, "Pfadi");
        // Wrong type keeps the default
        assert!(!settings.auto_scale);
        assert!(settings.name_points_in_export);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let defaults = ExportSettings::default();
        for stored in [
            None,
            Some("not json"),
            Some("[1, 2]"),
            Some(r#"{"version": 99, "settings": {}}"#),
            Some(r#"{"version": 1, "settings": {"velocity": "fast"}}"#),
        ] {
            let settings = restore_settings(stored);
            assert_eq!(settings.velocity, defaults.velocity, "{stored:?}");
            assert_eq!(settings.map_scaling, defaults.map_scaling, "{stored:?}");
            assert_eq!(settings.creator_name, "", "{stored:?}");
        }
    }
}
