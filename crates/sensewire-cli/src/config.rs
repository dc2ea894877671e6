//! Schema configuration loading

use anyhow::{Context, Result};
use sensewire_core::gesture::{self, STROKE_POINT_COUNT};
use sensewire_core::{AccessMode, FieldType, SensorSchema, DEFAULT_MAX_RECORDS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Top-level schema file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// History depth per field
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Point count used by the `StrokePoints` type tag
    #[serde(default = "default_stroke_point_count")]
    pub stroke_point_count: usize,
    /// GATT service exposing the sensors
    #[serde(default)]
    pub service_uuid: Option<String>,
    #[serde(default, rename = "sensor")]
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    /// "read" or "notify"
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Read-poll cadence, used by the transport side only
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

fn default_stroke_point_count() -> usize {
    STROKE_POINT_COUNT
}

fn default_mode() -> String {
    "read".to_string()
}

fn default_poll_interval() -> u64 {
    gesture::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self::gesture_profile()
    }
}

impl Config {
    /// The built-in stroke + prediction profile
    pub fn gesture_profile() -> Self {
        let field = |name: &str, ty: &str| FieldConfig {
            name: name.to_string(),
            ty: ty.to_string(),
        };
        Self {
            max_records: default_max_records(),
            stroke_point_count: default_stroke_point_count(),
            service_uuid: Some(gesture::SERVICE_UUID.to_string()),
            sensors: vec![
                SensorConfig {
                    name: gesture::STROKE_SENSOR.to_string(),
                    uuid: Some(gesture::STROKE_UUID.to_string()),
                    mode: default_mode(),
                    poll_interval_ms: default_poll_interval(),
                    fields: vec![
                        field(gesture::FIELD_STATE, "Int32"),
                        field(gesture::FIELD_LENGTH, "Int32"),
                        field(gesture::FIELD_STROKE_POINTS, "StrokePoints"),
                    ],
                },
                SensorConfig {
                    name: gesture::PREDICTION_SENSOR.to_string(),
                    uuid: Some(gesture::PREDICTION_UUID.to_string()),
                    mode: default_mode(),
                    poll_interval_ms: default_poll_interval(),
                    fields: vec![field(gesture::FIELD_INDEX, "Uint8")],
                },
            ],
        }
    }

    /// Parse a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid schema file")?;
        Ok(config)
    }

    /// Load a schema file, or the gesture profile when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let config = Self::parse(&content)?;
                info!(path = %path.display(), sensors = config.sensors.len(), "Loaded schema file");
                Ok(config)
            }
            None => {
                info!("No schema file given, using the gesture profile");
                Ok(Self::gesture_profile())
            }
        }
    }

    /// Build every sensor schema, failing on the first unknown type tag
    pub fn schemas(&self) -> Result<Vec<SensorSchema>> {
        self.sensors
            .iter()
            .map(|sensor| {
                sensor
                    .to_schema(self.stroke_point_count)
                    .with_context(|| format!("Invalid sensor {}", sensor.name))
            })
            .collect()
    }
}

impl SensorConfig {
    pub fn to_schema(&self, stroke_point_count: usize) -> sensewire_core::Result<SensorSchema> {
        let mode: AccessMode = self.mode.parse()?;
        let mut builder = SensorSchema::builder(self.name.as_str()).mode(mode);
        if let Some(uuid) = &self.uuid {
            let uuid = Uuid::parse_str(uuid).map_err(|e| {
                sensewire_core::Error::InvalidSchema(format!("bad uuid {}: {}", uuid, e))
            })?;
            builder = builder.uuid(uuid);
        }
        for field in &self.fields {
            let ty = FieldType::parse_tag(&field.ty, stroke_point_count)?;
            builder = builder.field(field.name.as_str(), ty);
        }
        builder.build()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
