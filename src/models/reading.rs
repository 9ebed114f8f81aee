//! Raw telemetry record as handed over by the storage collaborator.
//!
//! Fields arrive loosely typed (numbers as strings, inputs as "on"/"off",
//! timestamps as text or epoch millis). Nothing is validated at decode time;
//! each computation asks for the fields it needs through the accessors below
//! and treats a failure as "skip this record".

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::geo::{self, Coordinates};

/// A number that may have been stored as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawScalar {
    pub fn as_f64(&self) -> Option<f64> {
        let parsed = match self {
            RawScalar::Number(n) => Some(*n),
            RawScalar::Text(s) => s.trim().parse::<f64>().ok(),
            RawScalar::Other(_) => None,
        };
        parsed.filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    EpochMillis(i64),
    Text(String),
    Other(serde_json::Value),
}

impl RawTimestamp {
    pub fn parse(&self) -> Result<DateTime<Utc>, EngineError> {
        match self {
            RawTimestamp::EpochMillis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| EngineError::invalid(format!("epoch millis {ms} out of range"))),
            RawTimestamp::Text(text) => parse_timestamp_text(text),
            RawTimestamp::Other(value) => {
                Err(EngineError::invalid(format!("unsupported timestamp {value}")))
            }
        }
    }
}

fn parse_timestamp_text(text: &str) -> Result<DateTime<Utc>, EngineError> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Storage writes naive UTC timestamps in either of these shapes.
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(EngineError::invalid(format!("malformed timestamp '{text}'")))
}

/// One telemetry sample for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub sensor_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    #[serde(default)]
    pub value: Option<RawScalar>,
    #[serde(default)]
    pub digital_inputs: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub latitude: Option<RawScalar>,
    #[serde(default)]
    pub longitude: Option<RawScalar>,
    #[serde(default)]
    pub event_code: Option<RawScalar>,
}

impl Reading {
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            sensor_id: None,
            timestamp: Some(RawTimestamp::Text(timestamp.to_rfc3339())),
            value: None,
            digital_inputs: None,
            latitude: None,
            longitude: None,
            event_code: None,
        }
    }

    pub fn with_sensor(mut self, sensor_id: impl Into<String>) -> Self {
        self.sensor_id = Some(sensor_id.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(RawScalar::Number(value));
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(RawScalar::Number(latitude));
        self.longitude = Some(RawScalar::Number(longitude));
        self
    }

    pub fn with_input(mut self, name: &str, on: bool) -> Self {
        let level = if on { "on" } else { "off" };
        self.digital_inputs
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), serde_json::Value::String(level.into()));
        self
    }

    pub fn with_event_code(mut self, code: impl Into<String>) -> Self {
        self.event_code = Some(RawScalar::Text(code.into()));
        self
    }

    pub fn device(&self) -> Result<&str, EngineError> {
        let id = self.device_id.trim();
        if id.is_empty() {
            return Err(EngineError::invalid("reading has no device id"));
        }
        Ok(id)
    }

    /// Sensor id, falling back to `"default"` for single-sensor devices.
    pub fn sensor(&self) -> &str {
        self.sensor_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("default")
    }

    pub fn observed_at(&self) -> Result<DateTime<Utc>, EngineError> {
        match &self.timestamp {
            Some(raw) => raw.parse(),
            None => Err(EngineError::invalid(format!(
                "reading from '{}' has no timestamp",
                self.device_id
            ))),
        }
    }

    pub fn numeric_value(&self) -> Result<f64, EngineError> {
        match &self.value {
            Some(raw) => raw.as_f64().ok_or_else(|| {
                EngineError::invalid(format!("non-numeric value {raw:?} from '{}'", self.device_id))
            }),
            None => Err(EngineError::invalid(format!(
                "reading from '{}' has no value",
                self.device_id
            ))),
        }
    }

    /// Level of a named digital input, `None` when absent or unrecognisable.
    pub fn input_level(&self, name: &str) -> Option<bool> {
        self.digital_inputs
            .as_ref()
            .and_then(|inputs| inputs.get(name))
            .and_then(parse_level)
    }

    /// Validated GPS position; rejects missing, non-numeric, out-of-range and (0,0).
    pub fn coordinates(&self) -> Result<Coordinates, EngineError> {
        let lat = self.latitude.as_ref().and_then(RawScalar::as_f64);
        let lon = self.longitude.as_ref().and_then(RawScalar::as_f64);
        match (lat, lon) {
            (Some(lat), Some(lon)) => geo::validate_coordinates(lat, lon),
            _ => Err(EngineError::invalid(format!(
                "reading from '{}' has no numeric latitude/longitude",
                self.device_id
            ))),
        }
    }

    pub fn event_code(&self) -> Result<String, EngineError> {
        let code = match &self.event_code {
            Some(RawScalar::Text(text)) => text.trim().to_string(),
            Some(RawScalar::Number(n)) if n.fract() == 0.0 => format!("{}", *n as i64),
            Some(RawScalar::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if code.is_empty() {
            return Err(EngineError::invalid(format!(
                "reading from '{}' has no event code",
                self.device_id
            )));
        }
        Ok(code)
    }
}

fn parse_level(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "high" => Some(true),
            "off" | "false" | "0" | "low" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
