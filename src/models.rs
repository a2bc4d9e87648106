use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::ValidationError;

/// A selected video held in memory for the current session.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaItem {
    pub payload: Bytes,
    pub original_name: String,
    pub mime_type: String,
}

impl MediaItem {
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            payload: payload.into(),
            original_name: original_name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    /// Name without any directory part, as shown next to the preview.
    pub fn display_name(&self) -> &str {
        self.original_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.original_name)
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// The four numeric inputs sent with every process request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterField {
    NoOfLanes,
    PlatoonWeight,
    IncomingDistance,
    AverageSpeed,
}

impl ParameterField {
    pub const ALL: [ParameterField; 4] = [
        ParameterField::NoOfLanes,
        ParameterField::PlatoonWeight,
        ParameterField::IncomingDistance,
        ParameterField::AverageSpeed,
    ];

    /// Wire/form key for this field.
    pub fn key(self) -> &'static str {
        match self {
            ParameterField::NoOfLanes => "no_of_lanes",
            ParameterField::PlatoonWeight => "platoon_weight",
            ParameterField::IncomingDistance => "incoming_distance",
            ParameterField::AverageSpeed => "average_speed",
        }
    }
}

impl fmt::Display for ParameterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ParameterField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParameterField::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| ValidationError::UnknownParameter(s.to_string()))
    }
}

/// Parameters after numeric coercion. `None` is a value that did not parse
/// and goes over the wire as `null`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ParameterSet {
    pub no_of_lanes: Option<f64>,
    pub platoon_weight: Option<f64>,
    pub incoming_distance: Option<f64>,
    pub average_speed: Option<f64>,
}

impl ParameterSet {
    pub fn get(&self, field: ParameterField) -> Option<f64> {
        match field {
            ParameterField::NoOfLanes => self.no_of_lanes,
            ParameterField::PlatoonWeight => self.platoon_weight,
            ParameterField::IncomingDistance => self.incoming_distance,
            ParameterField::AverageSpeed => self.average_speed,
        }
    }

    pub fn set(&mut self, field: ParameterField, value: Option<f64>) {
        match field {
            ParameterField::NoOfLanes => self.no_of_lanes = value,
            ParameterField::PlatoonWeight => self.platoon_weight = value,
            ParameterField::IncomingDistance => self.incoming_distance = value,
            ParameterField::AverageSpeed => self.average_speed = value,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessRequest<'a> {
    pub files: &'a [String],
    #[serde(flatten)]
    pub parameters: ParameterSet,
}

/// Body of a non-2xx answer from either endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of the process endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub intersection: String,
    #[serde(default)]
    pub videos_processed: Vec<String>,
    #[serde(default)]
    pub results: IndexMap<String, PerFileResult>,
}

/// Outcome for one processed file. A per-file error does not fail the batch,
/// and neither does an entry that cannot be read: it becomes an error entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "WirePerFileResult")]
pub enum PerFileResult {
    Error { error: String },
    Success(PerFileMetrics),
}

impl PerFileResult {
    pub fn is_error(&self) -> bool {
        matches!(self, PerFileResult::Error { .. })
    }

    pub fn cps(&self) -> Option<f64> {
        match self {
            PerFileResult::Success(metrics) => metrics.cps,
            PerFileResult::Error { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerFileMetrics {
    pub file_name: Option<String>,
    pub t_clear: Option<f64>,
    pub traffic_score: Option<f64>,
    /// Canonical or legacy key, 0 when neither was sent.
    pub safety_penalty: f64,
    pub green_wave_bonus: Option<f64>,
    pub cps: Option<f64>,
    pub frame_data: Option<Value>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct WirePerFileResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    t_clear: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    traffic_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    safety_penalty: Option<f64>,
    #[serde(
        rename = "safety_penatly",
        skip_serializing,
        deserialize_with = "lenient_number"
    )]
    legacy_safety_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    green_wave_bonus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    cps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_data: Option<Value>,
}

/// A metric that is not a JSON number reads as absent.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_f64())
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

impl From<Value> for PerFileResult {
    fn from(value: Value) -> Self {
        if !value.is_object() {
            warn!("[results] Unreadable entry: {}", value);
            return PerFileResult::Error {
                error: format!("Unreadable result: {}", value),
            };
        }
        match serde_json::from_value::<WirePerFileResult>(value) {
            Ok(wire) => wire.into(),
            Err(e) => PerFileResult::Error {
                error: format!("Unreadable result: {}", e),
            },
        }
    }
}

impl From<WirePerFileResult> for PerFileResult {
    fn from(wire: WirePerFileResult) -> Self {
        if let Some(error) = wire.error {
            let error = match error {
                Value::String(message) => message,
                other => other.to_string(),
            };
            return PerFileResult::Error { error };
        }

        PerFileResult::Success(PerFileMetrics {
            file_name: wire.file_name,
            t_clear: wire.t_clear,
            traffic_score: wire.traffic_score,
            safety_penalty: wire
                .safety_penalty
                .or(wire.legacy_safety_penalty)
                .unwrap_or(0.0),
            green_wave_bonus: wire.green_wave_bonus,
            cps: wire.cps,
            frame_data: wire.frame_data,
        })
    }
}

impl From<PerFileResult> for WirePerFileResult {
    fn from(result: PerFileResult) -> Self {
        match result {
            PerFileResult::Error { error } => WirePerFileResult {
                error: Some(Value::String(error)),
                ..Default::default()
            },
            PerFileResult::Success(metrics) => WirePerFileResult {
                file_name: metrics.file_name,
                t_clear: metrics.t_clear,
                traffic_score: metrics.traffic_score,
                safety_penalty: Some(metrics.safety_penalty),
                green_wave_bonus: metrics.green_wave_bonus,
                cps: metrics.cps,
                frame_data: metrics.frame_data,
                ..Default::default()
            },
        }
    }
}
