use std::{fs, path::Path};

use serde::{de, Deserialize, Deserializer};
use serde_json::Number;
use tracing::debug;

/// A single entry of the input event log.
///
/// The log carries more fields than this (translation id, languages, client
/// name, word count...), they don't affect the average and are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryEvent {
    pub timestamp: String,
    /// Delivery time. Missing or `null` is only an error once the event
    /// reaches the window.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: Option<u64>,
}

/// Durations are whole numbers, but some producers write them as floats
/// (`20.0`). Those are accepted as long as nothing is lost.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(duration) = number.as_u64() {
        return Ok(Some(duration));
    }
    match number.as_f64() {
        // 2^64 is exactly representable, u64::MAX is not
        Some(value) if value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 => {
            Ok(Some(value as u64))
        }
        _ => Err(de::Error::custom(format!(
            "duration must be a non-negative whole number, got {number}"
        ))),
    }
}

impl DeliveryEvent {
    pub fn new(timestamp: impl Into<String>, duration: u64) -> Self {
        DeliveryEvent {
            timestamp: timestamp.into(),
            duration: Some(duration),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Failed to read event log {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Event log {path} is not a valid JSON list of events: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Reads the whole event log, a JSON array of events in chronological order.
#[tracing::instrument(level = "debug")]
pub fn load_events(path: &Path) -> Result<Vec<DeliveryEvent>, EventError> {
    let raw = fs::read_to_string(path).map_err(|source| EventError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let events: Vec<DeliveryEvent> =
        serde_json::from_str(&raw).map_err(|source| EventError::Json {
            path: path.display().to_string(),
            source,
        })?;
    debug!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}
