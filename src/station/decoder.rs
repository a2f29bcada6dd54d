//! Tempest UDP broadcast decoding
//!
//! Every datagram is one JSON object with a `type` field. Only `obs_st`
//! feeds the history; `rapid_wind` is decoded for logging and everything
//! else is passed through by name.

use crate::history::Observation;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Number of positional fields in an `obs_st` observation
const OBS_ST_FIELDS: usize = 18;

const OBS_TIME: usize = 0;
const OBS_TEMPERATURE: usize = 7;
const OBS_HUMIDITY: usize = 8;
const OBS_BATTERY: usize = 16;
/// Minutes covered by the report, used as its sample count
const OBS_REPORT_INTERVAL: usize = 17;

/// Accepted observation epochs: after 1970 and before the year 10000.
/// Millisecond timestamps and garbage fall outside.
const EPOCH_RANGE: std::ops::RangeInclusive<i64> = 1..=253_402_300_799;

/// Errors that can occur while decoding a datagram
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload is not JSON, or lacks a `type` field
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON is well formed but the observation array is not
    #[error("Unexpected message shape: {0}")]
    Shape(String),
}

/// A decoded station message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `obs_st`: one Tempest observation
    Observation(Observation),
    /// `rapid_wind`: instantaneous wind, every few seconds
    RapidWind { time: i64, speed: f64, direction: f64 },
    /// Any other message type, by name
    Other(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    obs: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    ob: Option<Vec<Value>>,
}

/// Decode one raw datagram payload
pub fn decode(payload: &str) -> Result<Message, DecodeError> {
    let envelope: Envelope = serde_json::from_str(payload)?;

    match envelope.kind.as_str() {
        "obs_st" => {
            let obs = envelope
                .obs
                .ok_or_else(|| DecodeError::Shape("obs_st without obs".to_string()))?;
            let [fields] = obs.as_slice() else {
                return Err(DecodeError::Shape(format!(
                    "expected 1 observation, found {}",
                    obs.len()
                )));
            };
            if fields.len() != OBS_ST_FIELDS {
                return Err(DecodeError::Shape(format!(
                    "expected {} obs_st fields, found {}",
                    OBS_ST_FIELDS,
                    fields.len()
                )));
            }

            let time = integer(fields, OBS_TIME)?;
            if !EPOCH_RANGE.contains(&time) {
                return Err(DecodeError::Shape(format!("time out of range: {}", time)));
            }

            let interval = integer(fields, OBS_REPORT_INTERVAL)?;
            let sample_count = u32::try_from(interval)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    DecodeError::Shape(format!("report interval out of range: {}", interval))
                })?;

            Ok(Message::Observation(
                Observation::reading(
                    time,
                    number(fields, OBS_TEMPERATURE)?,
                    number(fields, OBS_HUMIDITY)?,
                    number(fields, OBS_BATTERY)?,
                )
                .sample_count(sample_count),
            ))
        }
        "rapid_wind" => {
            let ob = envelope
                .ob
                .ok_or_else(|| DecodeError::Shape("rapid_wind without ob".to_string()))?;
            if ob.len() != 3 {
                return Err(DecodeError::Shape(format!(
                    "expected 3 rapid_wind fields, found {}",
                    ob.len()
                )));
            }

            Ok(Message::RapidWind {
                time: integer(&ob, 0)?,
                speed: number(&ob, 1)?,
                direction: number(&ob, 2)?,
            })
        }
        other => Ok(Message::Other(other.to_string())),
    }
}

/// Decode a logged line, keeping only observations
///
/// Used when replaying log files, where anything else is noise.
pub fn decode_observation(line: &str) -> Option<Observation> {
    match decode(line) {
        Ok(Message::Observation(obs)) => Some(obs),
        Ok(_) => None,
        Err(e) => {
            tracing::trace!("Skipping log line: {}", e);
            None
        }
    }
}

fn number(fields: &[Value], idx: usize) -> Result<f64, DecodeError> {
    fields[idx]
        .as_f64()
        .ok_or_else(|| DecodeError::Shape(format!("field {} is not a number: {}", idx, fields[idx])))
}

fn integer(fields: &[Value], idx: usize) -> Result<i64, DecodeError> {
    fields[idx].as_i64().ok_or_else(|| {
        DecodeError::Shape(format!("field {} is not an integer: {}", idx, fields[idx]))
    })
}
