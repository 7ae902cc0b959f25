//! Wire models for the Neviweb JSON API.
//!
//! Notes
//! - Records carry only the fields the client uses; unknown keys are ignored.
//! - `active` flags arrive as booleans or as 0/1 and are normalised to `bool`.
//! - Numeric live fields also accept numeric strings and booleans.
//! - Live device fields use `Option<Option<T>>`: outer `None` means the key was absent,
//!   `Some(None)` means the server sent `null`.

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =====================
// Records
// =====================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub session: Option<String>,
}

/// Entry of `GET /api/gateway`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRecord {
    pub id: GatewayId,
    #[serde(rename = "macID")]
    pub mac_id: String,
    pub name: String,
    #[serde(deserialize_with = "truthy")]
    pub active: bool,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

/// Entry of `GET /api/device?gatewayId=..`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub name: String,
    pub gateway_id: GatewayId,
    #[serde(deserialize_with = "truthy")]
    pub active: bool,
    pub model: i64,
    pub r#type: i64,
    pub temp_min: f64,
    pub temp_max: f64,
}

/// Body of `GET /api/device/{id}/data` and of every write response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceData {
    #[serde(default, deserialize_with = "present_int")]
    pub alarm: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present_code")]
    pub error_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_int")]
    pub heat_level: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present_int")]
    pub mode: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present_float")]
    pub setpoint: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present_float")]
    pub temperature: Option<Option<f64>>,
}

// =====================
// Field helpers
// =====================

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

// Firmware reports numbers as JSON numbers, numeric strings or booleans.
fn lenient_float(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| lenient_float(value).filter(|v| v.fract() == 0.0).map(|v| v as i64)),
        other => lenient_float(other).map(|v| v as i64),
    }
}

// These helpers only run when the key exists, so `Some(..)` records presence.
// A value that is not numeric at all is dropped as if the key were absent.
fn present_with<'de, D, T>(
    deserializer: D,
    field: &str,
    parse: fn(&Value) -> Option<T>,
) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(Some(None));
    }
    match parse(&value) {
        Some(parsed) => Ok(Some(Some(parsed))),
        None => {
            warn!("Ignoring non-numeric {} value {}", field, value);
            Ok(None)
        }
    }
}

fn present_int<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    present_with(deserializer, "integer", lenient_int)
}

fn present_float<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    present_with(deserializer, "decimal", lenient_float)
}

fn present_code<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }))
}
