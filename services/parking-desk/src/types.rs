//! Wire types exchanged with the parking backend

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// One vehicle's parking session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub plate_number: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub entry_time: String,
    #[serde(default)]
    pub exit_time: Option<String>,
    #[serde(default)]
    pub fee: Option<f64>,
}

impl Record {
    /// Exit timestamp, ignoring empty strings
    pub fn exit_time(&self) -> Option<&str> {
        self.exit_time.as_deref().filter(|t| !t.is_empty())
    }

    /// Fee once it has been computed. The backend stores `0.0` until exit.
    pub fn computed_fee(&self) -> Option<f64> {
        computed_fee(self.fee)
    }

    pub fn state(&self) -> RecordState {
        if self.exit_time().is_some() {
            RecordState::Exited
        } else {
            RecordState::Parked
        }
    }
}

/// Client-side lifecycle of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Parked,
    Exited,
    Deleted,
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordState::Parked => write!(f, "Parked"),
            RecordState::Exited => write!(f, "Exited"),
            RecordState::Deleted => write!(f, "Deleted"),
        }
    }
}

/// One physical parking slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: u64,
    #[serde(default, alias = "space_number", deserialize_with = "string_or_number")]
    pub number: String,
    #[serde(default)]
    pub is_occupied: bool,
    #[serde(default)]
    pub plate_number: Option<String>,
    #[serde(default, alias = "is_charging", alias = "charging_enabled")]
    pub charging: bool,
    #[serde(default)]
    pub charging_cost: Option<f64>,
}

impl Space {
    /// Display label; falls back to the id when the backend sends no number
    pub fn label(&self) -> String {
        if self.number.is_empty() {
            self.id.to_string()
        } else {
            self.number.clone()
        }
    }

    pub fn occupant(&self) -> Option<&str> {
        self.plate_number.as_deref().filter(|p| !p.is_empty())
    }
}

/// Generic `{message}` / `{error}` reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MessageResponse {
    /// `message` if present, else `error`
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .filter(|m| !m.is_empty())
    }
}

/// Record as echoed back by `POST /exit/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitedRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub plate_number: Option<String>,
    #[serde(default)]
    pub exit_time: Option<String>,
    #[serde(default)]
    pub fee: Option<f64>,
}

impl ExitedRecord {
    pub fn computed_fee(&self) -> Option<f64> {
        computed_fee(self.fee)
    }
}

/// Reply of `POST /exit/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub record: Option<ExitedRecord>,
}

/// Reply of `POST /calculate_fee`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub plate_number: String,
    pub estimated_fee: f64,
}

/// Reply of `GET /find_record/{plate}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundRecord {
    pub record_id: u64,
}

/// Reply of the plate recognition endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionResponse {
    #[serde(default)]
    pub plate_number: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RecognitionResponse {
    pub fn plate(&self) -> Option<&str> {
        self.plate_number
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

fn computed_fee(fee: Option<f64>) -> Option<f64> {
    fee.filter(|f| f.is_finite() && *f != 0.0)
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(other) => Ok(other.to_string()),
    }
}
