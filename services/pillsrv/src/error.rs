//! Error handling for PillSrv

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::{MedicationId, SlotIndex};

/// Result type alias
pub type Result<T> = std::result::Result<T, PillError>;

/// Pill service error types
#[derive(Error, Debug)]
pub enum PillError {
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("All {capacity} slots are occupied")]
    CapacityExceeded { capacity: usize },

    #[error("Medication {med_id} is scheduled but holds no slot")]
    ScheduleUnresolved { med_id: MedicationId },

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Slot was acknowledged and switched off, but the dose could not be saved
    #[error("Dose on slot {slot} for medication {med_id} was not recorded: {reason}")]
    DoseNotRecorded {
        slot: SlotIndex,
        med_id: MedicationId,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PillError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        PillError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        PillError::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PillError::Config(msg.into())
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PillError::NotFound { .. } => StatusCode::NOT_FOUND,
            PillError::CapacityExceeded { .. } | PillError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            },
            PillError::ScheduleUnresolved { .. } => StatusCode::CONFLICT,
            PillError::Store(_)
            | PillError::DoseNotRecorded { .. }
            | PillError::Device(_)
            | PillError::Config(_)
            | PillError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<common::Error> for PillError {
    fn from(err: common::Error) -> Self {
        match err {
            common::Error::Sqlite(e) => PillError::Store(e),
            common::Error::Io(e) => PillError::Io(e),
            other => PillError::Config(other.to_string()),
        }
    }
}

impl From<figment::Error> for PillError {
    fn from(err: figment::Error) -> Self {
        PillError::Config(err.to_string())
    }
}

// HTTP response conversion for Axum
impl IntoResponse for PillError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            PillError::Store(_) => "Database error".to_string(),
            PillError::Config(_) => "Configuration error".to_string(),
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Output adapter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Invalid slot index: {0}")]
    InvalidSlot(usize),

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("Device unavailable: {0}")]
    Unavailable(String),
}
