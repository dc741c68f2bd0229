use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

use crate::core::ReturnModelError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("failed to read scenario file {}", path.display())]
    ReadScenario {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON payload: {0}")]
    ParseScenario(#[source] serde_json::Error),
    #[error("failed to serialize result: {0}")]
    WriteOutput(#[source] serde_json::Error),
    #[error("simulation failed: {0}")]
    Simulation(#[from] ReturnModelError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidScenario(_) | ApiError::ParseScenario(_) => StatusCode::BAD_REQUEST,
            ApiError::ReadScenario { .. } | ApiError::WriteOutput(_) | ApiError::Simulation(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
