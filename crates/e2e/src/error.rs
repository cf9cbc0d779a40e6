//! Error types for E2E testing

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Playwright not found. Install with: npx playwright install")]
    DriverNotFound,

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Browser driver exited")]
    DriverClosed,

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error(
        "Timed out after {elapsed:?} ({samples} samples) waiting for {observation} to {expectation}; last observed: {last}"
    )]
    Timeout {
        observation: String,
        expectation: String,
        elapsed: Duration,
        samples: u32,
        last: String,
    },

    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
