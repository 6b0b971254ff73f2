//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, multiplier >= 1, delays ordered)
//! - Validate status codes and worker counts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{ClientConfig, RetryConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a whole client configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_retries(&config.retries);

    if config.transport.backend.trim().is_empty() {
        errors.push(ValidationError::new("transport.backend", "must not be empty"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be greater than 0"));
    }
    if config.worker_pool.worker_threads == 0 {
        errors.push(ValidationError::new(
            "worker_pool.worker_threads",
            "must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the retry section on its own.
pub fn validate_retries(retries: &RetryConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if !retries.multiplier.is_finite() || retries.multiplier < 1.0 {
        errors.push(ValidationError::new(
            "retries.multiplier",
            format!("must be a finite number >= 1.0, got {}", retries.multiplier),
        ));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            format!(
                "base delay {}ms exceeds max delay {}ms",
                retries.base_delay_ms, retries.max_delay_ms
            ),
        ));
    }
    for status in &retries.retryable_statuses {
        if !(100..=599).contains(status) {
            errors.push(ValidationError::new(
                "retries.retryable_statuses",
                format!("{status} is not a valid HTTP status code"),
            ));
        }
    }
    if retries.deadline_ms == Some(0) {
        errors.push(ValidationError::new("retries.deadline_ms", "must be greater than 0"));
    }

    errors
}
