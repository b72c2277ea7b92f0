//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parseable)
//! - Check the selection table names distinct, non-empty exports
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RegistryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::RegistryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn error(errors: &mut Vec<ValidationError>, field: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.to_string(),
        message: message.into(),
    });
}

/// Run all semantic checks, accumulating every violation.
pub fn validate_config(config: &RegistryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        error(
            &mut errors,
            "listener.bind_address",
            format!("not a valid socket address: {:?}", config.listener.bind_address),
        );
    }
    if config.listener.max_connections == 0 {
        error(&mut errors, "listener.max_connections", "must be at least 1");
    }

    if config.timeouts.request_secs == 0 {
        error(&mut errors, "timeouts.request_secs", "must be at least 1");
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        error(
            &mut errors,
            "observability.metrics_address",
            format!(
                "not a valid socket address: {:?}",
                config.observability.metrics_address
            ),
        );
    }

    for (field, value) in [
        ("selection.authentication", &config.selection.authentication),
        ("selection.database", &config.selection.database),
        ("selection.validation", &config.selection.validation),
        ("selection.cache", &config.selection.cache),
    ] {
        if let Some(name) = value {
            if name.is_empty() {
                error(&mut errors, field, "export name must not be empty");
            }
        }
    }
    for (category, name) in &config.selection.storage {
        if category.is_empty() || name.is_empty() {
            error(
                &mut errors,
                "selection.storage",
                "category and export name must not be empty",
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
