//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check port assignments and timeout ranges
//! - Check catalog seed entries for duplicates and bad media names
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: HlinkConfig → Result<(), Vec<ValidationError>>
//! - Port 0 (ephemeral, used by tests) is exempt from the collision check

use std::collections::HashSet;

use crate::config::schema::HlinkConfig;

/// One semantic problem with a configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Transaction and HTTP listeners share a fixed port.
    PortCollision(u16),
    /// A timing knob is zero.
    ZeroTiming(&'static str),
    /// The HTTP static root is empty.
    EmptyRootDir,
    /// Two catalog seed entries share an id.
    DuplicateTitle(u64),
    /// A catalog seed entry names an unknown medium.
    UnknownMedia(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::PortCollision(port) => {
                write!(f, "transaction and http listeners both use port {}", port)
            }
            ValidationError::ZeroTiming(field) => write!(f, "{} must be greater than zero", field),
            ValidationError::EmptyRootDir => write!(f, "http.root_dir must not be empty"),
            ValidationError::DuplicateTitle(id) => {
                write!(f, "duplicate title id {:#018x}", id)
            }
            ValidationError::UnknownMedia(media) => {
                write!(f, "unknown media '{}', expected 'sd' or 'nand'", media)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &HlinkConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transaction.port == config.http.port && config.transaction.port != 0 {
        errors.push(ValidationError::PortCollision(config.transaction.port));
    }
    if config.transaction.read_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTiming("transaction.read_timeout_ms"));
    }
    if config.transaction.max_idle_reads == 0 {
        errors.push(ValidationError::ZeroTiming("transaction.max_idle_reads"));
    }
    if config.http.root_dir.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyRootDir);
    }

    let mut seen = HashSet::new();
    for title in &config.titles {
        if !seen.insert(title.id) {
            errors.push(ValidationError::DuplicateTitle(title.id));
        }
        if title.media != "sd" && title.media != "nand" {
            errors.push(ValidationError::UnknownMedia(title.media.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
