//! Shared error type for academy services

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Lookup miss carrying the machine-readable code (e.g. `COURSE_NOT_FOUND`)
    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    /// Business conflict; `index` names the unique index when a write hit one
    #[error("Conflict: {message}")]
    Conflict {
        code: &'static str,
        message: String,
        index: Option<String>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("NATS error: {0}")]
    Nats(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Not-found error with a resource-specific code
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    /// Conflict error with a specific code
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
            index: None,
        }
    }

    /// Unique index violation reported by a storage backend
    pub fn duplicate_key(index: impl Into<String>) -> Self {
        let index = index.into();
        let code = if index.starts_with("slug") {
            "SLUG_CONFLICT"
        } else {
            "DUPLICATE"
        };
        Self::Conflict {
            code,
            message: format!("A document with the same unique key already exists ({})", index),
            index: Some(index),
        }
    }

    /// Name of the violated unique index, for conflicts raised by a write
    pub fn conflict_index(&self) -> Option<&str> {
        match self {
            Self::Conflict { index, .. } => index.as_deref(),
            _ => None,
        }
    }

    /// Machine-readable error code rendered into the response envelope
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { code, .. } | Self::Conflict { code, .. } => code,
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidSlug(_) => "INVALID_SLUG_FORMAT",
            Self::Database(_) => "DATABASE_UNAVAILABLE",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Nats(_) => "EVENT_BUS_ERROR",
            Self::Json(_) => "INVALID_JSON",
            Self::Io(_) | Self::Config(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<mongodb::error::Error> for ServiceError {
    fn from(e: mongodb::error::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<bson::ser::Error> for ServiceError {
    fn from(e: bson::ser::Error) -> Self {
        Self::Internal(format!("BSON encode failed: {}", e))
    }
}

impl From<bson::de::Error> for ServiceError {
    fn from(e: bson::de::Error) -> Self {
        Self::Internal(format!("BSON decode failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            ServiceError::not_found("COURSE_NOT_FOUND", "missing").code(),
            "COURSE_NOT_FOUND"
        );
        assert_eq!(ServiceError::InvalidSlug("x".into()).code(), "INVALID_SLUG_FORMAT");
        assert_eq!(ServiceError::Database("down".into()).code(), "DATABASE_UNAVAILABLE");
    }

    #[test]
    fn test_duplicate_key_codes() {
        let slug = ServiceError::duplicate_key("slug_unique");
        assert_eq!(slug.code(), "SLUG_CONFLICT");
        assert_eq!(slug.conflict_index(), Some("slug_unique"));

        let pair = ServiceError::duplicate_key("user_course_unique");
        assert_eq!(pair.code(), "DUPLICATE");
        assert_eq!(pair.conflict_index(), Some("user_course_unique"));

        assert_eq!(ServiceError::conflict("SLUG_CONFLICT", "x").conflict_index(), None);
    }

    #[test]
    fn test_display_uses_message() {
        let err = ServiceError::not_found("PATH_NOT_FOUND", "Learning path not found");
        assert_eq!(err.to_string(), "Learning path not found");
    }
}
