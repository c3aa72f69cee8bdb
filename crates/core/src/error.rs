//! Unified error types for habit enrichment.
//!
//! Error codes:
//! - FETCH_001-002: Metric provider errors
//! - LINK_001: Linking errors
//! - DB_001: Persistence errors
//! - VALID_001: Validation errors

use std::collections::BTreeMap;
use thiserror::Error;

use crate::date::DateKey;
use crate::habit::MetricKind;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed underlying cause of a persistence failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// FETCH_001: A single metric could not be fetched
    MetricFetch,
    /// FETCH_002: Every metric failed for an enrichment attempt
    AllMetricsUnavailable,
    /// LINK_001: No session exists for the date key
    SessionNotFound,
    /// DB_001: The store rejected a read or commit
    Persistence,
    /// VALID_001: Malformed input
    Validation,
    /// INTERNAL_001: Anything else
    Internal,
}

impl ErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MetricFetch => "FETCH_001",
            Self::AllMetricsUnavailable => "FETCH_002",
            Self::SessionNotFound => "LINK_001",
            Self::Persistence => "DB_001",
            Self::Validation => "VALID_001",
            Self::Internal => "INTERNAL_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MetricFetch => 502,
            Self::AllMetricsUnavailable => 502,
            Self::SessionNotFound => 404,
            Self::Persistence => 500,
            Self::Validation => 400,
            Self::Internal => 500,
        }
    }
}

/// Failure of one metric lookup.
///
/// Absorbed by the aggregator: the metric degrades to 0.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[FETCH_001] {metric}: {message}")]
pub struct MetricFetchError {
    pub metric: MetricKind,
    pub message: String,
}

impl MetricFetchError {
    pub fn new(metric: MetricKind, message: impl Into<String>) -> Self {
        Self {
            metric,
            message: message.into(),
        }
    }
}

/// Unified error type for habit enrichment.
#[derive(Debug, Error)]
pub enum Error {
    #[error("[FETCH_002] all metrics unavailable for {date}: {}", describe_failures(.errors))]
    AllMetricsUnavailable {
        date: DateKey,
        errors: BTreeMap<MetricKind, MetricFetchError>,
    },

    #[error("[LINK_001] no session found for {0}")]
    SessionNotFound(DateKey),

    #[error("[DB_001] {message}: {source}")]
    Persistence {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("[VALID_001] {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

fn describe_failures(errors: &BTreeMap<MetricKind, MetricFetchError>) -> String {
    errors
        .values()
        .map(|e| format!("{}: {}", e.metric, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a persistence error, preserving the underlying cause.
    pub fn persistence(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Persistence {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::AllMetricsUnavailable { .. } => ErrorCode::AllMetricsUnavailable,
            Self::SessionNotFound(_) => ErrorCode::SessionNotFound,
            Self::Persistence { .. } => ErrorCode::Persistence,
            Self::Validation(_) | Self::Serialization(_) => ErrorCode::Validation,
            Self::Config(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        self.error_code().code()
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        self.error_code().http_status()
    }
}
