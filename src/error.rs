use serde_json::{Map, Value};
use std::error::Error as StdError;

/// Open key-value diagnostics attached to a [`NovitaError`].
///
/// Well-known keys are listed in [`metadata_keys`].
pub type Metadata = Map<String, Value>;

/// Convenience alias used by every fallible call in this crate.
pub type Result<T> = std::result::Result<T, NovitaError>;

/// Code used for failures where no application-level code exists
/// (network errors, undecodable bodies, cancellation, bridge bounds).
pub const TRANSPORT_ERROR_CODE: i64 = -1;

/// Code used for generation tasks that reached a failed terminal status.
pub const TASK_FAILED_CODE: i64 = 0;

/// Message used when a failed task carries no `failed_reason`.
pub const ERROR_GENERATE_IMG_FAILED: &str = "Failed to generate image";

/// Message used when a submission response carries no task id.
pub const ERROR_TASK_NOT_STARTED: &str = "Failed to start the task.";

/// Well-known keys of [`NovitaError::metadata`].
pub mod metadata_keys {
    /// Terminal status value of a failed task.
    pub const TASK_STATUS: &str = "task_status";
    /// Identifier of the task the error relates to.
    pub const TASK_ID: &str = "task_id";
    /// Number of progress polls issued before the error.
    pub const ATTEMPTS: &str = "attempts";
}

/// Machine-readable reasons produced by the SDK itself.
///
/// Reasons returned by the service are passed through verbatim.
pub mod reasons {
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";
    pub const INVALID_URL: &str = "INVALID_URL";
    pub const REQUEST_CANCELLED: &str = "REQUEST_CANCELLED";
    pub const TASK_TIMEOUT: &str = "TASK_TIMEOUT";
    pub const POLL_ATTEMPTS_EXHAUSTED: &str = "POLL_ATTEMPTS_EXHAUSTED";
}

/// The single error type surfaced by the Novita SDK.
///
/// Both response conventions of the service (the legacy `{code, msg, data}`
/// envelope and the newer HTTP-status-driven `{message, reason, metadata}`
/// body), as well as network failures and failed generation tasks, are
/// normalized into this one shape.
#[derive(Debug, thiserror::Error)]
#[error("Novita API error {code}: {message}")]
pub struct NovitaError {
    /// Application code, HTTP status, or [`TRANSPORT_ERROR_CODE`].
    pub code: i64,
    /// Human-readable description.
    pub message: String,
    /// Machine-readable reason. Empty when the source provided none.
    pub reason: String,
    /// Provider-specific diagnostics.
    pub metadata: Option<Metadata>,
    /// The lower-level error this one was built from, if any.
    #[source]
    pub cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl NovitaError {
    /// Creates an error with no reason, metadata or cause.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reason: String::new(),
            metadata: None,
            cause: None,
        }
    }

    /// Sets the machine-readable reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Attaches diagnostics, replacing any already present.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Records the lower-level error exposed through `source()`.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    /// A failure where no response was received from the service.
    pub fn transport(err: reqwest::Error) -> Self {
        Self::new(TRANSPORT_ERROR_CODE, err.to_string())
            .with_reason(reasons::NETWORK_ERROR)
            .with_cause(err)
    }

    /// A response body that could not be decoded into the expected shape.
    pub fn invalid_response(err: serde_json::Error) -> Self {
        Self::new(
            TRANSPORT_ERROR_CODE,
            format!("Failed to parse API response: {}", err),
        )
        .with_reason(reasons::INVALID_RESPONSE)
        .with_cause(err)
    }

    /// The caller's cancellation signal fired while a request was in flight.
    pub fn cancelled() -> Self {
        Self::new(TRANSPORT_ERROR_CODE, "Request was cancelled")
            .with_reason(reasons::REQUEST_CANCELLED)
    }

    /// A generation task reached a failed terminal status.
    pub fn task_failed(task_id: &str, status: i64, failed_reason: Option<&str>) -> Self {
        let message = failed_reason
            .filter(|reason| !reason.is_empty())
            .unwrap_or(ERROR_GENERATE_IMG_FAILED);

        let mut metadata = Metadata::new();
        metadata.insert(metadata_keys::TASK_STATUS.to_string(), Value::from(status));
        metadata.insert(metadata_keys::TASK_ID.to_string(), Value::from(task_id));

        Self::new(TASK_FAILED_CODE, message).with_metadata(metadata)
    }

    /// The terminal task status recorded in the metadata, if any.
    pub fn task_status(&self) -> Option<i64> {
        self.metadata
            .as_ref()?
            .get(metadata_keys::TASK_STATUS)?
            .as_i64()
    }

    /// Whether the failure happened below the application layer.
    pub fn is_transport(&self) -> bool {
        self.code == TRANSPORT_ERROR_CODE
    }
}

impl From<reqwest::Error> for NovitaError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err)
    }
}

impl From<serde_json::Error> for NovitaError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_response(err)
    }
}

impl From<url::ParseError> for NovitaError {
    fn from(err: url::ParseError) -> Self {
        Self::new(TRANSPORT_ERROR_CODE, format!("URL parsing failed: {}", err))
            .with_reason(reasons::INVALID_URL)
            .with_cause(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_failed_falls_back_to_generic_message() {
        let err = NovitaError::task_failed("t1", 4, None);
        assert_eq!(err.code, TASK_FAILED_CODE);
        assert_eq!(err.message, ERROR_GENERATE_IMG_FAILED);
        assert_eq!(err.task_status(), Some(4));

        let err = NovitaError::task_failed("t1", 3, Some(""));
        assert_eq!(err.message, ERROR_GENERATE_IMG_FAILED);

        let err = NovitaError::task_failed("t1", 3, Some("nsfw detected"));
        assert_eq!(err.message, "nsfw detected");
        assert_eq!(err.task_status(), Some(3));
    }

    #[test]
    fn url_errors_are_transport_level() {
        let err: NovitaError = url::Url::parse("not a url").unwrap_err().into();
        assert!(err.is_transport());
        assert_eq!(err.reason, reasons::INVALID_URL);
        assert!(StdError::source(&err).is_some());
    }
}
