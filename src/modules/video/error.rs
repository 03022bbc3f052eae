use axum::http::StatusCode;
use thiserror::Error;

/// Error taxonomy for the ingest/transcode pipeline.
///
/// Validation errors surface synchronously to the uploader. Everything else
/// is recorded on the job row and exposed through the status API as a stable
/// code plus free-text detail; it is never thrown back across the async
/// boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("upload exceeds the configured limit of {limit} bytes")]
    TooLarge { limit: u64 },

    /// Retried with backoff, bounded by the retry limit.
    #[error("{detail}")]
    Transient { code: &'static str, detail: String },

    /// Not retried; the job goes straight to `failed`.
    #[error("{detail}")]
    Fatal { code: &'static str, detail: String },

    #[error("job cancelled")]
    Cancelled,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),
}

impl PipelineError {
    pub fn storage_io(detail: impl Into<String>) -> Self {
        Self::Transient { code: "storage_io", detail: detail.into() }
    }

    pub fn spawn_failed(detail: impl Into<String>) -> Self {
        Self::Transient { code: "spawn_failed", detail: detail.into() }
    }

    pub fn queue_unavailable(detail: impl Into<String>) -> Self {
        Self::Transient { code: "queue_unavailable", detail: detail.into() }
    }

    /// Insufficient disk/memory for the subprocess. Transient until the
    /// retry budget says otherwise.
    pub fn resources_exhausted(detail: impl Into<String>) -> Self {
        Self::Transient { code: "resources_exhausted", detail: detail.into() }
    }

    /// The encoder process died by signal (OOM killer, external kill). The
    /// source itself is not implicated, so a rerun may succeed.
    pub fn encoder_killed(detail: impl Into<String>) -> Self {
        Self::Transient { code: "encoder_killed", detail: detail.into() }
    }

    pub fn unsupported_source(detail: impl Into<String>) -> Self {
        Self::Fatal { code: "unsupported_source", detail: detail.into() }
    }

    pub fn encode_failed(detail: impl Into<String>) -> Self {
        Self::Fatal { code: "encode_failed", detail: detail.into() }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::Fatal { code: "timeout", detail: detail.into() }
    }

    /// Stable machine-readable code for the status API.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidContentType(_) => "invalid_content_type",
            Self::TooLarge { .. } => "too_large",
            Self::Transient { code, .. } | Self::Fatal { code, .. } => code,
            Self::Cancelled => "cancelled",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidContentType(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Cancelled => StatusCode::CONFLICT,
            Self::Transient { .. } | Self::Fatal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(PipelineError::InvalidContentType("text/html".into()).code(), "invalid_content_type");
        assert_eq!(PipelineError::TooLarge { limit: 1 }.code(), "too_large");
        assert_eq!(PipelineError::storage_io("s3 down").code(), "storage_io");
        assert_eq!(PipelineError::spawn_failed("enoent").code(), "spawn_failed");
        assert_eq!(PipelineError::resources_exhausted("enospc").code(), "resources_exhausted");
        assert_eq!(PipelineError::encoder_killed("signal 9").code(), "encoder_killed");
        assert_eq!(PipelineError::unsupported_source("no video stream").code(), "unsupported_source");
        assert_eq!(PipelineError::encode_failed("exit 1").code(), "encode_failed");
        assert_eq!(PipelineError::Cancelled.code(), "cancelled");
    }

    #[test]
    fn retry_policy_follows_kind() {
        assert!(PipelineError::storage_io("blip").is_transient());
        assert!(PipelineError::resources_exhausted("enospc").is_transient());
        assert!(PipelineError::encoder_killed("signal 9").is_transient());
        assert!(!PipelineError::encode_failed("corrupt").is_transient());
        assert!(!PipelineError::Cancelled.is_transient());
        assert!(!PipelineError::InvalidContentType("x".into()).is_transient());
    }

    #[test]
    fn validation_maps_to_client_status() {
        assert_eq!(PipelineError::InvalidContentType("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(PipelineError::TooLarge { limit: 1 }.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(PipelineError::NotFound("job").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(PipelineError::Conflict("done".into()).status_code(), StatusCode::CONFLICT);
    }
}
