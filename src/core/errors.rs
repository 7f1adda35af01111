/*
 * Defines the error taxonomy shared by every backend implementation and by the
 * request controller. Real and simulated backends both produce `ApiError`, so
 * callers rendering an error state cannot tell which backend is active.
 *
 * The HTTP mapping (`ApiError::from_status`) lives here rather than in the HTTP
 * backend so the simulated backend can reuse the exact same status/code pairs.
 */
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/*
 * The category of a failed backend call. `Validation` carries the list of
 * offending field names; every other kind is fully described by the status,
 * code and message on the surrounding `ApiError`.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    Network,
    Timeout,
    Validation { fields: Vec<String> },
    Authentication,
    Permission,
    NotFound,
    Server,
    Cycle,
}

impl ApiErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ApiErrorKind::Network => "NetworkError",
            ApiErrorKind::Timeout => "TimeoutError",
            ApiErrorKind::Validation { .. } => "ValidationError",
            ApiErrorKind::Authentication => "AuthenticationError",
            ApiErrorKind::Permission => "PermissionError",
            ApiErrorKind::NotFound => "NotFoundError",
            ApiErrorKind::Server => "ServerError",
            ApiErrorKind::Cycle => "CycleError",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    /* HTTP status, or `None` when no response was received. */
    pub status: Option<u16>,
    pub code: String,
    pub timestamp: OffsetDateTime,
    pub request_id: Option<String>,
}

/*
 * Error body returned by the real backend on non-2xx responses. All fields are
 * optional because proxies and crashed handlers do not always honour the format.
 */
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    pub request_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ApiError {
    pub fn new(
        kind: ApiErrorKind,
        status: Option<u16>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ApiError {
            kind,
            message: message.into(),
            status,
            code: code.into(),
            timestamp: OffsetDateTime::now_utc(),
            request_id: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, None, "NETWORK_ERROR", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, Some(408), "TIMEOUT", message)
    }

    pub fn validation(fields: Vec<String>, message: impl Into<String>) -> Self {
        Self::new(
            ApiErrorKind::Validation { fields },
            Some(422),
            "VALIDATION_ERROR",
            message,
        )
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Permission, Some(403), "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, Some(404), "NOT_FOUND", message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Server, Some(500), "INTERNAL_ERROR", message)
    }

    pub fn cycle(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Cycle, Some(409), "CYCLE_DETECTED", message)
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /*
     * Maps a non-success HTTP status and its (possibly empty) error body onto the
     * taxonomy. 400 and 422 are both treated as validation failures; anything that
     * is not otherwise recognised is reported as a server error with its real status.
     */
    pub fn from_status(status: u16, body: ErrorBody) -> Self {
        let kind = match status {
            400 | 422 => ApiErrorKind::Validation {
                fields: body.fields.clone(),
            },
            401 => ApiErrorKind::Authentication,
            403 => ApiErrorKind::Permission,
            404 => ApiErrorKind::NotFound,
            408 | 504 => ApiErrorKind::Timeout,
            409 if body.code.as_deref() == Some("CYCLE_DETECTED") => ApiErrorKind::Cycle,
            _ => ApiErrorKind::Server,
        };
        let code = body
            .code
            .unwrap_or_else(|| format!("HTTP_{status}"));
        let message = body
            .message
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        Self::new(kind, Some(status), code, message).with_request_id(body.request_id)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ApiErrorKind::Network | ApiErrorKind::Timeout | ApiErrorKind::Server
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let when = self
            .timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());
        match self.status {
            Some(status) => write!(
                f,
                "{} ({status}, {}) at {when}: {}",
                self.kind.name(),
                self.code,
                self.message
            ),
            None => write!(
                f,
                "{} ({}) at {when}: {}",
                self.kind.name(),
                self.code,
                self.message
            ),
        }
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: Option<&str>, fields: &[&str]) -> ErrorBody {
        ErrorBody {
            message: Some("boom".to_string()),
            code: code.map(str::to_string),
            request_id: Some("req-7".to_string()),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_from_status_maps_well_known_statuses() {
        assert_eq!(
            ApiError::from_status(401, body(None, &[])).kind,
            ApiErrorKind::Authentication
        );
        assert_eq!(
            ApiError::from_status(403, body(None, &[])).kind,
            ApiErrorKind::Permission
        );
        assert_eq!(
            ApiError::from_status(404, body(None, &[])).kind,
            ApiErrorKind::NotFound
        );
        assert_eq!(
            ApiError::from_status(503, body(None, &[])).kind,
            ApiErrorKind::Server
        );
        assert_eq!(
            ApiError::from_status(422, body(None, &["name"])).kind,
            ApiErrorKind::Validation {
                fields: vec!["name".to_string()]
            }
        );
    }

    #[test]
    fn test_from_status_keeps_body_details() {
        let err = ApiError::from_status(409, body(Some("CYCLE_DETECTED"), &[]));
        assert_eq!(err.kind, ApiErrorKind::Cycle);
        assert_eq!(err.status, Some(409));
        assert_eq!(err.code, "CYCLE_DETECTED");
        assert_eq!(err.message, "boom");
        assert_eq!(err.request_id.as_deref(), Some("req-7"));
    }

    #[test]
    fn test_from_status_with_empty_body_synthesizes_code_and_message() {
        let err = ApiError::from_status(418, ErrorBody::default());
        assert_eq!(err.kind, ApiErrorKind::Server);
        assert_eq!(err.code, "HTTP_418");
        assert!(err.message.contains("418"));
    }

    #[test]
    fn test_from_status_unauthorized_keeps_request_id() {
        let err = ApiError::from_status(
            401,
            ErrorBody {
                request_id: Some("req-401".to_string()),
                ..ErrorBody::default()
            },
        );
        assert_eq!(err.kind, ApiErrorKind::Authentication);
        assert_eq!(err.status, Some(401));
        assert_eq!(err.code, "HTTP_401");
        assert_eq!(err.request_id.as_deref(), Some("req-401"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display_names_kind_and_code() {
        let text = ApiError::permission("nope").to_string();
        assert!(text.starts_with("PermissionError (403, FORBIDDEN)"));
        assert!(text.ends_with("nope"));
        assert!(ApiError::network("down").to_string().starts_with("NetworkError (NETWORK_ERROR)"));
    }
}
