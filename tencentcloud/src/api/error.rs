use reconcile::{Classification, Classify};
use thiserror::Error;

/// Error code prefixes the control plane uses for transient conditions
const RETRYABLE_CODE_PREFIXES: &[&str] = &[
    "RequestLimitExceeded",
    "InternalError",
    "ResourceInUse",
    "ResourceBusy",
    "ServiceUnavailable",
    "UnsupportedOperation.InvalidState",
];

/// Fragments marking "operation already in progress" codes such as
/// `FailedOperation.TaskInProgress` or `OperationDenied.InstanceProcessing`
const IN_PROGRESS_MARKERS: &[&str] = &["InProgress", "Processing", "Locked"];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("[TencentCloudSDKError] Code={code}, Message={message}, RequestId={request_id}")]
    Service {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{0} is not visible yet after the last write")]
    NotVisible(String),
}

impl ApiError {
    /// Error code reported by the control plane, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            ApiError::Service { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Matches the code exactly or as a dotted parent, so `ResourceNotFound`
    /// matches `ResourceNotFound.InstanceNotFound`
    pub fn has_code(&self, expected: &str) -> bool {
        self.code().is_some_and(|code| code_matches(code, expected))
    }
}

pub(crate) fn code_matches(code: &str, expected: &str) -> bool {
    code == expected
        || code
            .strip_prefix(expected)
            .is_some_and(|rest| rest.starts_with('.'))
}

impl Classify for ApiError {
    fn classify(&self) -> Classification {
        let retryable = match self {
            ApiError::Request(e) => e.is_timeout() || e.is_connect(),
            ApiError::Service { code, .. } => {
                RETRYABLE_CODE_PREFIXES
                    .iter()
                    .any(|prefix| code_matches(code, prefix))
                    || IN_PROGRESS_MARKERS.iter().any(|m| code.contains(m))
            }
            ApiError::Http { status, .. } => *status == 429 || *status >= 500,
            ApiError::Timeout(_)
            | ApiError::RateLimited
            | ApiError::ServiceUnavailable
            | ApiError::NotVisible(_) => true,
            ApiError::ParseError(_) | ApiError::InvalidEndpoint(_) => false,
        };

        if retryable {
            Classification::Retryable
        } else {
            Classification::Fatal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(code: &str) -> ApiError {
        ApiError::Service {
            code: code.to_string(),
            message: "message".to_string(),
            request_id: "req-1".to_string(),
        }
    }

    #[test]
    fn transient_codes_are_retryable() {
        for code in [
            "RequestLimitExceeded",
            "RequestLimitExceeded.UinLimitExceeded",
            "InternalError",
            "InternalError.DbError",
            "ResourceInUse",
            "ResourceBusy",
            "FailedOperation.TaskInProgress",
            "OperationDenied.InstanceProcessing",
            "UnsupportedOperation.InvalidState",
        ] {
            assert!(service(code).is_retryable(), "{} should be retryable", code);
        }
    }

    #[test]
    fn validation_permission_and_not_found_codes_are_fatal() {
        for code in [
            "InvalidParameter",
            "InvalidParameterValue.Range",
            "MissingParameter",
            "UnauthorizedOperation",
            "AuthFailure.SignatureFailure",
            "ResourceNotFound.InstanceNotFound",
            "LimitExceeded.InstanceQuota",
            "InternalErrorish",
        ] {
            assert!(!service(code).is_retryable(), "{} should be fatal", code);
        }
    }

    #[test]
    fn transport_conditions_are_retryable() {
        assert!(ApiError::RateLimited.is_retryable());
        assert!(ApiError::ServiceUnavailable.is_retryable());
        assert!(ApiError::Timeout(30).is_retryable());
        assert!(ApiError::Http {
            status: 502,
            message: String::new()
        }
        .is_retryable());
        assert!(!ApiError::Http {
            status: 403,
            message: String::new()
        }
        .is_retryable());
        assert!(!ApiError::ParseError("bad json".to_string()).is_retryable());
    }

    #[test]
    fn has_code_matches_dotted_parents() {
        let err = service("ResourceNotFound.InstanceNotFound");
        assert!(err.has_code("ResourceNotFound"));
        assert!(err.has_code("ResourceNotFound.InstanceNotFound"));
        assert!(!err.has_code("ResourceNotFound.Instance"));
        assert_eq!(err.request_id(), Some("req-1"));
    }

    #[test]
    fn service_error_formatting() {
        let err = service("InvalidParameter");
        let text = err.to_string();
        assert!(text.contains("Code=InvalidParameter"));
        assert!(text.contains("RequestId=req-1"));
    }
}
