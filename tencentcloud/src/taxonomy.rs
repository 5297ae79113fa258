//! Per-family error taxonomy layered over the built-in classification

use reconcile::{Classification, Classify, ErrorClassifier, RetryError};
use regex::Regex;

use crate::api::error::{code_matches, ApiError};

/// Extra retryable code patterns and not-found codes of one resource family
#[derive(Debug, Clone, Default)]
pub struct ErrorTaxonomy {
    retryable: Vec<Regex>,
    not_found: Vec<String>,
}

impl ErrorTaxonomy {
    /// Build a taxonomy; each retryable pattern is a regex matched against
    /// the whole error code
    pub fn new<S: AsRef<str>>(
        retryable_patterns: &[S],
        not_found_codes: &[S],
    ) -> Result<Self, regex::Error> {
        let retryable = retryable_patterns
            .iter()
            .map(|p| Regex::new(&format!("^(?:{})$", p.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            retryable,
            not_found: not_found_codes
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
        })
    }

    /// The error means the resource does not exist (yet, or any more)
    pub fn is_not_found(&self, error: &ApiError) -> bool {
        error
            .code()
            .is_some_and(|code| self.not_found.iter().any(|nf| code_matches(code, nf)))
    }

    pub fn to_retry_error(&self, error: ApiError) -> RetryError<ApiError> {
        RetryError::with_classifier(error, self)
    }
}

impl ErrorClassifier<ApiError> for ErrorTaxonomy {
    fn classify(&self, error: &ApiError) -> Classification {
        if error.is_retryable() {
            return Classification::Retryable;
        }
        match error.code() {
            Some(code) if self.retryable.iter().any(|re| re.is_match(code)) => {
                Classification::Retryable
            }
            _ => Classification::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(code: &str) -> ApiError {
        ApiError::Service {
            code: code.to_string(),
            message: String::new(),
            request_id: "req".to_string(),
        }
    }

    #[test]
    fn family_patterns_extend_builtin_retryable_codes() {
        let taxonomy =
            ErrorTaxonomy::new(&["FailedOperation\\.Dcdb.*", "OperationDenied"], &[]).unwrap();

        assert_eq!(
            taxonomy.classify(&service("FailedOperation.DcdbFlowRunning")),
            Classification::Retryable
        );
        assert_eq!(
            taxonomy.classify(&service("OperationDenied")),
            Classification::Retryable
        );
        assert_eq!(
            taxonomy.classify(&service("OperationDenied.Other")),
            Classification::Fatal
        );
        assert_eq!(
            taxonomy.classify(&service("RequestLimitExceeded")),
            Classification::Retryable
        );
        assert_eq!(
            taxonomy.classify(&service("InvalidParameter")),
            Classification::Fatal
        );
    }

    #[test]
    fn not_found_codes_match_dotted_children() {
        let taxonomy = ErrorTaxonomy::new(&[] as &[&str], &["ResourceNotFound"]).unwrap();

        assert!(taxonomy.is_not_found(&service("ResourceNotFound.InstanceNotFound")));
        assert!(!taxonomy.is_not_found(&service("InvalidInstanceId.NotFound")));
        assert!(!taxonomy.is_not_found(&ApiError::RateLimited));
    }

    #[test]
    fn to_retry_error_wraps_by_classification() {
        let taxonomy = ErrorTaxonomy::default();
        assert!(taxonomy.to_retry_error(ApiError::RateLimited).is_retryable());
        assert!(!taxonomy
            .to_retry_error(service("UnauthorizedOperation"))
            .is_retryable());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(ErrorTaxonomy::new(&["("], &[]).is_err());
    }
}
