use crate::errors::ApiError;
use serde::Serialize;

/// Transport codes that mean the request never reached the API.
pub const NETWORK_ERROR_CODES: &[&str] = &[
    "ECONNREFUSED",
    "ECONNRESET",
    "ENOTFOUND",
    "EAI_AGAIN",
    "EPIPE",
    "EHOSTUNREACH",
    "ENETUNREACH",
    "ECONNABORTED",
];

pub const TIMEOUT_ERROR_CODES: &[&str] = &["ETIMEDOUT", "ESOCKETTIMEDOUT", "TIMEOUT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Timeout,
    RateLimited,
    ServerError,
    ClientError,
    ValidationError,
    Unknown,
}

impl FailureKind {
    /// Caller mistakes. Retrying them cannot succeed.
    pub fn is_caller_error(self) -> bool {
        matches!(self, FailureKind::ClientError | FailureKind::ValidationError)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "network" => Some(FailureKind::Network),
            "timeout" => Some(FailureKind::Timeout),
            "rate_limited" => Some(FailureKind::RateLimited),
            "server_error" => Some(FailureKind::ServerError),
            "client_error" => Some(FailureKind::ClientError),
            "validation_error" => Some(FailureKind::ValidationError),
            "unknown" => Some(FailureKind::Unknown),
            _ => None,
        }
    }
}

/// Internal view of a failure. Borrowed from the original error, which is the
/// only thing ever propagated to callers.
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedFailure<'a> {
    pub kind: FailureKind,
    pub http_status: Option<u16>,
    pub raw_cause: &'a ApiError,
}

fn has_code(err: &ApiError, codes: &[&str]) -> bool {
    err.code
        .as_deref()
        .map(|code| codes.iter().any(|known| known.eq_ignore_ascii_case(code)))
        .unwrap_or(false)
}

pub fn classify(err: &ApiError) -> ClassifiedFailure<'_> {
    let http_status = err.http_status();
    let kind = if has_code(err, NETWORK_ERROR_CODES) {
        FailureKind::Network
    } else if http_status.map(|s| s >= 500).unwrap_or(false) {
        FailureKind::ServerError
    } else if http_status == Some(429) {
        FailureKind::RateLimited
    } else if http_status.map(|s| (400..500).contains(&s)).unwrap_or(false) {
        if err.validation_errors().is_some() {
            FailureKind::ValidationError
        } else {
            FailureKind::ClientError
        }
    } else if err.timed_out || has_code(err, TIMEOUT_ERROR_CODES) {
        FailureKind::Timeout
    } else {
        FailureKind::Unknown
    };
    ClassifiedFailure {
        kind,
        http_status,
        raw_cause: err,
    }
}
