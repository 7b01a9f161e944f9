/*!
 * Error types for dsx
 */

use dsx_core_poll::PollError;
use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DsxError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Longest slice of a response body carried inside an error message
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum DsxError {
    /// Network failure or client-side timeout below the HTTP layer
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// A 2xx response was expected
    #[error("unexpected HTTP {status} from {url}{}", body_excerpt(.body))]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// Creating a remote resource was rejected
    #[error("failed to initiate {resource}: {source}")]
    InitiationFailed {
        resource: String,
        #[source]
        source: Box<DsxError>,
    },

    /// Remote resource settled in a failure terminal (TERMINATED, FAILED, REJECTED)
    #[error("{resource} failed: {reason}")]
    ProtocolTerminal {
        resource: String,
        state: String,
        reason: String,
    },

    /// JSON parse failure or missing required field
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Success terminal reported without the field that must accompany it
    #[error("{resource} reported {state} without {field}")]
    MalformedTerminalState {
        resource: String,
        state: String,
        field: String,
    },

    /// EDR lacks a usable endpoint or auth code
    #[error("malformed EDR: {0}")]
    MalformedEdr(String),

    /// Attempts exhausted while the resource was still pending
    #[error("{resource} still pending after {attempts} attempts{}", state_suffix(.last_state))]
    PollTimeout {
        resource: String,
        attempts: u32,
        last_state: Option<String>,
    },

    /// Catalog response carried no datasets
    #[error("catalog contains no datasets")]
    EmptyCatalog,

    /// Target asset missing from an otherwise well-formed catalog
    #[error("asset '{target}' not found in catalog; available assets: {available:?}")]
    AssetNotFound {
        target: String,
        available: Vec<String>,
    },

    /// Matched dataset has no offer policy
    #[error("asset '{0}' has no policy")]
    MissingPolicy(String),

    /// EDR list empty for a started transfer
    #[error("no EDR found for transfer {0}")]
    NoEdrFound(String),

    /// Data plane refused or failed the pull request
    #[error("data access failed with HTTP {status}: {cause}")]
    DataAccess { status: u16, cause: String },

    /// One or more prerequisite checks failed
    #[error("prerequisites not met: {}", .failed.join(", "))]
    Prerequisites { failed: Vec<String> },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (config and log files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let excerpt: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    if excerpt.len() < trimmed.len() {
        format!(": {}...", excerpt)
    } else {
        format!(": {}", excerpt)
    }
}

fn state_suffix(state: &Option<String>) -> String {
    match state {
        Some(s) => format!(" (last state: {})", s),
        None => String::new(),
    }
}

impl DsxError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }

    /// Classify the error for reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            DsxError::Transport { .. } => ErrorKind::Transport,
            DsxError::UnexpectedStatus { .. } | DsxError::DataAccess { .. } => {
                ErrorKind::UnexpectedStatus
            }
            DsxError::InitiationFailed { source, .. } => source.kind(),
            DsxError::ProtocolTerminal { .. } => ErrorKind::ProtocolTerminalFailure,
            DsxError::MalformedResponse(_)
            | DsxError::MalformedTerminalState { .. }
            | DsxError::MalformedEdr(_)
            | DsxError::MissingPolicy(_) => ErrorKind::MalformedResponse,
            DsxError::PollTimeout { .. } => ErrorKind::PollTimeout,
            DsxError::EmptyCatalog
            | DsxError::AssetNotFound { .. }
            | DsxError::NoEdrFound(_) => ErrorKind::NotFound,
            DsxError::Prerequisites { .. } => ErrorKind::Prerequisite,
            DsxError::Config(_) | DsxError::Io(_) => ErrorKind::Configuration,
        }
    }

    /// Last remote state observed before the failure, when one is known
    pub fn last_state(&self) -> Option<&str> {
        match self {
            DsxError::PollTimeout { last_state, .. } => last_state.as_deref(),
            DsxError::ProtocolTerminal { state, .. }
            | DsxError::MalformedTerminalState { state, .. } => Some(state),
            DsxError::InitiationFailed { source, .. } => source.last_state(),
            _ => None,
        }
    }
}

/// Error taxonomy used in reports and JSON output
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    UnexpectedStatus,
    ProtocolTerminalFailure,
    MalformedResponse,
    PollTimeout,
    NotFound,
    Configuration,
    Prerequisite,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::UnexpectedStatus => "unexpected_status",
            ErrorKind::ProtocolTerminalFailure => "protocol_terminal_failure",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::PollTimeout => "poll_timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Prerequisite => "prerequisite",
        };
        write!(f, "{}", name)
    }
}

impl From<serde_json::Error> for DsxError {
    fn from(err: serde_json::Error) -> Self {
        DsxError::MalformedResponse(format!("JSON parse error: {}", err))
    }
}

impl From<PollError> for DsxError {
    fn from(err: PollError) -> Self {
        DsxError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = DsxError::AssetNotFound {
            target: "asset-3".to_string(),
            available: vec!["asset-1".to_string(), "asset-2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "asset 'asset-3' not found in catalog; available assets: [\"asset-1\", \"asset-2\"]"
        );

        let err = DsxError::PollTimeout {
            resource: "negotiation".to_string(),
            attempts: 60,
            last_state: Some("REQUESTED".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "negotiation still pending after 60 attempts (last state: REQUESTED)"
        );

        let err = DsxError::UnexpectedStatus {
            url: "http://cp/api/management/v3/catalog/request".to_string(),
            status: 500,
            body: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected HTTP 500 from http://cp/api/management/v3/catalog/request"
        );
    }

    #[test]
    fn test_body_excerpt_truncated() {
        let err = DsxError::UnexpectedStatus {
            url: "u".to_string(),
            status: 400,
            body: "x".repeat(500),
        };
        let msg = err.to_string();
        assert!(msg.ends_with("..."));
        assert!(msg.len() < 300);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            DsxError::Transport {
                url: "u".into(),
                message: "refused".into()
            }
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(DsxError::EmptyCatalog.kind(), ErrorKind::NotFound);
        assert_eq!(DsxError::NoEdrFound("t-1".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            DsxError::MissingPolicy("a".into()).kind(),
            ErrorKind::MalformedResponse
        );
        assert_eq!(
            DsxError::MalformedTerminalState {
                resource: "negotiation".into(),
                state: "FINALIZED".into(),
                field: "contractAgreementId".into()
            }
            .kind(),
            ErrorKind::MalformedResponse
        );
        assert_eq!(
            DsxError::DataAccess {
                status: 403,
                cause: "agreement validation failed".into()
            }
            .kind(),
            ErrorKind::UnexpectedStatus
        );
        assert_eq!(
            DsxError::Prerequisites { failed: vec![] }.kind(),
            ErrorKind::Prerequisite
        );
        assert_eq!(DsxError::Config("x".into()).kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_initiation_failure_takes_inner_kind() {
        let err = DsxError::InitiationFailed {
            resource: "negotiation".to_string(),
            source: Box::new(DsxError::UnexpectedStatus {
                url: "u".into(),
                status: 400,
                body: "bad policy".into(),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::UnexpectedStatus);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("bad policy"));
    }

    #[test]
    fn test_last_state() {
        let err = DsxError::ProtocolTerminal {
            resource: "transfer".into(),
            state: "TERMINATED".into(),
            reason: "transfer terminated".into(),
        };
        assert_eq!(err.last_state(), Some("TERMINATED"));
        assert_eq!(err.to_string(), "transfer failed: transfer terminated");

        let err = DsxError::PollTimeout {
            resource: "credential request".into(),
            attempts: 3,
            last_state: None,
        };
        assert_eq!(err.last_state(), None);
        assert_eq!(DsxError::EmptyCatalog.last_state(), None);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(EXIT_SUCCESS, 0);
        assert_eq!(EXIT_FAILURE, 1);
        assert_eq!(DsxError::EmptyCatalog.exit_code(), EXIT_FAILURE);
        assert_eq!(DsxError::Config("x".into()).exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not valid json")
            .expect_err("should fail to parse invalid JSON");
        let err: DsxError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(err.to_string().contains("JSON parse error"));
    }

    #[test]
    fn test_from_poll_error() {
        let err: DsxError =
            PollError::InvalidConfig("max_attempts must be at least 1".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::PollTimeout.to_string(), "poll_timeout");
        assert_eq!(
            ErrorKind::ProtocolTerminalFailure.to_string(),
            "protocol_terminal_failure"
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::NotFound).unwrap(),
            "\"not_found\""
        );
    }
}
