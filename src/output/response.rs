//! CLI response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use privnode::error::Hint;
use privnode::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) {
    use std::io::{self, Write};

    let payload = match response.to_json() {
        Ok(payload) => payload,
        Err(err) => {
            eprintln!("Failed to serialize response: {}", err);
            return;
        }
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // Exit gracefully on SIGPIPE
    let _ = writeln!(handle, "{}", payload);
}

/// Print a command result and return the process exit code.
pub fn print_result<T: Serialize>(result: Result<T>) -> i32 {
    match result {
        Ok(data) => {
            print_response(&CliResponse::success(data));
            0
        }
        Err(err) => {
            let code = exit_code_for_error(err.code);
            print_response(&CliResponse::<()>::from_error(&err));
            code
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::PreflightUnsupportedOs
        | ErrorCode::PreflightNotRoot
        | ErrorCode::PreflightAlreadyInstalled
        | ErrorCode::PreflightNotInstalled => 3,

        ErrorCode::VerifyKeyImportFailed
        | ErrorCode::VerifyFingerprintMismatch
        | ErrorCode::VerifyInsufficientSignatures
        | ErrorCode::VerifySignatureInvalid
        | ErrorCode::VerifyChecksumMismatch
        | ErrorCode::VerifyManifestMissing => 5,

        ErrorCode::CommandFailed | ErrorCode::DownloadFailed | ErrorCode::StepFailed => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_errors_map_to_trust_exit_code() {
        assert_eq!(
            exit_code_for_error(ErrorCode::VerifyFingerprintMismatch),
            5
        );
        assert_eq!(
            exit_code_for_error(ErrorCode::VerifyInsufficientSignatures),
            5
        );
    }

    #[test]
    fn step_failures_map_to_runtime_exit_code() {
        assert_eq!(exit_code_for_error(ErrorCode::StepFailed), 20);
        assert_eq!(exit_code_for_error(ErrorCode::PreflightNotRoot), 3);
        assert_eq!(exit_code_for_error(ErrorCode::ConfigInvalidValue), 2);
    }
}
