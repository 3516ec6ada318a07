use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    PreflightUnsupportedOs,
    PreflightNotRoot,
    PreflightAlreadyInstalled,
    PreflightNotInstalled,

    CommandFailed,
    DownloadFailed,

    VerifyKeyImportFailed,
    VerifyFingerprintMismatch,
    VerifyInsufficientSignatures,
    VerifySignatureInvalid,
    VerifyChecksumMismatch,
    VerifyManifestMissing,

    StepFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::PreflightUnsupportedOs => "preflight.unsupported_os",
            ErrorCode::PreflightNotRoot => "preflight.not_root",
            ErrorCode::PreflightAlreadyInstalled => "preflight.already_installed",
            ErrorCode::PreflightNotInstalled => "preflight.not_installed",

            ErrorCode::CommandFailed => "command.failed",
            ErrorCode::DownloadFailed => "download.failed",

            ErrorCode::VerifyKeyImportFailed => "verify.key_import_failed",
            ErrorCode::VerifyFingerprintMismatch => "verify.fingerprint_mismatch",
            ErrorCode::VerifyInsufficientSignatures => "verify.insufficient_signatures",
            ErrorCode::VerifySignatureInvalid => "verify.signature_invalid",
            ErrorCode::VerifyChecksumMismatch => "verify.checksum_mismatch",
            ErrorCode::VerifyManifestMissing => "verify.manifest_missing",

            ErrorCode::StepFailed => "step.failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub context: String,
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFailedDetails {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintMismatchDetails {
    pub signer: String,
    pub expected_fingerprint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsufficientSignaturesDetails {
    pub observed: usize,
    pub required: usize,
    pub signer_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumMismatchDetails {
    pub file: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailedDetails {
    pub step: String,
    pub index: usize,
    pub cause_code: String,
    pub cause: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    fn with_details<D: Serialize>(code: ErrorCode, message: impl Into<String>, details: D) -> Self {
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(code, message, details)
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            InvalidArgumentDetails {
                field: field.into(),
                problem: problem.into(),
                value,
            },
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            InvalidArgumentDetails {
                field: key.into(),
                problem: problem.into(),
                value,
            },
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            serde_json::json!({ "path": path.into(), "error": err.to_string() }),
        )
    }

    pub fn preflight_unsupported_os(problem: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PreflightUnsupportedOs,
            problem,
            Value::Object(serde_json::Map::new()),
        )
        .with_hint("privnode targets Debian 12 or newer")
    }

    pub fn preflight_not_root() -> Self {
        Self::new(
            ErrorCode::PreflightNotRoot,
            "Provisioning must run as root",
            Value::Object(serde_json::Map::new()),
        )
        .with_hint("Run with: sudo privnode install ...")
    }

    pub fn preflight_already_installed(config_path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PreflightAlreadyInstalled,
            "Node is already provisioned",
            serde_json::json!({ "configPath": config_path.into() }),
        )
        .with_hint("Remove the config file to force a re-install")
    }

    pub fn preflight_not_installed() -> Self {
        Self::new(
            ErrorCode::PreflightNotInstalled,
            "Node has not been provisioned yet",
            Value::Object(serde_json::Map::new()),
        )
        .with_hint("Run 'privnode install' first")
    }

    /// A spawned command exited non-zero or could not be spawned.
    /// `output` carries the captured combined output as diagnostic context.
    pub fn command_failed(context: impl Into<String>, output: impl Into<String>) -> Self {
        let context = context.into();
        let output = output.into();
        Self::with_details(
            ErrorCode::CommandFailed,
            format!("{} failed", context),
            CommandFailedDetails { context, output },
        )
    }

    pub fn download_failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        let url = url.into();
        Self::with_details(
            ErrorCode::DownloadFailed,
            format!("Download failed: {}", url),
            DownloadFailedDetails {
                url,
                error: error.into(),
            },
        )
    }

    pub fn verify_key_import_failed(signer: impl Into<String>, error: impl Into<String>) -> Self {
        let signer = signer.into();
        Self::new(
            ErrorCode::VerifyKeyImportFailed,
            format!("Could not import signing key for {}", signer),
            serde_json::json!({ "signer": signer, "error": error.into() }),
        )
    }

    pub fn verify_fingerprint_mismatch(
        signer: impl Into<String>,
        expected_fingerprint: impl Into<String>,
    ) -> Self {
        let signer = signer.into();
        Self::with_details(
            ErrorCode::VerifyFingerprintMismatch,
            format!("Key fingerprint mismatch for {}", signer),
            FingerprintMismatchDetails {
                signer,
                expected_fingerprint: expected_fingerprint.into(),
            },
        )
        .with_hint("This may indicate a substituted key. Do not retry; investigate the key source.")
    }

    pub fn verify_insufficient_signatures(
        observed: usize,
        required: usize,
        signer_count: usize,
    ) -> Self {
        Self::with_details(
            ErrorCode::VerifyInsufficientSignatures,
            format!(
                "Insufficient valid signatures: got {}, need {}",
                observed, required
            ),
            InsufficientSignaturesDetails {
                observed,
                required,
                signer_count,
            },
        )
    }

    pub fn verify_signature_invalid(subject: impl Into<String>, output: impl Into<String>) -> Self {
        let subject = subject.into();
        Self::new(
            ErrorCode::VerifySignatureInvalid,
            format!("Signature verification failed for {}", subject),
            serde_json::json!({ "subject": subject, "output": output.into() }),
        )
    }

    pub fn verify_checksum_mismatch(
        file: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let file = file.into();
        Self::with_details(
            ErrorCode::VerifyChecksumMismatch,
            format!("Checksum mismatch for {}", file),
            ChecksumMismatchDetails {
                file,
                expected: expected.into(),
                actual: actual.into(),
            },
        )
    }

    pub fn verify_manifest_missing(file: impl Into<String>) -> Self {
        let file = file.into();
        Self::new(
            ErrorCode::VerifyManifestMissing,
            format!("Checksum manifest not found: {}", file),
            serde_json::json!({ "file": file }),
        )
    }

    /// Wrap a lower-level error with the failing step's name and position.
    /// The pipeline attaches context only; it never reinterprets the cause.
    pub fn step_failed(step: impl Into<String>, index: usize, cause: Error) -> Self {
        let step = step.into();
        let mut wrapped = Self::with_details(
            ErrorCode::StepFailed,
            format!("Step '{}' failed: {}", step, cause.message),
            StepFailedDetails {
                step,
                index,
                cause_code: cause.code.as_str().to_string(),
                cause: cause.details,
            },
        );
        wrapped.hints = cause.hints;
        wrapped
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
