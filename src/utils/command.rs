//! Command execution primitives with consistent error handling.
//!
//! Every privileged operation in the provisioning pipeline runs through
//! these helpers so failures always carry the spawned command's captured
//! output as diagnostic context.

use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result};

/// Run a command and return its combined output on success.
///
/// stdout and stderr are captured separately and joined, mirroring what an
/// operator would see in a terminal. Returns an error carrying the combined
/// output if the command exits non-zero or cannot be spawned.
pub fn run(program: &str, args: &[&str], context: &str) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::command_failed(context, e.to_string()))?;

    if !output.status.success() {
        return Err(Error::command_failed(context, combined_text(&output)));
    }

    Ok(combined_text(&output))
}

/// Run a command and return its combined output together with the success
/// flag, without mapping failure to an error.
///
/// Needed where the caller parses output from commands that signal domain
/// conditions through their exit status (gpg --verify exits non-zero on a
/// bad signature but still emits the status records we parse).
pub fn run_unchecked(program: &str, args: &[&str], context: &str) -> Result<(bool, String)> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::command_failed(context, e.to_string()))?;

    Ok((output.status.success(), combined_text(&output)))
}

/// Check if a command succeeds without capturing output.
///
/// Used for idempotency probes ("does this user exist", "is this service
/// active") where failure is an answer, not an error.
pub fn succeeded(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check whether a program is resolvable on PATH.
pub fn available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Join captured stdout and stderr, trimmed.
///
/// Most system tools write progress to stdout and failures to stderr;
/// keeping both preserves the full diagnostic picture for step errors.
fn combined_text(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (false, false) => format!("{}\n{}", stdout.trim(), stderr.trim()),
        (false, true) => stdout.trim().to_string(),
        (true, false) => stderr.trim().to_string(),
        (true, true) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_succeeds_with_valid_command() {
        let result = run("echo", &["hello"], "echo test");
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn run_fails_with_invalid_command() {
        let result = run("nonexistent_command_xyz", &[], "test");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code.as_str(), "command.failed");
    }

    #[test]
    fn run_failure_captures_output() {
        let result = run("sh", &["-c", "echo diagnostic >&2; exit 1"], "failing command");
        let err = result.unwrap_err();
        assert!(err.details["output"].as_str().unwrap().contains("diagnostic"));
    }

    #[test]
    fn run_unchecked_reports_status_and_output() {
        let (ok, output) = run_unchecked("sh", &["-c", "echo partial; exit 3"], "test").unwrap();
        assert!(!ok);
        assert_eq!(output, "partial");
    }

    #[test]
    fn succeeded_probes_exit_status() {
        assert!(succeeded("true", &[]));
        assert!(!succeeded("false", &[]));
        assert!(!succeeded("nonexistent_command_xyz", &[]));
    }
}
