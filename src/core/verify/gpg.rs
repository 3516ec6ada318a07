//! GPG keyring operations and machine-readable status parsing.
//!
//! All signature decisions are made from `--status-fd` records, never from
//! gpg's human-readable output. A VALIDSIG record carries the signing (sub)key
//! fingerprint and, as its final field, the primary key fingerprint; trusted
//! signers are matched against both so key rotation to a signing subkey does
//! not break pinning.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use crate::error::Result;
use crate::utils::command;

/// Make sure gpg is present; install gnupg from the OS repos if not.
pub fn ensure_installed() -> Result<()> {
    if command::available("gpg") {
        return Ok(());
    }
    command::run(
        "apt-get",
        &["install", "-y", "-qq", "gnupg"],
        "install gnupg",
    )?;
    Ok(())
}

/// Import a key file into the local keyring.
pub fn import_key_file(path: &Path) -> Result<String> {
    let path_str = path.display().to_string();
    command::run(
        "gpg",
        &["--batch", "--import", &path_str],
        "gpg key import",
    )
}

/// Import a key from a keyserver by key id.
pub fn import_from_keyserver(keyserver: &str, key_id: &str) -> Result<String> {
    command::run(
        "gpg",
        &["--batch", "--keyserver", keyserver, "--recv-keys", key_id],
        "gpg keyserver import",
    )
}

/// Check whether a key with the given fingerprint exists in the keyring.
///
/// Listing is keyed by the pinned fingerprint itself, so a substituted key
/// imported under the same name never satisfies this check.
pub fn keyring_has_fingerprint(fingerprint: &str) -> bool {
    match command::run_unchecked(
        "gpg",
        &["--batch", "--list-keys", "--with-colons", fingerprint],
        "gpg list keys",
    ) {
        Ok((true, output)) => output.contains(fingerprint),
        _ => false,
    }
}

/// Run a detached-signature verification and return the raw status output.
///
/// gpg exits non-zero when no valid signature is found; the caller decides
/// what the status records mean, so the exit code is folded into the result
/// only when gpg could not run at all.
pub fn verify_detached(signature: &Path, content: &Path) -> Result<String> {
    let sig = signature.display().to_string();
    let doc = content.display().to_string();
    let (_ok, output) = command::run_unchecked(
        "gpg",
        &["--batch", "--verify", "--status-fd", "1", &sig, &doc],
        "gpg verify",
    )?;
    Ok(output)
}

/// Fingerprints (signing key and primary key) from every VALIDSIG record.
pub fn valid_signature_fingerprints(status_output: &str) -> HashSet<String> {
    // [GNUPG:] VALIDSIG <fpr> <date> <ts> ... <primary-fpr>
    let line_re = Regex::new(r"(?m)^\[GNUPG:\] VALIDSIG (.+)$").expect("static regex");
    let fpr_re = Regex::new(r"\b[0-9A-F]{40}\b").expect("static regex");

    let mut fingerprints = HashSet::new();
    for line in line_re.captures_iter(status_output) {
        for fpr in fpr_re.find_iter(&line[1]) {
            fingerprints.insert(fpr.as_str().to_string());
        }
    }
    fingerprints
}

/// Count how many of the trusted fingerprints produced a valid signature.
pub fn count_trusted_valid_signatures(status_output: &str, trusted: &[&str]) -> usize {
    let observed = valid_signature_fingerprints(status_output);
    trusted.iter().filter(|f| observed.contains(**f)).count()
}

/// True when the status output contains a valid signature from exactly the
/// given fingerprint.
pub fn has_valid_signature_from(status_output: &str, fingerprint: &str) -> bool {
    valid_signature_fingerprints(status_output).contains(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPR_A: &str = "152812300785C96444D3334D17565732E08E5E41";
    const FPR_B: &str = "F4FC70F07310028424EFC20A8E4256593F177720";
    const FPR_C: &str = "E86AE73439625BBEE306AAE6B66D427F873CB1A3";

    fn validsig_line(fpr: &str) -> String {
        format!(
            "[GNUPG:] VALIDSIG {fpr} 2025-04-14 1744640000 0 4 0 1 8 00 {fpr}\n"
        )
    }

    #[test]
    fn parses_validsig_fingerprints() {
        let output = format!(
            "[GNUPG:] NEWSIG\n[GNUPG:] GOODSIG 17565732E08E5E41 builder <a@b.c>\n{}",
            validsig_line(FPR_A)
        );
        let fprs = valid_signature_fingerprints(&output);
        assert!(fprs.contains(FPR_A));
        assert_eq!(fprs.len(), 1);
    }

    #[test]
    fn subkey_signature_matches_primary_fingerprint() {
        // Signing subkey fingerprint differs; the primary fpr is the last field
        let subkey = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let output = format!(
            "[GNUPG:] VALIDSIG {subkey} 2025-04-14 1744640000 0 4 0 1 8 00 {FPR_B}\n"
        );
        assert!(has_valid_signature_from(&output, FPR_B));
    }

    #[test]
    fn counts_only_trusted_fingerprints() {
        let untrusted = "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
        let output = format!(
            "{}{}{}",
            validsig_line(FPR_A),
            validsig_line(FPR_C),
            validsig_line(untrusted)
        );
        let trusted = [FPR_A, FPR_B, FPR_C];
        assert_eq!(count_trusted_valid_signatures(&output, &trusted), 2);
    }

    #[test]
    fn duplicate_records_count_once() {
        let output = format!("{}{}", validsig_line(FPR_A), validsig_line(FPR_A));
        assert_eq!(count_trusted_valid_signatures(&output, &[FPR_A]), 1);
    }

    #[test]
    fn badsig_contributes_nothing() {
        let output = "[GNUPG:] BADSIG 17565732E08E5E41 builder <a@b.c>\n";
        assert_eq!(count_trusted_valid_signatures(output, &[FPR_A]), 0);
    }

    #[test]
    fn mentioning_a_fingerprint_without_validsig_does_not_count() {
        // A fingerprint appearing in unrelated records must not be treated
        // as a good signature
        let output = format!("[GNUPG:] ERRSIG {} 1 8 00 1744640000 9 -\n", FPR_A);
        assert_eq!(count_trusted_valid_signatures(&output, &[FPR_A]), 0);
    }
}
