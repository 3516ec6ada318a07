//! Release verification.
//!
//! Every downloaded artifact is authenticated before it is extracted and
//! installed with root privileges. Two trust models exist:
//!
//! - Threshold multi-signer (Bitcoin Core): the checksum listing must carry
//!   valid signatures from at least 2 of 5 pinned builder keys.
//! - Single signer with degraded fallback (LND): one pinned release key; if
//!   the signed manifest cannot be fetched at all, install proceeds on a
//!   logged, checksum-less basis, but a present-and-invalid signature is
//!   always fatal.
//!
//! All checks operate on content bytes, never file names, and fingerprint
//! pinning is enforced independently of signature validity: importing a key
//! proves nothing, only matching a fingerprint known in advance does.

pub mod checksum;
pub mod gpg;

use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::io;

/// Where a signer's public key is obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Url(&'static str),
    Keyserver { server: &'static str, key_id: &'static str },
}

/// A trusted release signer. Fingerprints are hardcoded; they do not change
/// when keys are renewed, which is exactly why they are the pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    pub name: &'static str,
    pub fingerprint: &'static str,
    pub source: KeySource,
}

/// Trusted Bitcoin Core builders. Releases are accepted with signatures
/// from any 2 of these 5.
pub const BITCOIN_CORE_SIGNERS: [Signer; 5] = [
    Signer {
        name: "fanquake",
        fingerprint: "152812300785C96444D3334D17565732E08E5E41",
        source: KeySource::Url(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys/fanquake.gpg",
        ),
    },
    Signer {
        name: "guggero",
        fingerprint: "F4FC70F07310028424EFC20A8E4256593F177720",
        source: KeySource::Url(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys/guggero.gpg",
        ),
    },
    Signer {
        name: "hebasto",
        fingerprint: "E86AE73439625BBEE306AAE6B66D427F873CB1A3",
        source: KeySource::Url(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys/hebasto.gpg",
        ),
    },
    Signer {
        name: "theStack",
        fingerprint: "D1DBF2C4B96F2DEBF4C16654410108112E7EA81F",
        source: KeySource::Url(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys/theStack.gpg",
        ),
    },
    Signer {
        name: "willcl-ark",
        fingerprint: "6A8F9C266528E25AEB1D7731C2371D91CB716EA7",
        source: KeySource::Url(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys/willcl-ark.gpg",
        ),
    },
];

/// The LND release signer (roasbeef).
pub const LND_SIGNER: Signer = Signer {
    name: "roasbeef",
    fingerprint: "296212681AADF05656A2CDEE90525F7DEEE0AD86",
    source: KeySource::Url(
        "https://raw.githubusercontent.com/lightningnetwork/lnd/master/scripts/keys/roasbeef.asc",
    ),
};

/// An M-of-N trust policy over a fixed signer set.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    signers: Vec<Signer>,
    threshold: usize,
}

impl VerificationPolicy {
    /// Invariant: `1 <= threshold <= signers.len()`.
    pub fn new(signers: Vec<Signer>, threshold: usize) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::validation_invalid_argument(
                "threshold",
                "Signature threshold must be at least 1",
                Some(threshold.to_string()),
            ));
        }
        if threshold > signers.len() {
            return Err(Error::validation_invalid_argument(
                "threshold",
                format!(
                    "Threshold {} exceeds signer set size {}",
                    threshold,
                    signers.len()
                ),
                Some(threshold.to_string()),
            ));
        }
        Ok(Self { signers, threshold })
    }

    pub fn signers(&self) -> &[Signer] {
        &self.signers
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn fingerprints(&self) -> Vec<&'static str> {
        self.signers.iter().map(|s| s.fingerprint).collect()
    }

    /// Decide a threshold verification from gpg status output.
    /// Pure over the status text so every count is testable.
    pub fn evaluate(&self, status_output: &str) -> Result<usize> {
        let observed =
            gpg::count_trusted_valid_signatures(status_output, &self.fingerprints());
        if observed < self.threshold {
            return Err(Error::verify_insufficient_signatures(
                observed,
                self.threshold,
                self.signers.len(),
            ));
        }
        Ok(observed)
    }
}

pub fn bitcoin_core_policy() -> VerificationPolicy {
    VerificationPolicy::new(BITCOIN_CORE_SIGNERS.to_vec(), 2)
        .expect("static policy invariant")
}

pub fn lnd_policy() -> VerificationPolicy {
    VerificationPolicy::new(vec![LND_SIGNER], 1).expect("static policy invariant")
}

/// Import a signer's key into the keyring and enforce its fingerprint pin.
///
/// Returns Ok(false) when the key could not be fetched (the caller decides
/// whether that is tolerable), Ok(true) when imported and pinned. A key
/// that imports but does not carry the pinned fingerprint is always fatal,
/// whatever the policy: that is a substitution signal, not a fetch problem.
fn import_and_pin(signer: &Signer) -> Result<bool> {
    match signer.source {
        KeySource::Url(url) => {
            let key_file = crate::paths::staging_dir().join(format!("key-{}.asc", signer.name));
            if !crate::fetch::download_best_effort(url, &key_file) {
                return Ok(false);
            }
            let imported = gpg::import_key_file(&key_file);
            let _ = std::fs::remove_file(&key_file);
            imported.map_err(|err| Error::verify_key_import_failed(signer.name, err.message))?;
        }
        KeySource::Keyserver { server, key_id } => {
            gpg::import_from_keyserver(server, key_id)
                .map_err(|err| Error::verify_key_import_failed(signer.name, err.message))?;
        }
    }

    if !gpg::keyring_has_fingerprint(signer.fingerprint) {
        return Err(Error::verify_fingerprint_mismatch(
            signer.name,
            signer.fingerprint,
        ));
    }

    Ok(true)
}

/// Threshold verification of a detached-signed checksum listing.
///
/// 1. Import every signer key, tolerating individual fetch failures: the
///    threshold may still be met by the rest.
/// 2. Enforce the fingerprint pin for every imported key.
/// 3. Verify the detached signature and count trusted VALIDSIG records.
/// 4. Require `count >= threshold`.
///
/// The artifact checksum is NOT checked here; callers verify it against the
/// (now signature-verified) listing as an independent step.
pub fn verify_threshold_signatures(
    policy: &VerificationPolicy,
    signature: &Path,
    listing: &Path,
) -> Result<usize> {
    // Both halves of the detached signature must be on disk before any
    // keyring work starts
    for required in [listing, signature] {
        if !required.exists() {
            return Err(Error::verify_manifest_missing(
                required.display().to_string(),
            ));
        }
    }

    gpg::ensure_installed()?;

    let mut imported = 0usize;
    for signer in policy.signers() {
        match import_and_pin(signer) {
            Ok(true) => imported += 1,
            Ok(false) => {
                log_status!("verify", "Could not fetch key for {}, continuing", signer.name);
            }
            // Fingerprint mismatch or keyring failure: abort immediately
            Err(err) => return Err(err),
        }
    }

    if imported == 0 {
        return Err(Error::verify_insufficient_signatures(
            0,
            policy.threshold(),
            policy.signers().len(),
        ));
    }

    let status = gpg::verify_detached(signature, listing)?;
    let observed = policy.evaluate(&status)?;
    log_status!(
        "verify",
        "Good signatures: {} of {} required",
        observed,
        policy.threshold()
    );
    Ok(observed)
}

/// Outcome of the single-signer scheme, so callers can surface degraded
/// installs instead of silently treating them as fully verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleSignerOutcome {
    Verified,
    /// No manifest was available; signature and checksum were skipped.
    SkippedNoManifest,
}

/// Single-signer verification with best-effort fallback.
///
/// With no manifest on disk the artifact installs unverified (degraded,
/// logged). With a manifest present, the pinned signer's signature over the
/// manifest content and the artifact checksum from that manifest are both
/// mandatory.
pub fn verify_single_signer(
    signer: &Signer,
    manifest: Option<&Path>,
    signature: &Path,
    artifact: &Path,
) -> Result<SingleSignerOutcome> {
    let manifest = match manifest {
        Some(path) if path.exists() => path,
        _ => {
            log_status!(
                "verify",
                "No release manifest available; installing {} unverified",
                artifact.display()
            );
            return Ok(SingleSignerOutcome::SkippedNoManifest);
        }
    };

    gpg::ensure_installed()?;

    // Single signer set: the key itself is mandatory
    if !import_and_pin(signer)? {
        return Err(Error::verify_key_import_failed(
            signer.name,
            "key download failed",
        ));
    }

    let status = gpg::verify_detached(signature, manifest)?;
    if !gpg::has_valid_signature_from(&status, signer.fingerprint) {
        return Err(Error::verify_signature_invalid(
            manifest.display().to_string(),
            status,
        ));
    }

    let listing = io::read_file(manifest, "read release manifest")?;
    checksum::verify_file(&listing, artifact)?;

    Ok(SingleSignerOutcome::Verified)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validsig(fpr: &str) -> String {
        format!("[GNUPG:] VALIDSIG {fpr} 2025-04-14 1744640000 0 4 0 1 8 00 {fpr}\n")
    }

    #[test]
    fn policy_rejects_zero_threshold() {
        let err = VerificationPolicy::new(BITCOIN_CORE_SIGNERS.to_vec(), 0).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn policy_rejects_threshold_above_signer_count() {
        let err = VerificationPolicy::new(vec![LND_SIGNER], 2).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn threshold_two_of_five_over_all_signature_counts() {
        // Counts 0 and 1 must fail, 2 through 5 must succeed
        let policy = bitcoin_core_policy();
        for count in 0..=5usize {
            let status: String = BITCOIN_CORE_SIGNERS
                .iter()
                .take(count)
                .map(|s| validsig(s.fingerprint))
                .collect();

            let result = policy.evaluate(&status);
            if count < 2 {
                let err = result.unwrap_err();
                assert_eq!(err.code.as_str(), "verify.insufficient_signatures");
                assert_eq!(err.details["observed"], count);
                assert_eq!(err.details["required"], 2);
            } else {
                assert_eq!(result.unwrap(), count);
            }
        }
    }

    #[test]
    fn untrusted_signatures_do_not_reach_threshold() {
        let policy = bitcoin_core_policy();
        let status = format!(
            "{}{}",
            validsig("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
            validsig("BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"),
        );
        assert!(policy.evaluate(&status).is_err());
    }

    #[test]
    fn one_character_fingerprint_difference_is_not_trusted() {
        // Flip the last character of a pinned fingerprint
        let policy = bitcoin_core_policy();
        let mut near_miss = BITCOIN_CORE_SIGNERS[0].fingerprint.to_string();
        near_miss.pop();
        near_miss.push('0');

        let status = format!(
            "{}{}",
            validsig(&near_miss),
            validsig(BITCOIN_CORE_SIGNERS[1].fingerprint)
        );
        let err = policy.evaluate(&status).unwrap_err();
        assert_eq!(err.details["observed"], 1);
    }

    #[test]
    fn threshold_requires_listing_and_signature_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let policy = bitcoin_core_policy();

        let err = verify_threshold_signatures(
            &policy,
            &dir.path().join("SHA256SUMS.asc"),
            &dir.path().join("SHA256SUMS"),
        )
        .unwrap_err();
        assert_eq!(err.code.as_str(), "verify.manifest_missing");
    }

    #[test]
    fn single_signer_skips_when_manifest_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let artifact = dir.path().join("lnd.tar.gz");
        std::fs::write(&artifact, b"artifact").unwrap();

        let outcome = verify_single_signer(
            &LND_SIGNER,
            None,
            &dir.path().join("manifest.sig"),
            &artifact,
        )
        .unwrap();
        assert_eq!(outcome, SingleSignerOutcome::SkippedNoManifest);

        // A manifest path that does not exist behaves like no manifest
        let outcome = verify_single_signer(
            &LND_SIGNER,
            Some(&dir.path().join("absent.txt")),
            &dir.path().join("manifest.sig"),
            &artifact,
        )
        .unwrap();
        assert_eq!(outcome, SingleSignerOutcome::SkippedNoManifest);
    }

    #[test]
    fn pinned_fingerprints_are_forty_hex_chars() {
        for signer in BITCOIN_CORE_SIGNERS.iter().chain([&LND_SIGNER]) {
            assert_eq!(signer.fingerprint.len(), 40, "{}", signer.name);
            assert!(signer
                .fingerprint
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }
}
