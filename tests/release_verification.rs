//! Trust-model scenarios that do not need a live GPG keyring: signature
//! counting over simulated status output, and the independence of the
//! checksum check from the signature result.

use std::fs;

use privnode::verify::{bitcoin_core_policy, checksum, lnd_policy, BITCOIN_CORE_SIGNERS};

fn validsig(fingerprint: &str) -> String {
    format!(
        "[GNUPG:] NEWSIG\n[GNUPG:] GOODSIG {short} builder <builder@example.org>\n[GNUPG:] VALIDSIG {fpr} 2025-04-14 1744640000 0 4 0 1 8 00 {fpr}\n",
        short = &fingerprint[24..],
        fpr = fingerprint,
    )
}

#[test]
fn two_of_five_signatures_satisfy_the_bitcoin_policy() {
    let policy = bitcoin_core_policy();
    let status = format!(
        "{}{}",
        validsig(BITCOIN_CORE_SIGNERS[1].fingerprint),
        validsig(BITCOIN_CORE_SIGNERS[4].fingerprint),
    );
    assert_eq!(policy.evaluate(&status).unwrap(), 2);
}

#[test]
fn one_signature_fails_the_bitcoin_policy_with_counts() {
    let policy = bitcoin_core_policy();
    let status = validsig(BITCOIN_CORE_SIGNERS[0].fingerprint);
    let err = policy.evaluate(&status).unwrap_err();

    assert_eq!(err.code.as_str(), "verify.insufficient_signatures");
    assert_eq!(err.details["observed"], 1);
    assert_eq!(err.details["required"], 2);
    assert_eq!(err.details["signerCount"], 5);
}

#[test]
fn checksum_failure_is_independent_of_a_satisfied_signature_threshold() {
    // Signature side passes with 3 of 5
    let policy = bitcoin_core_policy();
    let status: String = BITCOIN_CORE_SIGNERS
        .iter()
        .take(3)
        .map(|s| validsig(s.fingerprint))
        .collect();
    assert_eq!(policy.evaluate(&status).unwrap(), 3);

    // Checksum side still fails against a corrupted listing
    let dir = tempfile::TempDir::new().unwrap();
    let artifact = dir.path().join("bitcoin-29.2-x86_64-linux-gnu.tar.gz");
    fs::write(&artifact, b"tarball bytes").unwrap();

    let corrupted =
        "1111111111111111111111111111111111111111111111111111111111111111  bitcoin-29.2-x86_64-linux-gnu.tar.gz\n";
    let err = checksum::verify_file(corrupted, &artifact).unwrap_err();
    assert_eq!(err.code.as_str(), "verify.checksum_mismatch");
}

#[test]
fn checksum_accepts_artifact_matching_signed_listing() {
    let dir = tempfile::TempDir::new().unwrap();
    let artifact = dir.path().join("release.tar.gz");
    fs::write(&artifact, b"release bytes").unwrap();

    let digest = checksum::sha256_file(&artifact).unwrap();
    let listing = format!("{}  release.tar.gz\n", digest);
    assert!(checksum::verify_file(&listing, &artifact).is_ok());
}

#[test]
fn lnd_policy_is_single_signer_threshold_one() {
    let policy = lnd_policy();
    assert_eq!(policy.threshold(), 1);
    assert_eq!(policy.signers().len(), 1);

    let status = validsig(policy.signers()[0].fingerprint);
    assert_eq!(policy.evaluate(&status).unwrap(), 1);

    let err = policy.evaluate("[GNUPG:] NODATA 1\n").unwrap_err();
    assert_eq!(err.details["observed"], 0);
}
