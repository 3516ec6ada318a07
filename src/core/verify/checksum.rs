//! Checksum listing parsing and in-process SHA-256 hashing.
//!
//! Listings use the coreutils `sha256sum` format: one `<hex>  <filename>`
//! entry per line (a `*` before the filename marks binary mode). Lookup is
//! by file name only; the artifact's staged location is irrelevant.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Parse a checksum listing into (hex digest, file name) pairs.
/// Malformed lines are skipped; signed listings carry armor headers and
/// blank lines around the entries.
pub fn parse_listing(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (digest, name) = line.split_once(char::is_whitespace)?;
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let name = name.trim_start().trim_start_matches('*');
            if name.is_empty() {
                return None;
            }
            Some((digest.to_ascii_lowercase(), name.to_string()))
        })
        .collect()
}

/// Expected digest for a file name, if the listing has an entry for it.
pub fn expected_digest(content: &str, file_name: &str) -> Option<String> {
    parse_listing(content)
        .into_iter()
        .find(|(_, name)| name == file_name)
        .map(|(digest, _)| digest)
}

/// SHA-256 of a file's contents, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("open {}", path.display())))
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify a staged artifact against a checksum listing.
///
/// The listing is matched by the artifact's file name; entries for other
/// release files in the same listing are ignored. A file with no entry is
/// as fatal as a mismatch: trust cannot be established either way.
pub fn verify_file(listing: &str, artifact: &Path) -> Result<()> {
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            Error::internal_io(
                format!("Invalid artifact path: {}", artifact.display()),
                Some("checksum verify".to_string()),
            )
        })?;

    let expected = expected_digest(listing, &file_name).ok_or_else(|| {
        Error::verify_checksum_mismatch(&file_name, "<no entry in listing>", "<unknown>")
    })?;

    let actual = sha256_file(artifact)?;
    if actual != expected {
        return Err(Error::verify_checksum_mismatch(&file_name, expected, actual));
    }

    Ok(())
}
