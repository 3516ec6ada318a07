//! Artifact fetcher.
//!
//! Downloads release artifacts, checksum listings and signing keys to local
//! staging paths. No retry policy of its own; callers decide whether a
//! failed download is fatal.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Generous whole-request limit; release tarballs run to ~50 MB on slow VPS links.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

fn client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(format!("privnode/{}", VERSION))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))
}

/// Download a URL to a local destination.
pub fn download(url: &str, dest: &Path) -> Result<()> {
    let client = client(DOWNLOAD_TIMEOUT)?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| Error::download_failed(url, e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::download_failed(
            url,
            format!("HTTP {}", response.status().as_u16()),
        ));
    }

    let mut out = File::create(dest).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("create {}", dest.display())),
        )
    })?;

    response
        .copy_to(&mut out)
        .map_err(|e| Error::download_failed(url, e.to_string()))?;

    Ok(())
}

/// Download where absence is tolerable (optional manifests, individual
/// signer keys under a threshold policy). Logs and reports failure instead
/// of propagating it.
pub fn download_best_effort(url: &str, dest: &Path) -> bool {
    match download(url, dest) {
        Ok(()) => true,
        Err(err) => {
            log_status!("fetch", "Skipping {}: {}", url, err);
            false
        }
    }
}

/// Fetch a small text resource (public IP detection).
pub fn fetch_text(url: &str, timeout: Duration) -> Result<String> {
    let client = client(timeout)?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| Error::download_failed(url, e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::download_failed(
            url,
            format!("HTTP {}", response.status().as_u16()),
        ));
    }

    response
        .text()
        .map(|t| t.trim().to_string())
        .map_err(|e| Error::download_failed(url, e.to_string()))
}

/// Detect the server's public IPv4, used to prefill hybrid-mode
/// configuration. Returns None rather than failing; detection is a
/// convenience, not a requirement.
pub fn detect_public_ipv4() -> Option<String> {
    let ip = fetch_text("https://ifconfig.me", Duration::from_secs(5)).ok()?;
    if crate::config::looks_like_ipv4(&ip) {
        Some(ip)
    } else {
        None
    }
}
