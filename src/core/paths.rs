//! Fixed filesystem layout for the provisioned node.
//!
//! Config lives under /etc, data under /var/lib, binaries in
//! /usr/local/bin. Transient downloads stage under /tmp and are removed
//! after a successful install.

use std::path::PathBuf;

/// privnode's own config directory
pub fn config_dir() -> PathBuf {
    PathBuf::from("/etc/privnode")
}

/// Persisted app config; its presence marks the node as provisioned
pub fn app_config() -> PathBuf {
    config_dir().join("config.json")
}

/// Bitcoin Core config directory (root:bitcoin, 0750)
pub fn bitcoin_config_dir() -> PathBuf {
    PathBuf::from("/etc/bitcoin")
}

pub fn bitcoin_conf() -> PathBuf {
    bitcoin_config_dir().join("bitcoin.conf")
}

/// Bitcoin Core data directory (bitcoin:bitcoin, 0750)
pub fn bitcoin_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/bitcoin")
}

/// LND config directory (root:bitcoin, 0750)
pub fn lnd_config_dir() -> PathBuf {
    PathBuf::from("/etc/lnd")
}

pub fn lnd_conf() -> PathBuf {
    lnd_config_dir().join("lnd.conf")
}

/// LND data directory (bitcoin:bitcoin, 0750)
pub fn lnd_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/lnd")
}

/// The one password-at-rest file, written only for wallet auto-unlock
pub fn wallet_password_file() -> PathBuf {
    lnd_data_dir().join("wallet_password")
}

pub fn torrc() -> PathBuf {
    PathBuf::from("/etc/tor/torrc")
}

/// Tor hidden-service hostname file for a service directory name
/// (bitcoin-rpc, bitcoin-p2p, lnd-grpc, lnd-rest)
pub fn hidden_service_hostname(service: &str) -> PathBuf {
    PathBuf::from("/var/lib/tor").join(service).join("hostname")
}

pub fn systemd_unit(name: &str) -> PathBuf {
    PathBuf::from("/etc/systemd/system").join(format!("{}.service", name))
}

pub fn sysctl_dropin() -> PathBuf {
    PathBuf::from("/etc/sysctl.d/99-disable-ipv6.conf")
}

pub fn ufw_defaults() -> PathBuf {
    PathBuf::from("/etc/default/ufw")
}

/// Final install location for node binaries
pub fn install_bin_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin")
}

/// Staging area for downloads and extraction.
/// Left in place when a run aborts so the operator can inspect artifacts.
pub fn staging_dir() -> PathBuf {
    PathBuf::from("/tmp")
}
