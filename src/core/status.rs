//! Node status snapshot for the `status` command.
//!
//! Read-only: service activity, Tor onion addresses, disk figures and the
//! persisted config. Rendering is left entirely to the consumer.

use serde::Serialize;

use crate::config::AppConfig;
use crate::error::Result;
use crate::paths;
use crate::utils::{command, io};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnionAddresses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitcoin_rpc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitcoin_p2p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lnd_grpc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lnd_rest: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUsage {
    pub total: String,
    pub used: String,
    pub percent: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub services: Vec<ServiceStatus>,
    pub onion: OnionAddresses,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitcoin_data_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lnd_data_size: Option<String>,
    pub config: AppConfig,
}

pub fn service_active(name: &str) -> bool {
    command::succeeded("systemctl", &["is-active", "--quiet", name])
}

/// Read a hidden-service hostname, absent until Tor has created it.
pub fn read_onion(service: &str) -> Option<String> {
    io::read_file_optional(&paths::hidden_service_hostname(service))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The onion addresses relevant for the installed component set.
pub fn onion_addresses(has_lnd: bool) -> OnionAddresses {
    OnionAddresses {
        bitcoin_rpc: read_onion("bitcoin-rpc"),
        bitcoin_p2p: read_onion("bitcoin-p2p"),
        lnd_grpc: has_lnd.then(|| read_onion("lnd-grpc")).flatten(),
        lnd_rest: has_lnd.then(|| read_onion("lnd-rest")).flatten(),
    }
}

fn disk_usage(path: &str) -> Option<DiskUsage> {
    let output = command::run(
        "df",
        &["-h", "--output=size,used,pcent", path],
        "disk usage",
    )
    .ok()?;

    let line = output.lines().nth(1)?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }
    Some(DiskUsage {
        total: fields[0].to_string(),
        used: fields[1].to_string(),
        percent: fields[2].to_string(),
    })
}

fn dir_size(path: &std::path::Path) -> Option<String> {
    let path_str = path.display().to_string();
    let output = command::run("du", &["-sh", &path_str], "directory size").ok()?;
    output.split_whitespace().next().map(|s| s.to_string())
}

/// Collect the full snapshot. Requires a provisioned node (the persisted
/// config is the anchor deciding which services to report on).
pub fn collect() -> Result<NodeStatus> {
    let config = AppConfig::load()?;

    let mut services = vec![
        ServiceStatus {
            name: "tor".to_string(),
            active: service_active("tor"),
        },
        ServiceStatus {
            name: "bitcoind".to_string(),
            active: service_active("bitcoind"),
        },
    ];
    if config.has_lnd() {
        services.push(ServiceStatus {
            name: "lnd".to_string(),
            active: service_active("lnd"),
        });
    }

    let onion = onion_addresses(config.has_lnd());

    Ok(NodeStatus {
        services,
        onion,
        disk: disk_usage("/"),
        bitcoin_data_size: dir_size(&paths::bitcoin_data_dir()),
        lnd_data_size: if config.has_lnd() {
            dir_size(&paths::lnd_data_dir())
        } else {
            None
        },
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_usage_parses_df_output() {
        // Shape check against the real df on the test host
        if let Some(usage) = disk_usage("/") {
            assert!(usage.percent.ends_with('%'));
            assert!(!usage.total.is_empty());
        }
    }

    #[test]
    fn read_onion_absent_service_is_none() {
        assert!(read_onion("privnode-no-such-service").is_none());
    }
}
