//! Installation configuration.
//!
//! `InstallConfig` is the immutable value object every provisioning run is
//! built from: assembled once from CLI flags, validated, then only read.
//! `AppConfig` is the persisted record written at the end of a successful
//! run; its presence on disk is the "already provisioned" marker checked
//! once at process start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{Error, Result};
use crate::network::{NetworkParams, MAINNET, TESTNET4};
use crate::paths;

pub const PRUNE_CHOICES_GB: [u32; 3] = [10, 25, 50];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet4,
}

impl Network {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mainnet" => Some(Network::Mainnet),
            "testnet4" => Some(Network::Testnet4),
            _ => None,
        }
    }

    pub fn params(&self) -> &'static NetworkParams {
        match self {
            Network::Mainnet => &MAINNET,
            Network::Testnet4 => &TESTNET4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.params().name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Components {
    #[serde(rename = "bitcoin")]
    Bitcoin,
    #[serde(rename = "bitcoin+lnd")]
    BitcoinLnd,
}

impl Components {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bitcoin" => Some(Components::Bitcoin),
            "bitcoin+lnd" | "bitcoin-lnd" => Some(Components::BitcoinLnd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Components::Bitcoin => "bitcoin",
            Components::BitcoinLnd => "bitcoin+lnd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum P2pMode {
    Tor,
    Hybrid,
}

impl P2pMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tor" => Some(P2pMode::Tor),
            "hybrid" => Some(P2pMode::Hybrid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            P2pMode::Tor => "tor",
            P2pMode::Hybrid => "hybrid",
        }
    }
}

/// All choices made before provisioning begins. Never mutated by the
/// pipeline; step closures hold clones and only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallConfig {
    pub network: Network,
    pub components: Components,
    pub prune_gb: u32,
    pub p2p_mode: P2pMode,
    /// Set only in hybrid mode; the announced clearnet address.
    pub public_ipv4: Option<String>,
    pub ssh_port: u16,
}

impl InstallConfig {
    /// Build and validate a config from raw CLI flag values.
    pub fn from_args(
        network: &str,
        components: &str,
        prune_gb: u32,
        p2p_mode: &str,
        public_ipv4: Option<String>,
        ssh_port: u16,
    ) -> Result<Self> {
        let network = Network::parse(network).ok_or_else(|| {
            Error::validation_invalid_argument(
                "network",
                "Expected 'mainnet' or 'testnet4'",
                Some(network.to_string()),
            )
        })?;

        let components = Components::parse(components).ok_or_else(|| {
            Error::validation_invalid_argument(
                "components",
                "Expected 'bitcoin' or 'bitcoin+lnd'",
                Some(components.to_string()),
            )
        })?;

        let p2p_mode = P2pMode::parse(p2p_mode).ok_or_else(|| {
            Error::validation_invalid_argument(
                "p2p-mode",
                "Expected 'tor' or 'hybrid'",
                Some(p2p_mode.to_string()),
            )
        })?;

        let cfg = Self {
            network,
            components,
            prune_gb,
            p2p_mode,
            public_ipv4,
            ssh_port,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !PRUNE_CHOICES_GB.contains(&self.prune_gb) {
            return Err(Error::config_invalid_value(
                "prune",
                Some(self.prune_gb.to_string()),
                "Supported prune sizes are 10, 25 and 50 GB",
            ));
        }

        if self.ssh_port == 0 {
            return Err(Error::config_invalid_value(
                "ssh-port",
                Some(self.ssh_port.to_string()),
                "SSH port must be between 1 and 65535",
            ));
        }

        // Hybrid exposure only applies to the Lightning component
        if self.p2p_mode == P2pMode::Hybrid && self.components == Components::Bitcoin {
            return Err(Error::config_invalid_value(
                "p2p-mode",
                Some("hybrid".to_string()),
                "Hybrid P2P mode requires the bitcoin+lnd component selection",
            ));
        }

        if self.p2p_mode == P2pMode::Hybrid {
            match &self.public_ipv4 {
                Some(ip) if looks_like_ipv4(ip) => {}
                Some(ip) => {
                    return Err(Error::config_invalid_value(
                        "public-ip",
                        Some(ip.clone()),
                        "Not a valid IPv4 address",
                    ));
                }
                None => {
                    return Err(Error::config_invalid_value(
                        "public-ip",
                        None,
                        "Hybrid P2P mode requires a public IPv4 address",
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn has_lnd(&self) -> bool {
        self.components == Components::BitcoinLnd
    }

    pub fn params(&self) -> &'static NetworkParams {
        self.network.params()
    }
}

/// Loose shape check; real validation is the daemon binding the address.
pub fn looks_like_ipv4(value: &str) -> bool {
    let octets: Vec<&str> = value.split('.').collect();
    octets.len() == 4 && octets.iter().all(|o| o.parse::<u8>().is_ok())
}

/// Persisted node configuration, written once at the end of a successful
/// install and read on every later invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub network: Network,
    pub components: Components,
    pub prune_gb: u32,
    pub p2p_mode: P2pMode,
    pub ssh_port: u16,
    #[serde(default)]
    pub auto_unlock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

impl AppConfig {
    pub fn from_install(cfg: &InstallConfig) -> Self {
        Self {
            network: cfg.network,
            components: cfg.components,
            prune_gb: cfg.prune_gb,
            p2p_mode: cfg.p2p_mode,
            ssh_port: cfg.ssh_port,
            auto_unlock: false,
            installed_at: Some(Utc::now()),
        }
    }

    pub fn has_lnd(&self) -> bool {
        self.components == Components::BitcoinLnd
    }

    pub fn load() -> Result<Self> {
        let path = paths::app_config();
        let content = crate::utils::io::read_file(&path, "read app config")?;
        serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
    }

    pub fn save(&self) -> Result<()> {
        let dir = paths::config_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::internal_io(e.to_string(), Some("create config dir".to_string())))?;

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize app config".to_string())))?;

        crate::utils::io::write_file_atomic(&paths::app_config(), &content, "write app config")
    }
}

/// First-run check: the node needs provisioning until the app config
/// written at the end of a successful run exists.
pub fn needs_install() -> bool {
    !paths::app_config().exists()
}

/// Location of the persisted config, for user-facing messages.
pub fn config_path() -> std::path::PathBuf {
    paths::app_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> InstallConfig {
        InstallConfig::from_args("testnet4", "bitcoin", 25, "tor", None, 22).unwrap()
    }

    #[test]
    fn from_args_accepts_valid_choices() {
        let cfg = base_config();
        assert_eq!(cfg.network, Network::Testnet4);
        assert_eq!(cfg.components, Components::Bitcoin);
        assert_eq!(cfg.prune_gb, 25);
        assert!(!cfg.has_lnd());
    }

    #[test]
    fn from_args_rejects_unknown_network() {
        let result = InstallConfig::from_args("signet", "bitcoin", 25, "tor", None, 22);
        assert_eq!(
            result.unwrap_err().code.as_str(),
            "validation.invalid_argument"
        );
    }

    #[test]
    fn from_args_rejects_unsupported_prune_size() {
        let result = InstallConfig::from_args("mainnet", "bitcoin", 30, "tor", None, 22);
        assert_eq!(result.unwrap_err().code.as_str(), "config.invalid_value");
    }

    #[test]
    fn hybrid_requires_lnd_and_public_ip() {
        let without_lnd =
            InstallConfig::from_args("mainnet", "bitcoin", 25, "hybrid", None, 22);
        assert!(without_lnd.is_err());

        let without_ip =
            InstallConfig::from_args("mainnet", "bitcoin+lnd", 25, "hybrid", None, 22);
        assert!(without_ip.is_err());

        let valid = InstallConfig::from_args(
            "mainnet",
            "bitcoin+lnd",
            25,
            "hybrid",
            Some("203.0.113.7".to_string()),
            22,
        );
        assert!(valid.is_ok());
    }

    #[test]
    fn hybrid_rejects_malformed_ip() {
        let result = InstallConfig::from_args(
            "mainnet",
            "bitcoin+lnd",
            25,
            "hybrid",
            Some("203.0.113".to_string()),
            22,
        );
        assert_eq!(result.unwrap_err().code.as_str(), "config.invalid_value");
    }

    #[test]
    fn components_parse_accepts_cli_friendly_spelling() {
        assert_eq!(Components::parse("bitcoin-lnd"), Some(Components::BitcoinLnd));
        assert_eq!(Components::parse("bitcoin+lnd"), Some(Components::BitcoinLnd));
    }

    #[test]
    fn app_config_round_trips_through_json() {
        let cfg = InstallConfig::from_args(
            "mainnet",
            "bitcoin+lnd",
            50,
            "hybrid",
            Some("198.51.100.4".to_string()),
            2222,
        )
        .unwrap();
        let app = AppConfig::from_install(&cfg);

        let json = serde_json::to_string(&app).unwrap();
        assert!(json.contains("\"bitcoin+lnd\""));
        assert!(json.contains("\"mainnet\""));

        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, app);
    }

    #[test]
    fn app_config_defaults_auto_unlock_when_absent() {
        let json = r#"{
            "network": "testnet4",
            "components": "bitcoin",
            "prune_gb": 25,
            "p2p_mode": "tor",
            "ssh_port": 22
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert!(!cfg.auto_unlock);
        assert!(cfg.installed_at.is_none());
    }

    #[test]
    fn looks_like_ipv4_shape_check() {
        assert!(looks_like_ipv4("1.2.3.4"));
        assert!(!looks_like_ipv4("1.2.3"));
        assert!(!looks_like_ipv4("1.2.3.999"));
        assert!(!looks_like_ipv4("example.com"));
    }
}
