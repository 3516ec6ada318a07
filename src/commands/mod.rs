pub mod autounlock;
pub mod install;
pub mod plan;
pub mod status;

use clap::Args;

use privnode::config::InstallConfig;
use privnode::log_status;
use privnode::{fetch, Result};

/// Configuration flags shared by `install` and `plan`. The interactive
/// wizard lives outside this binary; these flags are its contract.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Chain to run: mainnet or testnet4
    #[arg(long, default_value = "testnet4")]
    pub network: String,

    /// Components to install: bitcoin or bitcoin+lnd
    #[arg(long, default_value = "bitcoin+lnd")]
    pub components: String,

    /// Blockchain storage budget in GB (10, 25 or 50)
    #[arg(long, default_value_t = 25)]
    pub prune: u32,

    /// Lightning P2P exposure: tor or hybrid
    #[arg(long = "p2p-mode", default_value = "tor")]
    pub p2p_mode: String,

    /// Public IPv4 to announce in hybrid mode (detected when omitted)
    #[arg(long = "public-ip")]
    pub public_ip: Option<String>,

    /// Administrative SSH port to keep open in the firewall
    #[arg(long = "ssh-port", default_value_t = 22)]
    pub ssh_port: u16,
}

impl ConfigArgs {
    /// Resolve the flags into a validated `InstallConfig`.
    ///
    /// Hybrid mode without an explicit address tries public IP detection
    /// and degrades to tor-only when nothing usable comes back, matching
    /// the conservative default over a hard failure.
    pub fn resolve(&self) -> Result<InstallConfig> {
        let mut p2p_mode = self.p2p_mode.clone();
        let mut public_ip = self.public_ip.clone();

        if p2p_mode == "hybrid" && public_ip.is_none() {
            match fetch::detect_public_ipv4() {
                Some(ip) => {
                    log_status!("install", "Detected public IPv4: {}", ip);
                    public_ip = Some(ip);
                }
                None => {
                    log_status!(
                        "install",
                        "Could not detect a public IPv4; falling back to Tor-only P2P"
                    );
                    p2p_mode = "tor".to_string();
                }
            }
        }

        InstallConfig::from_args(
            &self.network,
            &self.components,
            self.prune,
            &p2p_mode,
            public_ip,
            self.ssh_port,
        )
    }
}
