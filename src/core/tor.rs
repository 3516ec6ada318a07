//! Tor installation and configuration.
//!
//! The node reaches the outside world only through Tor: bitcoind proxies
//! all connections over the SOCKS port, and inbound access happens through
//! hidden services. LND additionally drives the control port to publish its
//! own P2P onion service.

use crate::config::InstallConfig;
use crate::error::Result;
use crate::paths;
use crate::system::SYSTEM_USER;
use crate::utils::{command, io};

pub const SOCKS_PORT: u16 = 9050;
pub const CONTROL_PORT: u16 = 9051;

/// Group that may read Tor's control auth cookie on Debian.
pub const TOR_GROUP: &str = "debian-tor";

/// Install the Tor package from the OS repositories.
pub fn install() -> Result<()> {
    command::run("apt-get", &["install", "-y", "-qq", "tor"], "install tor")?;
    Ok(())
}

/// Render the torrc for the selected components.
///
/// Bitcoin-only nodes get RPC and P2P hidden services. With LND selected,
/// the control port opens for onion management and gRPC/REST hidden
/// services are added for wallet pairing.
pub fn render_torrc(cfg: &InstallConfig) -> String {
    let params = cfg.params();
    let mut content = format!("# privnode Tor configuration\nSOCKSPort {}\n", SOCKS_PORT);

    if cfg.has_lnd() {
        content.push_str(&format!(
            "\n# Control port for LND P2P onion management\nControlPort {}\nCookieAuthentication 1\nCookieAuthFileGroupReadable 1\n",
            CONTROL_PORT
        ));
    }

    content.push_str(&format!(
        "\n# Bitcoin Core RPC (for wallet connections like Sparrow)\nHiddenServiceDir /var/lib/tor/bitcoin-rpc/\nHiddenServicePort {rpc} 127.0.0.1:{rpc}\n\n# Bitcoin Core P2P (static onion address for peers)\nHiddenServiceDir /var/lib/tor/bitcoin-p2p/\nHiddenServicePort {p2p} 127.0.0.1:{p2p}\n",
        rpc = params.rpc_port,
        p2p = params.p2p_port,
    ));

    if cfg.has_lnd() {
        content.push_str(
            "\n# LND gRPC (wallet connections over Tor)\nHiddenServiceDir /var/lib/tor/lnd-grpc/\nHiddenServicePort 10009 127.0.0.1:10009\n\n# LND REST (wallet connections over Tor)\nHiddenServiceDir /var/lib/tor/lnd-rest/\nHiddenServicePort 8080 127.0.0.1:8080\n",
        );
    }

    content
}

pub fn write_config(cfg: &InstallConfig) -> Result<()> {
    io::write_file_with_mode(&paths::torrc(), &render_torrc(cfg), 0o644, "write torrc")
}

/// Let the service user read the Tor control auth cookie.
pub fn add_user_to_tor_group(username: &str) -> Result<()> {
    command::run(
        "usermod",
        &["-aG", TOR_GROUP, username],
        "add user to tor group",
    )?;
    Ok(())
}

/// Enable and restart Tor. Restart (not start) so a fresh torrc takes
/// effect and the hidden service directories and keys get created.
pub fn restart() -> Result<()> {
    command::run("systemctl", &["enable", "tor"], "enable tor service")?;
    command::run("systemctl", &["restart", "tor"], "restart tor service")?;
    Ok(())
}

/// Group membership step wrapper with the fixed service user.
pub fn grant_cookie_access() -> Result<()> {
    add_user_to_tor_group(SYSTEM_USER)
}
