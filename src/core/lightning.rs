//! LND: single-signer-verified install, configuration, service,
//! wallet auto-unlock and readiness probing.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{InstallConfig, P2pMode};
use crate::error::{Error, Result};
use crate::paths;
use crate::system::{LND_P2P_PORT, SYSTEM_USER};
use crate::utils::{command, io};
use crate::verify;

pub const VERSION: &str = "0.20.0-beta";

pub const GRPC_PORT: u16 = 10009;
pub const REST_PORT: u16 = 8080;

const RELEASE_BASE: &str = "https://github.com/lightningnetwork/lnd/releases/download";

fn tarball_name() -> String {
    format!("lnd-linux-amd64-v{}.tar.gz", VERSION)
}

fn release_url(file: &str) -> String {
    format!("{}/v{}/{}", RELEASE_BASE, VERSION, file)
}

fn staged_tarball() -> PathBuf {
    paths::staging_dir().join(tarball_name())
}

fn staged_manifest() -> PathBuf {
    paths::staging_dir().join(format!("manifest-v{}.txt", VERSION))
}

fn staged_manifest_sig() -> PathBuf {
    paths::staging_dir().join(format!("manifest-roasbeef-v{}.sig", VERSION))
}

/// Fetch the LND release tarball plus, best-effort, the signed manifest.
/// A missing manifest downgrades verification instead of failing the run.
pub fn download_release() -> Result<()> {
    log_status!("install", "Downloading LND {}", VERSION);
    crate::fetch::download(&release_url(&tarball_name()), &staged_tarball())?;

    let manifest_url = release_url(&format!("manifest-v{}.txt", VERSION));
    crate::fetch::download_best_effort(&manifest_url, &staged_manifest());
    Ok(())
}

/// Verify the staged release under the single-signer policy.
///
/// The detached signature covers the manifest content, not its filename;
/// whatever the manifest was saved as locally, the bytes decide. With no
/// manifest on disk this degrades to an unverified install (logged).
pub fn verify_release() -> Result<verify::SingleSignerOutcome> {
    let manifest = staged_manifest();
    if !manifest.exists() {
        return verify::verify_single_signer(
            &verify::LND_SIGNER,
            None,
            &staged_manifest_sig(),
            &staged_tarball(),
        );
    }

    // The signature file only exists on the release server; fetch it now
    // that we know there is a manifest to check it against.
    let sig_url = release_url(&format!("manifest-roasbeef-v{}.sig", VERSION));
    crate::fetch::download(&sig_url, &staged_manifest_sig())?;

    verify::verify_single_signer(
        &verify::LND_SIGNER,
        Some(&manifest),
        &staged_manifest_sig(),
        &staged_tarball(),
    )
}

/// Extract and place the lnd and lncli binaries, then clear staging state.
pub fn install_binaries() -> Result<()> {
    let staging = paths::staging_dir();
    let tarball = staged_tarball();
    let tarball_str = tarball.display().to_string();
    let staging_str = staging.display().to_string();

    command::run(
        "tar",
        &["-xzf", &tarball_str, "-C", &staging_str],
        "extract lnd tarball",
    )?;

    let extract_dir = staging.join(format!("lnd-linux-amd64-v{}", VERSION));
    let dest = paths::install_bin_dir().display().to_string();
    for bin in ["lnd", "lncli"] {
        let src = extract_dir.join(bin).display().to_string();
        command::run(
            "install",
            &["-m", "0755", "-o", "root", "-g", "root", &src, &dest],
            "install lnd binary",
        )?;
    }

    let _ = fs::remove_file(&tarball);
    let _ = fs::remove_file(staged_manifest());
    let _ = fs::remove_file(staged_manifest_sig());
    let _ = fs::remove_dir_all(&extract_dir);

    Ok(())
}

/// Render lnd.conf from the run configuration.
///
/// Tor-only nodes listen on localhost; hybrid nodes bind the P2P port on
/// all interfaces and announce the configured clearnet address alongside
/// the onion service.
pub fn render_config(cfg: &InstallConfig) -> String {
    let params = cfg.params();

    let rest_onion = io::read_file_optional(&paths::hidden_service_hostname("lnd-rest"))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let (listen_line, external_line) = match (&cfg.p2p_mode, &cfg.public_ipv4) {
        (P2pMode::Hybrid, Some(ip)) => (
            format!("listen=0.0.0.0:{}", LND_P2P_PORT),
            format!("externalhosts={}:{}\n", ip, LND_P2P_PORT),
        ),
        _ => (format!("listen=localhost:{}", LND_P2P_PORT), String::new()),
    };

    let tls_extra_domain = if rest_onion.is_empty() {
        String::new()
    } else {
        format!("tlsextradomain={}\n", rest_onion)
    };

    let cookie_path = format!("/var/lib/bitcoin/{}", params.cookie_path);

    format!(
        "\
# privnode LND configuration
#
# Network: {name}
# P2P:     {p2p}

[Application Options]
lnddir=/var/lib/lnd
{listen}
rpclisten=localhost:{grpc}
restlisten=localhost:{rest}
debuglevel=info
{external}{tls_extra}
[Bitcoin]
bitcoin.active=true
{chain_flag}
bitcoin.node=bitcoind

[Bitcoind]
bitcoind.dir=/var/lib/bitcoin
bitcoind.config=/etc/bitcoin/bitcoin.conf
bitcoind.rpccookie={cookie}
bitcoind.rpchost=127.0.0.1:{rpc}
bitcoind.zmqpubrawblock=tcp://127.0.0.1:{zmq_block}
bitcoind.zmqpubrawtx=tcp://127.0.0.1:{zmq_tx}

[Tor]
tor.active=true
tor.socks=127.0.0.1:{socks}
tor.control=127.0.0.1:{control}
tor.targetipaddress=127.0.0.1
tor.v3=true
tor.streamisolation=true
",
        name = params.name,
        p2p = cfg.p2p_mode.as_str(),
        listen = listen_line,
        grpc = GRPC_PORT,
        rest = REST_PORT,
        external = external_line,
        tls_extra = tls_extra_domain,
        chain_flag = params.lnd_chain_flag,
        cookie = cookie_path,
        rpc = params.rpc_port,
        zmq_block = params.zmq_block_port,
        zmq_tx = params.zmq_tx_port,
        socks = crate::tor::SOCKS_PORT,
        control = crate::tor::CONTROL_PORT,
    )
}

pub fn write_config(cfg: &InstallConfig) -> Result<()> {
    let path = paths::lnd_conf();
    io::write_file_with_mode(&path, &render_config(cfg), 0o640, "write lnd.conf")?;

    let path_str = path.display().to_string();
    let owner = format!("root:{}", SYSTEM_USER);
    command::run("chown", &[&owner, &path_str], "chown lnd.conf")?;
    Ok(())
}

fn render_service_unit(username: &str, unlock_password_file: Option<&str>) -> String {
    let exec = match unlock_password_file {
        Some(file) => format!(
            "/usr/local/bin/lnd --configfile=/etc/lnd/lnd.conf --wallet-unlock-password-file={}",
            file
        ),
        None => "/usr/local/bin/lnd --configfile=/etc/lnd/lnd.conf".to_string(),
    };

    format!(
        "\
[Unit]
Description=LND Lightning Network Daemon
After=bitcoind.service tor.service
Wants=bitcoind.service

[Service]
Type=simple
User={user}
Group={user}
ExecStart={exec}
Restart=on-failure
RestartSec=30
TimeoutStopSec=300
PrivateTmp=true
ProtectSystem=full
NoNewPrivileges=true

[Install]
WantedBy=multi-user.target
",
        user = username,
        exec = exec,
    )
}

pub fn write_service_unit() -> Result<()> {
    io::write_file_with_mode(
        &paths::systemd_unit("lnd"),
        &render_service_unit(SYSTEM_USER, None),
        0o644,
        "write lnd unit",
    )
}

pub fn start() -> Result<()> {
    for args in [
        ["daemon-reload"].as_slice(),
        ["enable", "lnd"].as_slice(),
        ["start", "lnd"].as_slice(),
    ] {
        command::run("systemctl", args, "start lnd")?;
    }
    Ok(())
}

/// Store the wallet password on disk and restart LND with the unlock flag.
///
/// This is the one password-at-rest case: the file is mode 0400, owned by
/// the service user, and referenced from the rewritten unit so the wallet
/// unlocks unattended after a reboot.
pub fn setup_auto_unlock(password: &str) -> Result<()> {
    let password_file = paths::wallet_password_file();
    io::write_file_with_mode(&password_file, password, 0o400, "write wallet password")?;

    let path_str = password_file.display().to_string();
    let owner = format!("{}:{}", SYSTEM_USER, SYSTEM_USER);
    command::run("chown", &[&owner, &path_str], "chown wallet password")?;

    io::write_file_with_mode(
        &paths::systemd_unit("lnd"),
        &render_service_unit(SYSTEM_USER, Some(&path_str)),
        0o644,
        "write lnd unit",
    )?;

    for args in [
        ["daemon-reload"].as_slice(),
        ["restart", "lnd"].as_slice(),
    ] {
        command::run("systemctl", args, "restart lnd")?;
    }
    Ok(())
}

/// Location of the auto-unlock password file, for user-facing output.
pub fn wallet_password_path() -> PathBuf {
    paths::wallet_password_file()
}

/// Poll the REST endpoint until LND answers.
///
/// LND serves its own self-signed certificate, so verification is off for
/// this localhost-only probe.
pub fn wait_for_ready() -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| Error::internal_io(e.to_string(), Some("create probe client".to_string())))?;

    let url = format!("https://localhost:{}/v1/state", REST_PORT);
    for _ in 0..60 {
        if client.get(&url).send().is_ok() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_secs(2));
    }

    Err(Error::command_failed(
        "lnd readiness probe",
        "LND did not respond after 120 seconds",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstallConfig;

    fn tor_config() -> InstallConfig {
        InstallConfig::from_args("testnet4", "bitcoin+lnd", 25, "tor", None, 22).unwrap()
    }

    fn hybrid_config() -> InstallConfig {
        InstallConfig::from_args(
            "mainnet",
            "bitcoin+lnd",
            25,
            "hybrid",
            Some("203.0.113.7".to_string()),
            22,
        )
        .unwrap()
    }

    #[test]
    fn tor_only_config_listens_locally() {
        let conf = render_config(&tor_config());
        assert!(conf.contains("listen=localhost:9735"));
        assert!(!conf.contains("externalhosts"));
        assert!(conf.contains("bitcoin.testnet4=true"));
        assert!(conf.contains("bitcoind.rpccookie=/var/lib/bitcoin/testnet4/.cookie"));
        assert!(conf.contains("bitcoind.rpchost=127.0.0.1:48332"));
    }

    #[test]
    fn hybrid_config_announces_clearnet_address() {
        let conf = render_config(&hybrid_config());
        assert!(conf.contains("listen=0.0.0.0:9735"));
        assert!(conf.contains("externalhosts=203.0.113.7:9735"));
        assert!(conf.contains("bitcoin.mainnet=true"));
        assert!(conf.contains("bitcoind.rpccookie=/var/lib/bitcoin/.cookie"));
    }

    #[test]
    fn config_keeps_tor_stream_isolation() {
        let conf = render_config(&tor_config());
        assert!(conf.contains("tor.socks=127.0.0.1:9050"));
        assert!(conf.contains("tor.control=127.0.0.1:9051"));
        assert!(conf.contains("tor.streamisolation=true"));
    }

    #[test]
    fn service_unit_orders_after_bitcoind() {
        let unit = render_service_unit(SYSTEM_USER, None);
        assert!(unit.contains("After=bitcoind.service tor.service"));
        assert!(unit.contains("Wants=bitcoind.service"));
        assert!(!unit.contains("wallet-unlock-password-file"));
    }

    #[test]
    fn auto_unlock_unit_references_password_file() {
        let unit = render_service_unit(SYSTEM_USER, Some("/var/lib/lnd/wallet_password"));
        assert!(unit
            .contains("--wallet-unlock-password-file=/var/lib/lnd/wallet_password"));
    }

    #[test]
    fn release_urls_are_versioned() {
        assert_eq!(
            release_url(&tarball_name()),
            format!(
                "https://github.com/lightningnetwork/lnd/releases/download/v{v}/lnd-linux-amd64-v{v}.tar.gz",
                v = VERSION
            )
        );
    }
}
