//! Bitcoin Core: threshold-verified install, configuration, service.

use std::fs;

use crate::config::InstallConfig;
use crate::error::{Error, Result};
use crate::network::NetworkParams;
use crate::paths;
use crate::system::SYSTEM_USER;
use crate::tor::SOCKS_PORT;
use crate::utils::{command, io};
use crate::verify;

pub const VERSION: &str = "29.2";

const RELEASE_BASE: &str = "https://bitcoincore.org/bin";

fn tarball_name() -> String {
    format!("bitcoin-{}-x86_64-linux-gnu.tar.gz", VERSION)
}

fn release_url(file: &str) -> String {
    format!("{}/bitcoin-core-{}/{}", RELEASE_BASE, VERSION, file)
}

/// Download, verify and install Bitcoin Core.
///
/// Order is fixed: fetch everything, establish trust (2-of-5 signatures
/// over the checksum listing, then the tarball checksum), and only then
/// extract and place binaries. Staging files are removed on success and
/// deliberately left behind on failure for inspection.
pub fn install() -> Result<()> {
    let staging = paths::staging_dir();
    let tarball = staging.join(tarball_name());
    let sums = staging.join("SHA256SUMS");
    let sums_sig = staging.join("SHA256SUMS.asc");

    log_status!("install", "Downloading Bitcoin Core {}", VERSION);
    crate::fetch::download(&release_url(&tarball_name()), &tarball)?;
    crate::fetch::download(&release_url("SHA256SUMS"), &sums)?;
    crate::fetch::download(&release_url("SHA256SUMS.asc"), &sums_sig)?;

    log_status!("install", "Verifying release signatures");
    let policy = verify::bitcoin_core_policy();
    verify::verify_threshold_signatures(&policy, &sums_sig, &sums)?;

    // Checksum is checked against the now signature-verified listing, and
    // is fatal independently of the signature count
    let listing = io::read_file(&sums, "read checksum listing")?;
    verify::checksum::verify_file(&listing, &tarball)?;

    log_status!("install", "Extracting");
    let tarball_str = tarball.display().to_string();
    let staging_str = staging.display().to_string();
    command::run(
        "tar",
        &["-xzf", &tarball_str, "-C", &staging_str],
        "extract bitcoin tarball",
    )?;

    // Place every shipped binary at the privileged install location
    let extract_bin = staging.join(format!("bitcoin-{}", VERSION)).join("bin");
    let entries = fs::read_dir(&extract_bin).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("read {}", extract_bin.display())),
        )
    })?;

    let dest = paths::install_bin_dir().display().to_string();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some("read extracted entry".to_string()))
        })?;
        let src = entry.path().display().to_string();
        command::run(
            "install",
            &["-m", "0755", "-o", "root", "-g", "root", &src, &dest],
            "install bitcoin binary",
        )?;
    }

    // Clean up staging state only after a fully successful install
    let _ = fs::remove_file(&tarball);
    let _ = fs::remove_file(&sums);
    let _ = fs::remove_file(&sums_sig);
    let _ = fs::remove_dir_all(staging.join(format!("bitcoin-{}", VERSION)));

    Ok(())
}

/// Render bitcoin.conf from the run configuration.
pub fn render_config(cfg: &InstallConfig) -> String {
    let params = cfg.params();
    // Config value is in MB, the operator choice in GB
    let prune_mb = cfg.prune_gb * 1000;

    let mut content = format!(
        "\
# privnode Bitcoin Core configuration
#
# Network: {name}
# Prune:   {prune_gb} GB

server=1
{chain_flag}prune={prune_mb}
dbcache=512
maxmempool=300
disablewallet=1

# Route all connections through Tor
proxy=127.0.0.1:{socks}
listen=1
listenonion=1
",
        name = params.name,
        prune_gb = cfg.prune_gb,
        chain_flag = chain_flag_line(params),
        prune_mb = prune_mb,
        socks = SOCKS_PORT,
    );

    // Non-mainnet chains take their binds in a named section
    let section = if params.data_subdir.is_empty() {
        String::new()
    } else {
        format!("[{}]\n", params.name)
    };

    content.push_str(&format!(
        "\n{section}bind=127.0.0.1\nrpcbind=127.0.0.1\nrpcport={rpc}\nrpcallowip=127.0.0.1\n\nzmqpubrawblock=tcp://127.0.0.1:{zmq_block}\nzmqpubrawtx=tcp://127.0.0.1:{zmq_tx}\n",
        section = section,
        rpc = params.rpc_port,
        zmq_block = params.zmq_block_port,
        zmq_tx = params.zmq_tx_port,
    ));

    content
}

fn chain_flag_line(params: &NetworkParams) -> String {
    if params.bitcoin_conf_flag.is_empty() {
        String::new()
    } else {
        format!("{}\n", params.bitcoin_conf_flag)
    }
}

/// Write bitcoin.conf readable by the service group only.
pub fn write_config(cfg: &InstallConfig) -> Result<()> {
    let path = paths::bitcoin_conf();
    io::write_file_with_mode(&path, &render_config(cfg), 0o640, "write bitcoin.conf")?;

    let path_str = path.display().to_string();
    let owner = format!("root:{}", SYSTEM_USER);
    command::run("chown", &[&owner, &path_str], "chown bitcoin.conf")?;
    Ok(())
}

pub fn render_service_unit(username: &str) -> String {
    format!(
        "\
[Unit]
Description=Bitcoin Core
After=network-online.target tor.service
Wants=network-online.target

[Service]
Type=simple
User={user}
Group={user}
ExecStart=/usr/local/bin/bitcoind -conf=/etc/bitcoin/bitcoin.conf -datadir=/var/lib/bitcoin
Restart=on-failure
RestartSec=30
TimeoutStopSec=600
PrivateTmp=true
ProtectSystem=full
NoNewPrivileges=true

[Install]
WantedBy=multi-user.target
",
        user = username
    )
}

pub fn write_service_unit() -> Result<()> {
    io::write_file_with_mode(
        &paths::systemd_unit("bitcoind"),
        &render_service_unit(SYSTEM_USER),
        0o644,
        "write bitcoind unit",
    )
}

/// Enable and start bitcoind.
pub fn start() -> Result<()> {
    for args in [
        ["daemon-reload"].as_slice(),
        ["enable", "bitcoind"].as_slice(),
        ["start", "bitcoind"].as_slice(),
    ] {
        command::run("systemctl", args, "start bitcoind")?;
    }
    Ok(())
}
