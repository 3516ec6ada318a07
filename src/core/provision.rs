//! Pipeline builder and preflight checks.
//!
//! `build_steps` is a pure function from a finalized `InstallConfig` to the
//! ordered step list: 12 base steps, plus 6 Lightning steps appended when
//! that component was selected. Step closures hold clones of the immutable
//! config and only read it.

use crate::bitcoin;
use crate::config::{self, InstallConfig};
use crate::error::{Error, Result};
use crate::lightning;
use crate::paths;
use crate::pipeline::{Pipeline, Step};
use crate::system::{self, SYSTEM_USER};
use crate::tor;

/// Checks that must hold before any step runs: root privilege, a supported
/// OS, and a node that has not been provisioned yet.
pub fn preflight() -> Result<()> {
    if !is_root() {
        return Err(Error::preflight_not_root());
    }

    system::check_os()?;

    if !config::needs_install() {
        return Err(Error::preflight_already_installed(
            paths::app_config().display().to_string(),
        ));
    }

    Ok(())
}

fn is_root() -> bool {
    // Effective uid decides what we may write, not the login uid
    unsafe { libc::geteuid() == 0 }
}

/// Build the ordered step list for one installation run.
pub fn build_steps(cfg: &InstallConfig) -> Vec<Step> {
    let mut steps = Vec::with_capacity(if cfg.has_lnd() { 18 } else { 12 });

    steps.push(Step::new("Create system user", || {
        system::create_system_user(SYSTEM_USER)
    }));
    {
        let c = cfg.clone();
        steps.push(Step::new("Create directories", move || {
            system::create_dirs(SYSTEM_USER, &c)
        }));
    }
    steps.push(Step::new("Disable IPv6", || system::disable_ipv6()));
    {
        let c = cfg.clone();
        steps.push(Step::new("Configure firewall", move || {
            system::configure_firewall(&c)
        }));
    }
    steps.push(Step::new("Install Tor", || tor::install()));
    {
        let c = cfg.clone();
        steps.push(Step::new("Configure Tor", move || tor::write_config(&c)));
    }
    steps.push(Step::new("Add user to tor group", || {
        tor::grant_cookie_access()
    }));
    steps.push(Step::new("Start Tor", || tor::restart()));

    steps.push(Step::new(
        format!("Install Bitcoin Core {}", bitcoin::VERSION),
        || bitcoin::install(),
    ));
    {
        let c = cfg.clone();
        steps.push(Step::new("Configure Bitcoin Core", move || {
            bitcoin::write_config(&c)
        }));
    }
    steps.push(Step::new("Create bitcoind service", || {
        bitcoin::write_service_unit()
    }));
    steps.push(Step::new("Start Bitcoin Core", || bitcoin::start()));

    if cfg.has_lnd() {
        steps.push(Step::new(format!("Download LND {}", lightning::VERSION), || {
            lightning::download_release()
        }));
        steps.push(Step::new("Verify LND release", || {
            lightning::verify_release().map(|_| ())
        }));
        steps.push(Step::new("Install LND", || lightning::install_binaries()));
        {
            let c = cfg.clone();
            steps.push(Step::new("Configure LND", move || {
                lightning::write_config(&c)
            }));
        }
        steps.push(Step::new("Create lnd service", || {
            lightning::write_service_unit()
        }));
        steps.push(Step::new("Start LND", || lightning::start()));
    }

    steps
}

/// Convenience wrapper used by the install command.
pub fn build_pipeline(cfg: &InstallConfig) -> Pipeline {
    Pipeline::new(build_steps(cfg))
}
