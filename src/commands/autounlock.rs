use std::io::{BufRead, IsTerminal};

use serde::Serialize;

use privnode::config::AppConfig;
use privnode::log_status;
use privnode::{config, lightning, Error, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutounlockOutput {
    pub configured: bool,
    pub password_file: String,
}

/// Configure wallet auto-unlock: store the password on disk (0400, service
/// user) and restart LND with the unlock flag. The password is read from
/// stdin so it never appears in shell history or the process list.
pub fn run() -> Result<AutounlockOutput> {
    if config::needs_install() {
        return Err(Error::preflight_not_installed());
    }

    let mut app = AppConfig::load()?;
    if !app.has_lnd() {
        return Err(Error::config_invalid_value(
            "components",
            Some(app.components.as_str().to_string()),
            "Auto-unlock requires the bitcoin+lnd component selection",
        ));
    }

    if std::io::stdin().is_terminal() {
        log_status!("autounlock", "Enter the wallet password (input is read from stdin):");
    }

    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .map_err(|e| Error::internal_io(e.to_string(), Some("read password".to_string())))?;
    let password = password.trim_end_matches(['\r', '\n']);

    // LND enforces an 8 character minimum at wallet creation
    if password.len() < 8 {
        return Err(Error::validation_invalid_argument(
            "password",
            "Wallet passwords are at least 8 characters",
            None,
        ));
    }

    lightning::setup_auto_unlock(password)?;

    log_status!("autounlock", "Waiting for LND to come back up");
    lightning::wait_for_ready()?;

    app.auto_unlock = true;
    app.save()?;

    Ok(AutounlockOutput {
        configured: true,
        password_file: lightning::wallet_password_path().display().to_string(),
    })
}
