use std::sync::mpsc;
use std::thread;

use clap::Args;
use serde::Serialize;

use privnode::config::{self, AppConfig};
use privnode::log_status;
use privnode::pipeline::{StepProgress, StepStatus};
use privnode::status::{onion_addresses, OnionAddresses};
use privnode::{provision, Result};

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallSummary {
    pub network: String,
    pub components: String,
    pub steps_completed: usize,
    pub onion: OnionAddresses,
    pub config_path: String,
}

/// Drain progress reports onto stderr. Runs on its own thread so a slow
/// terminal never holds up the next step.
fn spawn_progress_printer(rx: mpsc::Receiver<StepProgress>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for report in rx {
            match report.status {
                StepStatus::Running => {
                    log_status!(
                        "install",
                        "[{}/{}] {}...",
                        report.index + 1,
                        report.total,
                        report.name
                    );
                }
                StepStatus::Succeeded => {
                    log_status!("install", "  ok: {}", report.name);
                }
                StepStatus::Failed => {
                    log_status!(
                        "install",
                        "  FAILED: {} ({})",
                        report.name,
                        report.error.as_deref().unwrap_or("unknown error")
                    );
                }
                StepStatus::Pending => {}
            }
        }
    })
}

pub fn run(args: &InstallArgs) -> Result<InstallSummary> {
    provision::preflight()?;

    let cfg = args.config.resolve()?;
    let mut pipeline = provision::build_pipeline(&cfg);
    let total = pipeline.len();

    let (tx, rx) = mpsc::channel();
    let printer = spawn_progress_printer(rx);

    let run_result = pipeline.run(Some(&tx));
    drop(tx);
    let _ = printer.join();
    run_result?;

    // The marker config is written only after every step succeeded; a
    // failed run stays in the "needs provisioning" state and is re-run
    // from the top.
    let app = AppConfig::from_install(&cfg);
    app.save()?;

    log_status!("install", "Installation complete; node is syncing");

    Ok(InstallSummary {
        network: cfg.network.as_str().to_string(),
        components: cfg.components.as_str().to_string(),
        steps_completed: total,
        onion: onion_addresses(cfg.has_lnd()),
        config_path: config::config_path().display().to_string(),
    })
}
