//! End-to-end scenarios over the pipeline builder and executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use privnode::config::InstallConfig;
use privnode::pipeline::{Pipeline, Step, StepStatus};
use privnode::provision::build_pipeline;
use privnode::Error;

fn config(network: &str, components: &str, prune: u32, ssh_port: u16) -> InstallConfig {
    InstallConfig::from_args(network, components, prune, "tor", None, ssh_port).unwrap()
}

#[test]
fn base_install_scenario_yields_twelve_named_steps() {
    // Base-only, testnet4, 25 GB storage budget, admin port 22
    let cfg = config("testnet4", "bitcoin", 25, 22);
    let pipeline = build_pipeline(&cfg);

    assert_eq!(
        pipeline.step_names(),
        vec![
            "Create system user",
            "Create directories",
            "Disable IPv6",
            "Configure firewall",
            "Install Tor",
            "Configure Tor",
            "Add user to tor group",
            "Start Tor",
            "Install Bitcoin Core 29.2",
            "Configure Bitcoin Core",
            "Create bitcoind service",
            "Start Bitcoin Core",
        ]
    );
}

#[test]
fn step_list_shape_is_a_pure_function_of_config() {
    for network in ["mainnet", "testnet4"] {
        for prune in [10u32, 25, 50] {
            let base = build_pipeline(&config(network, "bitcoin", prune, 22));
            let with_lnd = build_pipeline(&config(network, "bitcoin+lnd", prune, 22));

            assert_eq!(base.len(), 12);
            assert_eq!(with_lnd.len(), 18);
            // The Lightning selection appends, it never reorders the base
            assert_eq!(
                with_lnd.step_names()[..12],
                base.step_names()[..],
                "network={} prune={}",
                network,
                prune
            );
        }
    }
}

#[test]
fn lnd_steps_are_appended_in_dependency_order() {
    let names = build_pipeline(&config("mainnet", "bitcoin+lnd", 25, 22)).step_names();
    let tail = &names[12..];

    assert_eq!(
        tail,
        [
            "Download LND 0.20.0-beta",
            "Verify LND release",
            "Install LND",
            "Configure LND",
            "Create lnd service",
            "Start LND",
        ]
    );
}

#[test]
fn failing_step_halts_a_full_size_pipeline_at_every_index() {
    // Stub pipeline the size of a real LND install: whatever index fails,
    // nothing after it may execute.
    const TOTAL: usize = 18;

    for fail_at in 0..TOTAL {
        let executed = Arc::new(AtomicUsize::new(0));
        let steps: Vec<Step> = (0..TOTAL)
            .map(|i| {
                let executed = Arc::clone(&executed);
                Step::new(format!("step-{}", i), move || {
                    if i == fail_at {
                        Err(Error::command_failed("stub", "boom"))
                    } else {
                        executed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
            })
            .collect();

        let mut pipeline = Pipeline::new(steps);
        let err = pipeline.run(None).unwrap_err();

        assert_eq!(err.code.as_str(), "step.failed");
        assert_eq!(executed.load(Ordering::SeqCst), fail_at);
        assert_eq!(pipeline.steps()[fail_at].status, StepStatus::Failed);
        assert!(pipeline.steps()[fail_at + 1..]
            .iter()
            .all(|s| s.status == StepStatus::Pending));
    }
}

#[test]
fn progress_stream_covers_the_whole_run() {
    let steps: Vec<Step> = (0..5)
        .map(|i| Step::new(format!("step-{}", i), || Ok(())))
        .collect();
    let mut pipeline = Pipeline::new(steps);

    let (tx, rx) = mpsc::channel();
    pipeline.run(Some(&tx)).unwrap();
    drop(tx);

    let reports: Vec<_> = rx.iter().collect();
    // Two transitions per step, in strict index order
    assert_eq!(reports.len(), 10);
    for (n, report) in reports.iter().enumerate() {
        assert_eq!(report.index, n / 2);
        assert_eq!(report.total, 5);
        let expected = if n % 2 == 0 {
            StepStatus::Running
        } else {
            StepStatus::Succeeded
        };
        assert_eq!(report.status, expected);
    }
}

#[test]
fn step_error_carries_command_diagnostics() {
    let mut pipeline = Pipeline::new(vec![Step::new("Configure firewall", || {
        Err(Error::command_failed(
            "configure ufw",
            "ERROR: Couldn't determine iptables version",
        ))
    })]);

    let err = pipeline.run(None).unwrap_err();
    assert!(err.message.contains("Configure firewall"));
    assert_eq!(err.details["step"], "Configure firewall");
    assert_eq!(err.details["causeCode"], "command.failed");
    assert!(err.details["cause"]["output"]
        .as_str()
        .unwrap()
        .contains("iptables"));
}
