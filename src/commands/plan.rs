use clap::Args;
use serde::Serialize;

use privnode::{provision, Result};

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    pub network: String,
    pub components: String,
    pub total: usize,
    pub steps: Vec<String>,
}

/// Show the step list an install with these flags would execute.
/// Pure: builds the same plan as `install` without touching the system.
pub fn run(args: &PlanArgs) -> Result<PlanOutput> {
    let cfg = args.config.resolve()?;
    let pipeline = provision::build_pipeline(&cfg);

    Ok(PlanOutput {
        network: cfg.network.as_str().to_string(),
        components: cfg.components.as_str().to_string(),
        total: pipeline.len(),
        steps: pipeline.step_names(),
    })
}
