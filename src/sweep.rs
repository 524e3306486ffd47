//! Compliance evaluation and the sequential sweep.
//!
//! One pass over every stage of every REST API: stages already logging at
//! INFO are skipped; everything else is patched and redeployed, with a fixed
//! pause after each deployment. The first provider failure aborts the run —
//! there is no retry and no per-stage isolation.
use anyhow::{Context, Result};
use std::time::Duration;

use crate::gateway::{Gateway, Stage, LEVEL_INFO, LEVEL_OFF};

/// Pause after each deployment. The provider allows one `CreateDeployment`
/// per 5 seconds per account; the margin is doubled.
pub const DEPLOYMENT_PAUSE: Duration = Duration::from_secs(10);

/// Per-stage logging status, derived once per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compliance {
    pub logging_enabled: bool,
    pub info_level: bool,
}

impl Compliance {
    /// Evaluate one stage's wildcard method settings.
    ///
    /// An empty settings map means logging was never configured; a non-empty
    /// map without a wildcard entry reads as enabled-but-not-INFO. Both are
    /// remediated.
    pub fn of(stage: &Stage) -> Self {
        let wildcard = stage.wildcard_logging_level();
        let configured = !stage.method_settings.is_empty();
        Self {
            logging_enabled: configured && wildcard != Some(LEVEL_OFF),
            info_level: configured && wildcard == Some(LEVEL_INFO),
        }
    }

    pub fn is_compliant(self) -> bool {
        self.logging_enabled && self.info_level
    }
}

/// Counts for the final log line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub apis: usize,
    pub stages: usize,
    pub compliant: usize,
    pub remediated: usize,
}

/// Run the full sweep. `pause` is invoked with [`DEPLOYMENT_PAUSE`] after
/// each deployment; production passes `std::thread::sleep`, tests record.
pub fn run_sweep<G: Gateway>(
    gateway: &G,
    mut pause: impl FnMut(Duration),
) -> Result<SweepSummary> {
    let apis = gateway.rest_apis().context("list REST APIs")?;
    tracing::info!(apis = apis.len(), "listed REST APIs");

    let mut summary = SweepSummary {
        apis: apis.len(),
        ..SweepSummary::default()
    };

    for api in &apis {
        let stages = gateway
            .stages(&api.id)
            .with_context(|| format!("list stages of REST API {}", api.id))?;
        tracing::info!(
            rest_api_id = %api.id,
            name = api.name.as_deref().unwrap_or(""),
            stages = stages.len(),
            "listed stages"
        );

        for stage in &stages {
            summary.stages += 1;
            let compliance = Compliance::of(stage);
            tracing::info!(
                rest_api_id = %api.id,
                stage = %stage.stage_name,
                logging_enabled = compliance.logging_enabled,
                info_level = compliance.info_level,
                "evaluated stage"
            );
            if compliance.is_compliant() {
                summary.compliant += 1;
                continue;
            }

            remediate(gateway, &api.id, &stage.stage_name)?;
            summary.remediated += 1;
            pause(DEPLOYMENT_PAUSE);
        }
    }
    Ok(summary)
}

/// Patch the stage to INFO and deploy so the change takes effect.
fn remediate<G: Gateway>(gateway: &G, rest_api_id: &str, stage_name: &str) -> Result<()> {
    tracing::info!(rest_api_id, stage = stage_name, "enabling INFO logging");
    let updated = gateway
        .enable_info_logging(rest_api_id, stage_name)
        .with_context(|| format!("patch stage {stage_name} of {rest_api_id}"))?;
    tracing::info!(
        rest_api_id,
        stage = stage_name,
        logging_level = updated.wildcard_logging_level().unwrap_or("unset"),
        "stage patched"
    );

    let deployment = gateway
        .create_deployment(rest_api_id, stage_name)
        .with_context(|| format!("deploy stage {stage_name} of {rest_api_id}"))?;
    tracing::info!(
        rest_api_id,
        stage = stage_name,
        deployment_id = %deployment.id,
        "deployment created"
    );
    Ok(())
}
