use anyhow::Result;

use rota_core::OutputFormat;
use rota_scheduler::{DistributionOutcome, FiringReport, TenantResult, TenantRun};

use crate::app::App;
use crate::output::print_json;

pub(crate) async fn handle_dispatch(
    app: &App,
    tenant: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let trigger = app.trigger()?;
    let report = match tenant {
        Some(tenant_id) => {
            let tenant = app.registry.active_tenant(&tenant_id).await?;
            FiringReport::Completed {
                tenants: vec![trigger.run_tenant(&tenant).await],
            }
        }
        None => trigger.run_now().await,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }

    if let FiringReport::RegistryUnavailable { error } = &report {
        anyhow::bail!("Could not list active tenants: {error}");
    }
    Ok(())
}

fn print_report(report: &FiringReport) {
    let tenants = match report {
        FiringReport::RegistryUnavailable { .. } => return,
        FiringReport::Completed { tenants } => tenants,
    };
    if tenants.is_empty() {
        eprintln!("No active tenants.");
    }
    for run in tenants {
        println!("{}: {}", run.tenant_id, describe(run));
    }
}

fn describe(run: &TenantRun) -> String {
    match &run.result {
        TenantResult::Failed { error } => format!("failed: {error}"),
        TenantResult::TimedOut { timeout_secs } => format!("timed out after {timeout_secs}s"),
        TenantResult::Finished(outcome) => match outcome {
            DistributionOutcome::NoEligibleAgents => "no eligible agents".to_string(),
            DistributionOutcome::NoUnassignedLeads => "no unassigned leads".to_string(),
            DistributionOutcome::LeaseBusy { holder } => format!("skipped, lease held by {holder}"),
            DistributionOutcome::Cancelled => "cancelled before any assignment".to_string(),
            DistributionOutcome::Distributed(report) => format!(
                "assigned {} lead(s) in batches of {}, {} conflict(s), next agent {}",
                report.assignments.len(),
                report.batch_size,
                report.conflicts,
                report
                    .cursor
                    .last_assigned_agent
                    .as_deref()
                    .unwrap_or("-")
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rota_core::Cursor;
    use rota_scheduler::{Assignment, DistributionReport};

    fn run(result: TenantResult) -> TenantRun {
        TenantRun {
            tenant_id: "T1".to_string(),
            result,
        }
    }

    #[test]
    fn test_describe_distributed() {
        let report = DistributionReport {
            tenant_id: "T1".to_string(),
            eligible_agents: 2,
            unassigned_leads: 3,
            batch_size: 2,
            assignments: vec![Assignment {
                lead_id: "l1".to_string(),
                agent: "a@x.io".to_string(),
            }],
            conflicts: 0,
            interrupted: false,
            cursor: Cursor {
                last_assigned_index: 1,
                last_assigned_agent: Some("b@x.io".to_string()),
                last_assigned_at: Utc::now(),
            },
        };
        let text = describe(&run(TenantResult::Finished(
            DistributionOutcome::Distributed(report),
        )));
        assert_eq!(
            text,
            "assigned 1 lead(s) in batches of 2, 0 conflict(s), next agent b@x.io"
        );
    }

    #[test]
    fn test_describe_failures() {
        assert_eq!(
            describe(&run(TenantResult::TimedOut { timeout_secs: 120 })),
            "timed out after 120s"
        );
        assert_eq!(
            describe(&run(TenantResult::Failed {
                error: "boom".to_string()
            })),
            "failed: boom"
        );
    }
}
