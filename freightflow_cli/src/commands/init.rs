use anyhow::{Context, Result};
use freightflow_core::workflow::ConditionType;
use freightflow_core::{ResolvePolicy, WorkflowConfig, WorkflowStepConfig};
use std::path::Path;

use crate::config::Config;

pub const STARTER_WORKFLOW_ID: &str = "fba_standard";

pub fn run(root: &Path, settlement_delay_ms: Option<u64>, policy: Option<ResolvePolicy>) -> Result<()> {
    println!("Initialising freightflow in {}...\n", root.display());

    create_directory_structure(root)?;

    let mut config = Config::load_or_default(root)?;
    if let Some(delay) = settlement_delay_ms {
        config.settlement_delay_ms = delay;
    }
    if let Some(policy) = policy {
        config.policy = policy;
    }
    config.save(root)?;
    println!("Config written to: {}", Config::config_file(root).display());

    let starter = Config::workflows_dir(root).join(format!("{}.json", STARTER_WORKFLOW_ID));
    if starter.exists() {
        println!("Starter workflow already present: {}", starter.display());
    } else {
        let content = serde_json::to_string_pretty(&starter_workflow()?)
            .context("Failed to serialize starter workflow")?;
        std::fs::write(&starter, content).context("Failed to write starter workflow")?;
        println!("Starter workflow written to: {}", starter.display());
    }

    println!("Initialisation complete!");
    Ok(())
}

/// Ops review, finance sign-off above 10k, automated payment settlement.
pub fn starter_workflow() -> Result<WorkflowConfig> {
    let workflow = WorkflowConfig::new(
        STARTER_WORKFLOW_ID,
        "FBA Standard Approval",
        "Operational review, financial approval for large invoices, payment settlement",
        vec![
            WorkflowStepConfig::human("step_ops", "Operational Review", "ops_manager"),
            WorkflowStepConfig::human("step_fin", "Financial Approval", "finance_controller")
                .with_condition(ConditionType::AmountGt, Some(10000.0)),
            WorkflowStepConfig::system("step_pay", "Payment Settlement"),
        ],
    )?;

    Ok(workflow)
}

fn create_directory_structure(root: &Path) -> Result<()> {
    println!("Setting up directory...");

    let workflows_dir = Config::workflows_dir(root);

    std::fs::create_dir_all(root).context("Failed to create freightflow directory")?;

    std::fs::create_dir_all(&workflows_dir).context("Failed to create workflows directory")?;

    println!("Created: {}", root.display());
    println!("Created: {}", workflows_dir.display());

    Ok(())
}
