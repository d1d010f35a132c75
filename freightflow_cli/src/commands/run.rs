use anyhow::{Context, Result};
use freightflow_core::core::VendorAction;
use freightflow_core::runtime::Outcome;
use freightflow_core::{
    Actor, Decision, Engine, Invoice, MemoryStore, NewInvoice, RoleDefinition, RoleDirectory,
    SystemClock, TowerHandle, TowerRunner, WorkflowConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::commands::workflow::resolve_workflow_arg;
use crate::config::Config;
use crate::documents::read_document;

const SETTLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub actions: Vec<ScriptAction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptAction {
    Decide(DecideAction),
    VendorResponse(VendorResponseAction),
    /// Milliseconds to let pending settlements run.
    Wait(u64),
    Remove(String),
    Reconcile,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideAction {
    pub invoice: String,
    pub step: String,
    pub decision: Decision,
    pub actor: Actor,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorResponseAction {
    pub invoice: String,
    pub action: VendorAction,
    #[serde(default)]
    pub comment: Option<String>,
}

pub struct RunArgs {
    pub workflow: String,
    pub invoices: PathBuf,
    pub script: PathBuf,
    pub roles: Option<PathBuf>,
}

pub fn run(root: &Path, config: &Config, args: RunArgs) -> Result<()> {
    let workflow = resolve_workflow_arg(root, &args.workflow)?;
    let invoices: Vec<NewInvoice> = read_document(&args.invoices)?;
    let script: Script = read_document(&args.script)?;
    let roles = match &args.roles {
        Some(path) => {
            let roles: Vec<RoleDefinition> = read_document(path)?;
            Some(Arc::new(RoleDirectory::new(roles)))
        }
        None => None,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let final_state = rt.block_on(run_session(config, workflow, invoices, script, roles))?;

    print_summary(&final_state);
    Ok(())
}

pub async fn run_session(
    config: &Config,
    workflow: WorkflowConfig,
    invoices: Vec<NewInvoice>,
    script: Script,
    roles: Option<Arc<RoleDirectory>>,
) -> Result<Vec<Invoice>> {
    let mut engine = Engine::new();
    let workflow = engine
        .register_workflow(workflow)
        .context("Workflow validation failed")?;

    let cancel = CancellationToken::new();
    let (runner, handle) = TowerRunner::new(
        engine,
        Box::new(MemoryStore::new()),
        Arc::new(SystemClock),
        config.tower_config(),
        cancel.clone(),
    );
    let runner = tokio::spawn(runner.start());

    for invoice in invoices {
        let id = invoice.id.clone();
        handle
            .ingest(invoice, &workflow.id)
            .await
            .with_context(|| format!("Failed to ingest invoice '{}'", id))?;
    }

    for (index, action) in script.actions.into_iter().enumerate() {
        if let Err(e) = apply_action(&handle, roles.clone(), action).await {
            eprintln!("action #{} failed: {}", index + 1, e);
        }
    }

    wait_for_settlements(&handle, config).await?;

    let final_state = handle.invoices().await?;

    cancel.cancel();
    runner.await.context("Control tower runner panicked")?;

    Ok(final_state)
}

async fn apply_action(
    handle: &TowerHandle,
    roles: Option<Arc<RoleDirectory>>,
    action: ScriptAction,
) -> Result<()> {
    match action {
        ScriptAction::Decide(decide) => {
            println!(
                "{} {:?} {} by {} ({})",
                decide.invoice, decide.decision, decide.step, decide.actor.name, decide.actor.role
            );

            let outcome = match roles {
                Some(roles) => {
                    handle
                        .resolve_step_as(
                            roles,
                            &decide.invoice,
                            &decide.step,
                            decide.decision,
                            decide.actor,
                            decide.comment,
                        )
                        .await?
                }
                None => {
                    handle
                        .resolve_step(
                            &decide.invoice,
                            &decide.step,
                            decide.decision,
                            decide.actor,
                            decide.comment,
                        )
                        .await?
                }
            };

            match outcome {
                Outcome::Resolved {
                    invoice_status,
                    next,
                } => println!("  -> invoice {}, next {:?}", invoice_status, next),
                Outcome::Ignored(reason) => println!("  -> ignored: {}", reason),
                Outcome::Stale => println!("  -> stale"),
            }
        }
        ScriptAction::VendorResponse(response) => {
            let invoice = handle
                .record_vendor_response(&response.invoice, response.action, response.comment)
                .await?;
            println!("{} vendor {}", invoice.id, response.action.label());
        }
        ScriptAction::Wait(ms) => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        ScriptAction::Remove(invoice_id) => {
            if handle.remove_invoice(&invoice_id).await?.is_none() {
                println!("{} not found, nothing removed", invoice_id);
            } else {
                println!("{} removed", invoice_id);
            }
        }
        ScriptAction::Reconcile => {
            let count = handle.reconcile().await?;
            println!("reconcile: {} settlement(s) rescheduled", count);
        }
    }

    Ok(())
}

/// Polls until no invoice is left in PROCESSING. Gives up only when the set
/// of processing steps stops changing for a couple of settlement delays, so
/// long chains of system steps still run to the end.
async fn wait_for_settlements(handle: &TowerHandle, config: &Config) -> Result<()> {
    let budget = Duration::from_millis(config.settlement_delay_ms.saturating_mul(2)) + SETTLE_POLL;
    let mut deadline = tokio::time::Instant::now() + budget;
    let mut last_seen = Vec::new();

    loop {
        let processing = processing_steps(&handle.invoices().await?);
        if processing.is_empty() {
            return Ok(());
        }
        if processing != last_seen {
            deadline = tokio::time::Instant::now() + budget;
            last_seen = processing;
        } else if tokio::time::Instant::now() >= deadline {
            eprintln!("{} invoice(s) still awaiting settlement", processing.len());
            return Ok(());
        }
        tokio::time::sleep(SETTLE_POLL).await;
    }
}

fn processing_steps(invoices: &[Invoice]) -> Vec<(String, String)> {
    invoices
        .iter()
        .filter_map(|invoice| {
            invoice
                .processing_step()
                .map(|item| (invoice.id.clone(), item.step_id.clone()))
        })
        .collect()
}

fn print_summary(invoices: &[Invoice]) {
    println!("\nFinal state ({} invoices):\n", invoices.len());

    for invoice in invoices {
        println!(
            "{}  {:<18} {:>12.2} {}  {}",
            invoice.id, invoice.carrier, invoice.amount, invoice.currency, invoice.status
        );
        for item in &invoice.workflow_history {
            let by = item
                .approver_name
                .as_deref()
                .map(|name| format!(" by {}", name))
                .unwrap_or_default();
            let comment = item
                .comment
                .as_deref()
                .map(|c| format!(" \"{}\"", c))
                .unwrap_or_default();
            println!("    {:<12} {}{}{}", item.step_id, item.status, by, comment);
        }
    }
}
