//! Single-writer event loop around a `ControlTower`.
//!
//! The `TowerRunner` owns the tower and applies, one at a time, jobs sent by
//! `TowerHandle`s and settlements fired by its `ChannelScheduler`. Since
//! nothing else can touch the tower, two decisions on the same invoice never
//! interleave.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::config::TowerConfig;
use super::scheduler::ChannelScheduler;
use super::tower::{ControlTower, Outcome};
use crate::clock::Clock;
use crate::core::{Actor, Invoice, NewInvoice, VendorAction};
use crate::error::WorkflowError;
use crate::rbac::RoleDirectory;
use crate::store::InvoiceStore;
use crate::workflow::{Decision, Engine, SettlementTicket, WorkflowConfig};

type Job = Box<dyn FnOnce(&mut ControlTower) + Send>;

pub struct TowerRunner {
    tower: ControlTower,
    jobs: mpsc::Receiver<Job>,
    settlements: mpsc::UnboundedReceiver<SettlementTicket>,
    cancel: CancellationToken,
    timers: CancellationToken,
}

impl TowerRunner {
    /// Builds the tower with a tokio-backed settlement scheduler and returns
    /// the runner together with the first handle.
    pub fn new(
        engine: Engine,
        store: Box<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
        config: TowerConfig,
        cancel: CancellationToken,
    ) -> (Self, TowerHandle) {
        Self::with_buffer_size(engine, store, clock, config, cancel, 100)
    }

    pub fn with_buffer_size(
        engine: Engine,
        store: Box<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
        config: TowerConfig,
        cancel: CancellationToken,
        buffer_size: usize,
    ) -> (Self, TowerHandle) {
        let timers = cancel.child_token();
        let (scheduler, settlements) = ChannelScheduler::new(timers.clone());
        let tower = ControlTower::new(engine, store, clock, Arc::new(scheduler), config);
        let (sender, jobs) = mpsc::channel(buffer_size);

        let runner = Self {
            tower,
            jobs,
            settlements,
            cancel,
            timers,
        };

        (runner, TowerHandle { sender })
    }

    /// Runs until the token is cancelled or every handle is dropped, then
    /// cancels outstanding settlement timers and hands the tower back.
    pub async fn start(mut self) -> ControlTower {
        info!("control tower runner started");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("control tower runner cancelled");
                    break;
                }
                Some(ticket) = self.settlements.recv() => {
                    match self.tower.settle(&ticket) {
                        Ok(Outcome::Resolved { invoice_status, .. }) => {
                            info!(
                                invoice_id = %ticket.invoice_id,
                                step_id = %ticket.step_id,
                                invoice_status = %invoice_status,
                                "settlement processed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(
                                invoice_id = %ticket.invoice_id,
                                step_id = %ticket.step_id,
                                error = %e,
                                "settlement failed"
                            );
                        }
                    }
                }
                job = self.jobs.recv() => {
                    match job {
                        Some(job) => job(&mut self.tower),
                        None => {
                            info!("all control tower handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        self.timers.cancel();
        self.tower
    }
}

/// Cloneable entry point to a running `TowerRunner`.
#[derive(Clone)]
pub struct TowerHandle {
    sender: mpsc::Sender<Job>,
}

impl TowerHandle {
    /// Runs `f` on the tower inside the runner loop and returns its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R, WorkflowError>
    where
        F: FnOnce(&mut ControlTower) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |tower| {
            // caller may have gone away; nothing to do then
            let _ = reply.send(f(tower));
        });

        self.sender
            .send(job)
            .await
            .map_err(|_| WorkflowError::RunnerClosed)?;

        response.await.map_err(|_| WorkflowError::RunnerClosed)
    }

    pub async fn register_workflow(
        &self,
        workflow: WorkflowConfig,
    ) -> Result<Arc<WorkflowConfig>, WorkflowError> {
        self.call(move |tower| tower.engine_mut().register_workflow(workflow))
            .await?
    }

    pub async fn ingest(
        &self,
        invoice: NewInvoice,
        workflow_id: &str,
    ) -> Result<Invoice, WorkflowError> {
        let workflow_id = workflow_id.to_owned();
        self.call(move |tower| tower.ingest(invoice, &workflow_id))
            .await?
    }

    pub async fn resolve_step(
        &self,
        invoice_id: &str,
        step_id: &str,
        decision: Decision,
        actor: Actor,
        comment: Option<String>,
    ) -> Result<Outcome, WorkflowError> {
        let invoice_id = invoice_id.to_owned();
        let step_id = step_id.to_owned();
        self.call(move |tower| {
            tower.resolve_step(&invoice_id, &step_id, decision, &actor, comment.as_deref())
        })
        .await?
    }

    /// Checks the role directory before forwarding a human decision.
    pub async fn resolve_step_as(
        &self,
        roles: Arc<RoleDirectory>,
        invoice_id: &str,
        step_id: &str,
        decision: Decision,
        actor: Actor,
        comment: Option<String>,
    ) -> Result<Outcome, WorkflowError> {
        let invoice_id = invoice_id.to_owned();
        let step_id = step_id.to_owned();
        self.call(move |tower| {
            tower.resolve_step_as(
                &roles,
                &invoice_id,
                &step_id,
                decision,
                &actor,
                comment.as_deref(),
            )
        })
        .await?
    }

    pub async fn record_vendor_response(
        &self,
        invoice_id: &str,
        action: VendorAction,
        comment: Option<String>,
    ) -> Result<Invoice, WorkflowError> {
        let invoice_id = invoice_id.to_owned();
        self.call(move |tower| {
            tower.record_vendor_response(&invoice_id, action, comment.as_deref())
        })
        .await?
    }

    pub async fn invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, WorkflowError> {
        let invoice_id = invoice_id.to_owned();
        self.call(move |tower| tower.invoice(&invoice_id)).await
    }

    pub async fn invoices(&self) -> Result<Vec<Invoice>, WorkflowError> {
        self.call(|tower| tower.invoices()).await
    }

    pub async fn remove_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, WorkflowError> {
        let invoice_id = invoice_id.to_owned();
        self.call(move |tower| tower.remove_invoice(&invoice_id))
            .await
    }

    pub async fn processing_count(&self) -> Result<usize, WorkflowError> {
        self.call(|tower| tower.processing_count()).await
    }

    pub async fn reconcile(&self) -> Result<usize, WorkflowError> {
        self.call(|tower| tower.reconcile()).await
    }

    pub async fn inbox(
        &self,
        actor: Actor,
        roles: Arc<RoleDirectory>,
    ) -> Result<Vec<Invoice>, WorkflowError> {
        self.call(move |tower| tower.inbox(&actor, &roles)).await
    }
}
