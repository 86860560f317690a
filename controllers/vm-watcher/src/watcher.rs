//! Kubernetes resource watcher.
//!
//! Drives the reconciler from a `kube_runtime::Controller` over
//! VirtualMachines. The controller deduplicates work per object, so at most
//! one reconciliation per VirtualMachine is in flight; up to `concurrency`
//! different VirtualMachines are reconciled at once.

use crate::error::ControllerError;
use crate::filter::RelevanceFilter;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::store::ResourceKey;
use crds::VirtualMachine;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{Controller, controller::{Action, Config as ControllerConfig}, watcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// State shared by all reconciliations
pub struct Context {
    pub reconciler: Reconciler,
    pub filter: RelevanceFilter,
    /// Deadline of a single reconciliation
    pub reconcile_timeout: Duration,
}

/// Reconcile one delivery, mapping the outcome to a controller action.
///
/// The cached object doubles as the last-known snapshot for VMs that have
/// already left the cluster by the time they are reconciled.
pub(crate) async fn reconcile(vm: Arc<VirtualMachine>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = ResourceKey::from_object(&vm).ok_or_else(|| {
        ControllerError::InvalidResource(format!("VirtualMachine {} has no namespace", vm.name_any()))
    })?;

    if !ctx.filter.admit(&key, &vm) {
        debug!("Skipping VirtualMachine {}: no relevant change", key);
        return Ok(Action::await_change());
    }

    let result = tokio::time::timeout(ctx.reconcile_timeout, ctx.reconciler.reconcile(&key, Some(&vm))).await;
    match result {
        Ok(Ok(ReconcileOutcome::Done)) => {
            if vm.is_deleting() {
                ctx.filter.forget(&key);
            } else {
                ctx.filter.settle(&key, vm);
            }
            Ok(Action::await_change())
        }
        Ok(Ok(ReconcileOutcome::Gone)) => {
            ctx.filter.forget(&key);
            Ok(Action::await_change())
        }
        Ok(Ok(ReconcileOutcome::RetryAfter(delay))) => {
            ctx.filter.forget(&key);
            Ok(Action::requeue(delay))
        }
        Ok(Err(e)) => {
            ctx.filter.forget(&key);
            Err(e)
        }
        Err(_) => {
            ctx.filter.forget(&key);
            Err(ControllerError::DeadlineExceeded(key.to_string()))
        }
    }
}

/// Failed reconciliations are retried after the fixed retry delay
pub(crate) fn error_policy(vm: Arc<VirtualMachine>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let retry_delay = ctx.reconciler.settings().retry_delay;
    error!(
        "Reconciliation failed for VirtualMachine {}/{}: {} (retrying in {:?})",
        vm.namespace().unwrap_or_default(),
        vm.name_any(),
        error,
        retry_delay
    );
    Action::requeue(retry_delay)
}

/// Watches VirtualMachines and feeds them to the reconciler.
pub struct Watcher {
    api: Api<VirtualMachine>,
    context: Arc<Context>,
    concurrency: u16,
}

impl Watcher {
    pub fn new(api: Api<VirtualMachine>, context: Arc<Context>, concurrency: u16) -> Self {
        Self {
            api,
            context,
            concurrency,
        }
    }

    /// Runs until SIGTERM or Ctrl-C
    pub async fn watch_virtual_machines(&self) -> Result<(), ControllerError> {
        info!("Starting VirtualMachine watcher (concurrency: {})", self.concurrency);

        let controller_config = ControllerConfig::default().concurrency(self.concurrency);

        Controller::new(self.api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, Arc::clone(&self.context))
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled {}", obj),
                    Err(e) => warn!("VirtualMachine controller error: {}", e),
                }
            })
            .await;

        info!("VirtualMachine watcher stopped");
        Ok(())
    }
}
