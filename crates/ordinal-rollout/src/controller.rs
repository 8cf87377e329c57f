//! Rollout controller: fetch, transform, delegate.
//!
//! The controller owns nothing about how replicas are updated. It reads the
//! current workload set, asks the suite's transform for the desired one, and
//! hands both to the suite's strategy. Strategy failures come back wrapped
//! with the workload identity; the strategy's `skip_sleep` hint is passed
//! through untouched.

use std::sync::Arc;

use tracing::{Instrument, error, info, info_span};

use ordinal_state::{WorkloadId, WorkloadStore};

use crate::capability::{UpdateStrategy, WorkloadTransform};
use crate::context::{RolloutContext, RolloutGates, RolloutOutcome};
use crate::error::{RolloutError, classify};
use crate::shutdown::Shutdown;

/// A transform paired with the strategy that rolls it out.
#[derive(Clone)]
pub struct UpdateSuite {
    pub transform: Arc<dyn WorkloadTransform>,
    pub strategy: Arc<dyn UpdateStrategy>,
}

impl UpdateSuite {
    pub fn new(transform: Arc<dyn WorkloadTransform>, strategy: Arc<dyn UpdateStrategy>) -> Self {
        Self {
            transform,
            strategy,
        }
    }
}

/// Runs update suites against workload sets in one store.
pub struct RolloutController {
    store: Arc<dyn WorkloadStore>,
    gates: RolloutGates,
}

impl RolloutController {
    pub fn new(store: Arc<dyn WorkloadStore>, gates: RolloutGates) -> Self {
        Self { store, gates }
    }

    /// Roll `suite` out to the workload set `id`.
    ///
    /// Nothing is written if the workload set cannot be read or the
    /// transform fails.
    pub async fn run(
        &self,
        id: &WorkloadId,
        suite: &UpdateSuite,
        shutdown: Shutdown,
    ) -> RolloutOutcome {
        let span = info_span!("rollout", namespace = %id.namespace, name = %id.name);
        self.run_inner(id, suite, shutdown).instrument(span).await
    }

    async fn run_inner(
        &self,
        id: &WorkloadId,
        suite: &UpdateSuite,
        shutdown: Shutdown,
    ) -> RolloutOutcome {
        let current = match self.store.get(id).await {
            Ok(w) => w,
            Err(e) => return RolloutOutcome::failed(false, classify(e, id).into()),
        };

        let desired = match suite.transform.apply(current) {
            Ok(w) => w,
            Err(source) => {
                let err = RolloutError::Transform {
                    namespace: id.namespace.clone(),
                    name: id.name.clone(),
                    source,
                };
                error!(error = %err, "transform failed");
                return RolloutOutcome::failed(false, err);
            }
        };
        info!(
            replicas = desired.spec.replicas,
            revision = %desired.update_revision(),
            "starting rollout"
        );

        let mut ctx = RolloutContext::new(self.store.clone(), desired, id.clone(), shutdown);
        let outcome = suite.strategy.roll_out(&mut ctx, &self.gates).await;

        match outcome.result {
            Ok(()) => {
                info!(skip_sleep = outcome.skip_sleep, "rollout complete");
                RolloutOutcome::completed(outcome.skip_sleep)
            }
            Err(err) => {
                let err = err.in_strategy(id);
                error!(error = %err, ordinal = ?err.ordinal(), "rollout failed");
                RolloutOutcome::failed(outcome.skip_sleep, err)
            }
        }
    }
}
