//! The store surface the rollout core talks to.
//!
//! Only get and update-with-conflict-detection are exposed; anything that
//! implements [`WorkloadStore`] can stand in for the redb store.

use async_trait::async_trait;

use crate::error::{StateError, StateResult};
use crate::store::StateStore;
use crate::types::{WorkloadId, WorkloadSet};

/// Get/update access to workload sets.
///
/// `get` fails with [`StateError::NotFound`] when the set does not exist;
/// `update` fails with [`StateError::Conflict`] when the caller's
/// `resource_version` is stale.
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    async fn get(&self, id: &WorkloadId) -> StateResult<WorkloadSet>;

    async fn update(&self, workload: &WorkloadSet) -> StateResult<WorkloadSet>;
}

#[async_trait]
impl WorkloadStore for StateStore {
    async fn get(&self, id: &WorkloadId) -> StateResult<WorkloadSet> {
        self.get_workload(id)?
            .ok_or_else(|| StateError::NotFound(id.table_key()))
    }

    async fn update(&self, workload: &WorkloadSet) -> StateResult<WorkloadSet> {
        self.update_workload(workload)
    }
}
