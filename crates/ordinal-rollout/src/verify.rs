//! Replica verification against reported template revisions.

use anyhow::{Context, bail};
use async_trait::async_trait;
use tracing::trace;

use crate::capability::ReplicaVerifier;
use crate::context::RolloutContext;

/// A replica is converged once it reports the desired template's revision
/// and is ready.
///
/// The desired revision comes from the context's working copy; the replica
/// status is always read fresh from the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevisionVerifier;

#[async_trait]
impl ReplicaVerifier for RevisionVerifier {
    async fn verify(&self, ctx: &RolloutContext, ordinal: u32) -> anyhow::Result<()> {
        let want = ctx.workload.update_revision();
        let latest = ctx
            .store
            .get(&ctx.id)
            .await
            .with_context(|| format!("reading {} to verify ordinal {ordinal}", ctx.id))?;

        let Some(replica) = latest.status.replica(ordinal) else {
            bail!("replica {ordinal} of {} has not reported status", ctx.id);
        };
        if replica.revision != want {
            bail!(
                "replica {ordinal} of {} runs revision {}, want {want}",
                ctx.id,
                replica.revision
            );
        }
        if !replica.ready {
            bail!("replica {ordinal} of {} is not ready", ctx.id);
        }
        trace!(id = %ctx.id, ordinal, revision = %want, "replica verified");
        Ok(())
    }
}
