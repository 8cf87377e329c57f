//! Stock workload transforms.

use anyhow::bail;
use ordinal_state::WorkloadSet;

use crate::capability::WorkloadTransform;

/// Point every replica's template at a new image.
#[derive(Debug, Clone)]
pub struct SetImage {
    pub image: String,
}

impl SetImage {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl WorkloadTransform for SetImage {
    fn apply(&self, mut workload: WorkloadSet) -> anyhow::Result<WorkloadSet> {
        if self.image.trim().is_empty() {
            bail!("refusing to set an empty image");
        }
        workload.spec.template.image = self.image.clone();
        Ok(workload)
    }
}
