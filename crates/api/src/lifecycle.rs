use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleKind {
    AfterStart,
    BeforeStop,
}

/// A container lifecycle signal for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub deployment: String,
    pub kind: LifecycleKind,
}

impl LifecycleEvent {
    pub fn after_start(deployment: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            kind: LifecycleKind::AfterStart,
        }
    }

    pub fn before_stop(deployment: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            kind: LifecycleKind::BeforeStop,
        }
    }
}

/// Capability to receive lifecycle signals.
pub trait LifecycleListener: Send + Sync {
    fn lifecycle_event(&self, event: &LifecycleEvent);
}
