use anyhow::Result;
use tracing::info;

use crate::contract::{TriggerBackend, TriggerPeriod};

/// What `sync` did to converge the trigger with queue state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    Installed,
    Removed,
    Unchanged,
}

/// Keeps exactly one periodic dispatch trigger installed while the
/// queue holds work, and none while it is empty. The rule is evaluated
/// after every discovery run and every dispatch tick, so the trigger is
/// self-limiting: it appears when work shows up and disappears once the
/// queue drains.
pub struct AdaptiveScheduler {
    backend: Box<dyn TriggerBackend>,
    signature: String,
    period: TriggerPeriod,
}

impl AdaptiveScheduler {
    pub fn new(backend: Box<dyn TriggerBackend>, signature: impl Into<String>, period: TriggerPeriod) -> Self {
        Self {
            backend,
            signature: signature.into(),
            period,
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn backend(&self) -> &dyn TriggerBackend {
        self.backend.as_ref()
    }

    /// Converge the trigger with the observed queue state. Idempotent:
    /// re-running in the correct state is a no-op.
    pub fn sync(&self, queue_empty: bool) -> Result<SyncAction> {
        let installed = self.backend.exists(&self.signature)?;
        if !queue_empty && !installed {
            self.backend.install(&self.signature, self.period)?;
            info!(signature = %self.signature, "installed dispatch trigger");
            return Ok(SyncAction::Installed);
        }
        if queue_empty && installed {
            self.backend.remove(&self.signature)?;
            info!(signature = %self.signature, "removed dispatch trigger");
            return Ok(SyncAction::Removed);
        }
        Ok(SyncAction::Unchanged)
    }
}
