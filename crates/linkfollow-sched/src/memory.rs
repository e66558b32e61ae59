use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use crate::contract::{TriggerBackend, TriggerPeriod};

/// In-memory trigger backend for tests and dry runs. Not durable, but
/// faithful to the contract: install/remove/exists are idempotent.
#[derive(Default)]
pub struct MemoryTriggerBackend {
    installed: Mutex<HashMap<String, TriggerPeriod>>,
}

impl MemoryTriggerBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed_count(&self) -> usize {
        self.installed.lock().unwrap().len()
    }

    pub fn period_of(&self, signature: &str) -> Option<TriggerPeriod> {
        self.installed.lock().unwrap().get(signature).copied()
    }
}

impl TriggerBackend for MemoryTriggerBackend {
    fn install(&self, signature: &str, period: TriggerPeriod) -> Result<()> {
        self.installed
            .lock()
            .unwrap()
            .insert(signature.to_string(), period);
        Ok(())
    }

    fn remove(&self, signature: &str) -> Result<()> {
        self.installed.lock().unwrap().remove(signature);
        Ok(())
    }

    fn exists(&self, signature: &str) -> Result<bool> {
        Ok(self.installed.lock().unwrap().contains_key(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_remove_exists_are_idempotent() {
        let backend = MemoryTriggerBackend::new();
        assert!(!backend.exists("lf push").unwrap());

        backend.install("lf push", TriggerPeriod::EveryMinutes(1)).unwrap();
        backend.install("lf push", TriggerPeriod::EveryMinutes(1)).unwrap();
        assert!(backend.exists("lf push").unwrap());
        assert_eq!(backend.installed_count(), 1);

        backend.remove("lf push").unwrap();
        backend.remove("lf push").unwrap();
        assert!(!backend.exists("lf push").unwrap());
    }
}
