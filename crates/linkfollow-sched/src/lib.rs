pub mod contract;
pub mod crontab;
pub mod memory;
pub mod scheduler;

pub use contract::{TriggerBackend, TriggerPeriod};
pub use crontab::CrontabBackend;
pub use memory::MemoryTriggerBackend;
pub use scheduler::{AdaptiveScheduler, SyncAction};
