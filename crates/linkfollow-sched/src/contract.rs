use anyhow::Result;

/// How often an installed trigger fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerPeriod {
    EveryMinutes(u32),
    EveryHours(u32),
}

/// A periodic-invocation mechanism the core only configures, never
/// runs. Triggers are identified by their command signature; all three
/// operations are idempotent, so re-applying a decision that already
/// holds changes nothing.
pub trait TriggerBackend {
    fn install(&self, signature: &str, period: TriggerPeriod) -> Result<()>;
    fn remove(&self, signature: &str) -> Result<()>;
    fn exists(&self, signature: &str) -> Result<bool>;
}
