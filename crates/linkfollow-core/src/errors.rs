use thiserror::Error;

/// Failure from the follow-delivery collaborator. Transport failures
/// drive the retry state machine; anything else is fatal to the tick.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Failure from a discovery collaborator. Always fatal for the run;
/// the checkpoint must not advance past unprocessed events.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}
