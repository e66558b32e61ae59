/// Which bucket directory a queue record currently lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemBucket {
    Pending,
    Ready,
    Claimed,
    Done,
    Error,
}

impl ItemBucket {
    pub fn dir_name(self) -> &'static str {
        match self {
            ItemBucket::Pending => "pending",
            ItemBucket::Ready => "ready",
            ItemBucket::Claimed => "claimed",
            ItemBucket::Done => "done",
            ItemBucket::Error => "error",
        }
    }
}

/// Result of resolving a claimed item after a failed delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    Requeued,
    Abandoned,
}

/// Result of one dispatch tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing ready; no delivery attempted.
    Idle,
    Delivered { key: String },
    Requeued { key: String, attempt_errors: u32 },
    Abandoned { key: String },
}
