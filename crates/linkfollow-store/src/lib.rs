pub mod checkpoint;
pub mod queue;

pub use checkpoint::CheckpointStore;
pub use queue::DirQueue;

pub fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let dur = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    dur.as_secs() as i64
}
