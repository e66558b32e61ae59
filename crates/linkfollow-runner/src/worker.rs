use anyhow::Result;
use linkfollow_core::{DeliveryError, DispatchOutcome, ResolveOutcome};
use linkfollow_net::FollowDelivery;
use linkfollow_sched::AdaptiveScheduler;
use linkfollow_store::DirQueue;
use tracing::{info, warn};

/// One dispatch tick: claim at most one ready item, attempt delivery,
/// classify the outcome, then converge the dispatch trigger with the
/// queue state. Exactly one attempt per invocation keeps the outbound
/// rate governed by the tick period, never by queue depth.
pub fn run_once(
    queue: &DirQueue,
    delivery: &dyn FollowDelivery,
    scheduler: &AdaptiveScheduler,
) -> Result<DispatchOutcome> {
    let outcome = match queue.dequeue()? {
        None => DispatchOutcome::Idle,
        Some(item) => match delivery.deliver(&item.payload) {
            Ok(()) => {
                queue.resolve_success(&item)?;
                info!(key = %item.key, "follow delivered");
                DispatchOutcome::Delivered { key: item.key }
            }
            Err(DeliveryError::Transport(msg)) => {
                warn!(key = %item.key, %msg, "delivery transport failure");
                let payload = item.payload.clone();
                match queue.resolve_retry(&item, payload)? {
                    ResolveOutcome::Requeued => DispatchOutcome::Requeued {
                        key: item.key,
                        attempt_errors: item.attempt_errors + 1,
                    },
                    ResolveOutcome::Abandoned => DispatchOutcome::Abandoned { key: item.key },
                }
            }
            Err(DeliveryError::Rejected(msg)) => {
                warn!(key = %item.key, %msg, "delivery rejected; not retrying");
                queue.resolve_abandon(&item)?;
                DispatchOutcome::Abandoned { key: item.key }
            }
        },
    };

    scheduler.sync(queue.is_empty()?)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkfollow_core::{ActorId, FollowRequest};
    use linkfollow_sched::{MemoryTriggerBackend, TriggerPeriod};
    use std::cell::Cell;
    use tempfile::tempdir;

    struct StubDelivery {
        failures_left: Cell<u32>,
        attempts: Cell<u32>,
    }

    impl StubDelivery {
        fn failing(n: u32) -> Self {
            Self {
                failures_left: Cell::new(n),
                attempts: Cell::new(0),
            }
        }

        fn ok() -> Self {
            Self::failing(0)
        }
    }

    impl FollowDelivery for StubDelivery {
        fn deliver(&self, _request: &FollowRequest) -> Result<(), DeliveryError> {
            self.attempts.set(self.attempts.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(DeliveryError::Transport("connection reset".into()));
            }
            Ok(())
        }
    }

    struct RejectingDelivery;

    impl FollowDelivery for RejectingDelivery {
        fn deliver(&self, _request: &FollowRequest) -> Result<(), DeliveryError> {
            Err(DeliveryError::Rejected("status 403".into()))
        }
    }

    fn scheduler() -> AdaptiveScheduler {
        AdaptiveScheduler::new(
            Box::new(MemoryTriggerBackend::new()),
            "linkfollow push",
            TriggerPeriod::EveryMinutes(1),
        )
    }

    fn enqueue(queue: &DirQueue, name: &str) {
        queue
            .enqueue(
                name,
                FollowRequest {
                    actor_id: ActorId::from_str(format!("id-{name}")),
                    actor_name: name.to_string(),
                    source_url: "http://x/a".to_string(),
                },
            )
            .unwrap();
    }

    #[test]
    fn idle_tick_removes_active_trigger() {
        let dir = tempdir().unwrap();
        let queue = DirQueue::open(dir.path()).unwrap();
        let sched = scheduler();
        sched.sync(false).unwrap(); // trigger left over from a drained queue

        let outcome = run_once(&queue, &StubDelivery::ok(), &sched).unwrap();
        assert_eq!(outcome, DispatchOutcome::Idle);
        assert!(!sched.backend().exists("linkfollow push").unwrap());
    }

    #[test]
    fn success_moves_item_to_done_and_drains_trigger() {
        let dir = tempdir().unwrap();
        let queue = DirQueue::open(dir.path()).unwrap();
        let sched = scheduler();
        enqueue(&queue, "carol");
        sched.sync(queue.is_empty().unwrap()).unwrap();
        assert!(sched.backend().exists("linkfollow push").unwrap());

        let outcome = run_once(&queue, &StubDelivery::ok(), &sched).unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { key: "carol".into() });
        assert!(queue.is_empty().unwrap());
        // the tick that emptied the queue also removed the trigger
        assert!(!sched.backend().exists("linkfollow push").unwrap());
    }

    #[test]
    fn transient_failures_requeue_then_abandon_at_budget() {
        let dir = tempdir().unwrap();
        let queue = DirQueue::open(dir.path()).unwrap();
        let sched = scheduler();
        enqueue(&queue, "alice");

        let delivery = StubDelivery::failing(10);
        assert_eq!(
            run_once(&queue, &delivery, &sched).unwrap(),
            DispatchOutcome::Requeued { key: "alice".into(), attempt_errors: 1 }
        );
        assert!(sched.backend().exists("linkfollow push").unwrap());
        assert_eq!(
            run_once(&queue, &delivery, &sched).unwrap(),
            DispatchOutcome::Requeued { key: "alice".into(), attempt_errors: 2 }
        );
        assert_eq!(
            run_once(&queue, &delivery, &sched).unwrap(),
            DispatchOutcome::Abandoned { key: "alice".into() }
        );
        assert_eq!(delivery.attempts.get(), 3);
        assert!(queue.is_empty().unwrap());
        assert!(!sched.backend().exists("linkfollow push").unwrap());

        // parked items never come back on their own
        assert_eq!(
            run_once(&queue, &delivery, &sched).unwrap(),
            DispatchOutcome::Idle
        );
        assert_eq!(delivery.attempts.get(), 3);
    }

    #[test]
    fn two_failures_then_success_end_in_done() {
        let dir = tempdir().unwrap();
        let queue = DirQueue::open(dir.path()).unwrap();
        let sched = scheduler();
        enqueue(&queue, "alice");

        let delivery = StubDelivery::failing(2);
        run_once(&queue, &delivery, &sched).unwrap();
        run_once(&queue, &delivery, &sched).unwrap();
        let outcome = run_once(&queue, &delivery, &sched).unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { key: "alice".into() });

        // no further attempts are made against a done item
        assert_eq!(
            run_once(&queue, &delivery, &sched).unwrap(),
            DispatchOutcome::Idle
        );
        assert_eq!(delivery.attempts.get(), 3);
    }

    #[test]
    fn rejection_parks_without_retry() {
        let dir = tempdir().unwrap();
        let queue = DirQueue::open(dir.path()).unwrap();
        let sched = scheduler();
        enqueue(&queue, "spam-target");

        let outcome = run_once(&queue, &RejectingDelivery, &sched).unwrap();
        assert_eq!(outcome, DispatchOutcome::Abandoned { key: "spam-target".into() });
        assert!(queue.is_empty().unwrap());
        assert_eq!(
            queue.count_bucket(linkfollow_core::ItemBucket::Error).unwrap(),
            1
        );
    }

    #[test]
    fn one_attempt_per_tick_even_with_deep_queue() {
        let dir = tempdir().unwrap();
        let queue = DirQueue::open(dir.path()).unwrap();
        let sched = scheduler();
        for name in ["a", "b", "c"] {
            enqueue(&queue, name);
        }

        let delivery = StubDelivery::ok();
        run_once(&queue, &delivery, &sched).unwrap();
        assert_eq!(delivery.attempts.get(), 1);
        assert_eq!(queue.count_ready().unwrap(), 2);
        assert!(sched.backend().exists("linkfollow push").unwrap());
    }
}
