//! Per-route worker pool.

use crawl_cache_core::{KvStore, Subscription};
use tokio::task::JoinSet;

use crate::handler::DedupHandler;

/// Messages handled by one worker, reported when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub route: usize,
    pub handled: u64,
}

/// Spawn `count` workers pulling from `subscription` into `handler`.
///
/// Workers exit once the subscription is drained.
pub fn spawn_route<S, T>(
    set: &mut JoinSet<WorkerReport>, route: usize, handler: &DedupHandler<S>, subscription: &T, count: usize,
) where
    S: KvStore + 'static,
    T: Subscription,
{
    for worker in 0..count {
        let handler = handler.clone();
        let subscription = subscription.clone();

        set.spawn(async move {
            tracing::debug!(
                route,
                worker,
                read = subscription.topic(),
                write = handler.write_topic(),
                "worker started"
            );
            let mut handled = 0;
            while let Some(delivery) = subscription.next().await {
                handler.handle(delivery).await;
                handled += 1;
            }
            tracing::debug!(route, worker, handled, "worker stopped");
            WorkerReport { route, handled }
        });
    }
}
