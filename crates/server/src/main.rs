//! crawl-cache entry point.
//!
//! Consumes crawl requests from nsqd, or as JSON envelopes on stdin when no
//! nsqd or nsqlookupd address is configured. Requests not seen within the
//! retention window are forwarded to nsqd and recorded in the dedup cache.
//! Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use crawl_cache_client::{
    ConsumerSettings, LineSource, NsqConfig, NsqPublisher, NsqSubscription, SourceSettings, SourceStats,
    validate_channel, validate_topic,
};
use crawl_cache_core::config::AppConfig;
use crawl_cache_core::{DedupCache, Publisher};
use tokio::io::BufReader;
use tokio::signal;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

mod handler;
mod workers;

use handler::DedupHandler;
use workers::WorkerReport;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid log_level {:?}", config.log_level))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let routes = config.require_topics()?;
    for route in &routes {
        validate_topic(&route.read).with_context(|| format!("route {route}"))?;
        validate_topic(&route.write).with_context(|| format!("route {route}"))?;
    }

    let cache = DedupCache::open_with(&config.cache_path, config.cache_options())
        .await
        .with_context(|| format!("failed to open dedup cache at {}", config.cache_path.display()))?;
    let cache = Arc::new(cache);

    tracing::info!(
        cache_path = %config.cache_path.display(),
        ttl_secs = cache.ttl().as_secs(),
        routes = routes.len(),
        workers = config.workers,
        "starting crawl-cache"
    );

    let publisher: Arc<dyn Publisher> = Arc::new(NsqPublisher::new(NsqConfig {
        http_addr: config.nsqd_http_addr.clone(),
        timeout: config.publish_timeout(),
        user_agent: config.user_agent.clone(),
    })?);

    let mut workers = JoinSet::new();
    let outcome = if config.consumes_nsq() {
        validate_channel(&config.channel).context("invalid channel")?;
        let settings = ConsumerSettings {
            channel: config.channel.clone(),
            nsqd_tcp_addrs: config.nsqd_tcp_addrs.clone(),
            nsqlookupd_addrs: config.nsqlookupd_addrs.clone(),
            max_in_flight: config.max_in_flight(),
            max_attempts: config.max_attempts,
            requeue_delay: config.requeue_delay(),
        };
        for (index, route) in routes.iter().enumerate() {
            let subscription =
                NsqSubscription::connect(&route.read, &settings).with_context(|| format!("route {route}"))?;
            let handler = DedupHandler::new(cache.clone(), publisher.clone(), route.write.clone());
            tracing::info!(route = %route, workers = config.workers, channel = %config.channel, "route registered");
            workers::spawn_route(&mut workers, index, &handler, &subscription, config.workers);
        }

        tokio::select! {
            () = drain(&mut workers) => {
                tracing::warn!("all nsq consumers stopped");
                None
            }
            _ = signal::ctrl_c() => {
                tracing::info!("interrupted, stopping workers");
                None
            }
        }
    } else {
        let mut source = LineSource::new(SourceSettings {
            max_attempts: config.max_attempts,
            requeue_delay: config.requeue_delay(),
            queue_capacity: config.queue_capacity(),
        });
        for (index, route) in routes.iter().enumerate() {
            let subscription = source.subscribe(&route.read);
            let handler = DedupHandler::new(cache.clone(), publisher.clone(), route.write.clone());
            tracing::info!(route = %route, workers = config.workers, "route registered on stdin");
            workers::spawn_route(&mut workers, index, &handler, &subscription, config.workers);
        }

        let run = async {
            let stats = source.run(BufReader::new(tokio::io::stdin())).await?;
            drain(&mut workers).await;
            anyhow::Ok(stats)
        };

        tokio::select! {
            result = run => Some(result),
            _ = signal::ctrl_c() => {
                tracing::info!("interrupted, stopping workers");
                None
            }
        }
    };
    workers.shutdown().await;

    match Arc::try_unwrap(cache) {
        Ok(cache) => {
            if let Err(e) = cache.close().await {
                tracing::error!(error = %e, "failed to close dedup cache");
            }
        }
        Err(cache) => {
            if let Err(e) = cache.store().close().await {
                tracing::error!(error = %e, "failed to close dedup cache");
            }
        }
    }

    finish(outcome)
}

/// Wait for every worker to exit.
async fn drain(workers: &mut JoinSet<WorkerReport>) {
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(report) => tracing::debug!(route = report.route, handled = report.handled, "worker finished"),
            Err(e) => tracing::error!(error = %e, "worker task failed"),
        }
    }
}

fn finish(outcome: Option<Result<SourceStats>>) -> Result<()> {
    match outcome {
        Some(Ok(stats)) => {
            tracing::info!(
                read = stats.read,
                dispatched = stats.dispatched,
                dropped = stats.dropped,
                "shutdown complete"
            );
            Ok(())
        }
        Some(Err(e)) => Err(e.context("message source failed")),
        None => Ok(()),
    }
}
