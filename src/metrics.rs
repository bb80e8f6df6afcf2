use crate::error::Result;
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub searches_started: IntCounter,
    pub searches_completed: IntCounter,
    pub searches_cancelled: IntCounter,
    pub books_searched: IntCounter,
    pub matches_found: IntCounter,
    pub pattern_errors: IntCounter,
    registry: Arc<Registry>,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        Ok(Metrics {
            searches_started: counter(&registry, "searches_started", "Search tasks started")?,
            searches_completed: counter(
                &registry,
                "searches_completed",
                "Search tasks that ran to completion",
            )?,
            searches_cancelled: counter(
                &registry,
                "searches_cancelled",
                "Search tasks cancelled before completion",
            )?,
            books_searched: counter(&registry, "books_searched", "Books scanned")?,
            matches_found: counter(&registry, "matches_found", "Hits attributed to chapters")?,
            pattern_errors: counter(
                &registry,
                "pattern_errors",
                "Books reported with an invalid query",
            )?,
            registry: Arc::new(registry),
        })
    }

    /// Prometheus text exposition of every counter.
    pub fn gather(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render() {
        let metrics = Metrics::new().unwrap();
        metrics.searches_started.inc();
        metrics.matches_found.inc_by(7);
        let text = metrics.gather().unwrap();
        assert!(text.contains("searches_started 1"));
        assert!(text.contains("matches_found 7"));
        assert!(text.contains("# HELP pattern_errors"));
    }
}
