use anyhow::Result;
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server,
};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::net::SocketAddr;
use tracing::info;

#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsHandle {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn monitor_metrics(&self) -> Result<MonitorMetrics> {
        MonitorMetrics::register(&self.registry)
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let registry = self.registry.clone();
        let make_svc = make_service_fn(move |_| {
            let registry = registry.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |_req: Request<Body>| {
                    let registry = registry.clone();
                    async move {
                        let encoder = TextEncoder::new();
                        let metric_families = registry.gather();
                        let mut buffer = Vec::new();
                        encoder.encode(&metric_families, &mut buffer).unwrap();
                        Ok::<_, hyper::Error>(
                            Response::builder()
                                .status(200)
                                .header("Content-Type", encoder.format_type())
                                .body(Body::from(buffer))
                                .unwrap(),
                        )
                    }
                }))
            }
        });

        let server = Server::bind(&addr).serve(make_svc);
        info!(%addr, "metrics exporter listening");
        server.await?;
        Ok(())
    }
}

/// Counters bumped by the monitor loop.
#[derive(Clone)]
pub struct MonitorMetrics {
    pub cycles: IntCounter,
    pub fetch_failures: IntCounter,
    pub notifications: IntCounter,
    pub notification_failures: IntCounter,
}

impl MonitorMetrics {
    pub fn register(registry: &Registry) -> Result<Self> {
        let cycles = IntCounter::new("monitor_cycles_total", "Completed monitor cycles")?;
        let fetch_failures = IntCounter::new(
            "monitor_fetch_failures_total",
            "Page fetches that failed or timed out",
        )?;
        let notifications = IntCounter::new(
            "monitor_notifications_total",
            "Change notifications delivered",
        )?;
        let notification_failures = IntCounter::new(
            "monitor_notification_failures_total",
            "Change notifications that could not be delivered",
        )?;
        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(notifications.clone()))?;
        registry.register(Box::new(notification_failures.clone()))?;
        Ok(Self {
            cycles,
            fetch_failures,
            notifications,
            notification_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_register_and_gather() {
        let handle = MetricsHandle::new();
        let metrics = handle.monitor_metrics().expect("register counters");

        metrics.cycles.inc();
        metrics.cycles.inc();
        metrics.fetch_failures.inc();

        let families = handle.registry().gather();
        let cycles = families
            .iter()
            .find(|f| f.get_name() == "monitor_cycles_total")
            .expect("cycles family");
        assert_eq!(cycles.get_metric()[0].get_counter().get_value(), 2.0);
    }

    #[test]
    fn double_registration_is_an_error() {
        let handle = MetricsHandle::new();
        handle.monitor_metrics().expect("first registration");
        assert!(handle.monitor_metrics().is_err());
    }
}
