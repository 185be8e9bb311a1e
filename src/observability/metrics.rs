use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub trips_requested_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub routing_failures_total: IntCounter,
    pub driver_claim_conflicts_total: IntCounter,
    pub active_simulations: IntGauge,
    pub trip_transitions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let trips_requested_total = IntCounterVec::new(
            Opts::new("trips_requested_total", "Trip requests by dispatch outcome"),
            &["outcome"],
        )
        .expect("valid trips_requested_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of trip dispatch in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let routing_failures_total = IntCounter::new(
            "routing_failures_total",
            "Routing oracle calls that failed or timed out",
        )
        .expect("valid routing_failures_total metric");

        let driver_claim_conflicts_total = IntCounter::new(
            "driver_claim_conflicts_total",
            "Driver claims lost to a concurrent dispatch",
        )
        .expect("valid driver_claim_conflicts_total metric");

        let active_simulations =
            IntGauge::new("active_simulations", "Motion simulations currently running")
                .expect("valid active_simulations metric");

        let trip_transitions_total = IntCounterVec::new(
            Opts::new("trip_transitions_total", "Applied trip transitions by target status"),
            &["to"],
        )
        .expect("valid trip_transitions_total metric");

        registry
            .register(Box::new(trips_requested_total.clone()))
            .expect("register trips_requested_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(routing_failures_total.clone()))
            .expect("register routing_failures_total");
        registry
            .register(Box::new(driver_claim_conflicts_total.clone()))
            .expect("register driver_claim_conflicts_total");
        registry
            .register(Box::new(active_simulations.clone()))
            .expect("register active_simulations");
        registry
            .register(Box::new(trip_transitions_total.clone()))
            .expect("register trip_transitions_total");

        Self {
            registry,
            trips_requested_total,
            dispatch_latency_seconds,
            routing_failures_total,
            driver_claim_conflicts_total,
            active_simulations,
            trip_transitions_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
