use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub claims_total: IntCounterVec,
    pub batch_transitions_total: IntCounterVec,
    pub handoff_validations_total: IntCounterVec,
    pub active_batches: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let claims_total = IntCounterVec::new(
            Opts::new("claims_total", "Order claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid claims_total metric");

        let batch_transitions_total = IntCounterVec::new(
            Opts::new("batch_transitions_total", "Batch transitions by target state"),
            &["to"],
        )
        .expect("valid batch_transitions_total metric");

        let handoff_validations_total = IntCounterVec::new(
            Opts::new(
                "handoff_validations_total",
                "Verification code validations by outcome",
            ),
            &["outcome"],
        )
        .expect("valid handoff_validations_total metric");

        let active_batches = IntGauge::new("active_batches", "Batches in a non-terminal state")
            .expect("valid active_batches metric");

        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(batch_transitions_total.clone()))
            .expect("register batch_transitions_total");
        registry
            .register(Box::new(handoff_validations_total.clone()))
            .expect("register handoff_validations_total");
        registry
            .register(Box::new(active_batches.clone()))
            .expect("register active_batches");

        Self {
            registry,
            claims_total,
            batch_transitions_total,
            handoff_validations_total,
            active_batches,
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
