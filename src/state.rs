use chrono::{Duration, NaiveDate};
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::batch::DeliveryBatch;
use crate::models::driver::Driver;
use crate::models::order::Order;
use crate::models::verification::{HandoffKind, VerificationCode};
use crate::models::zone::DeliveryZone;
use crate::notify::DispatchEvent;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub zones: DashMap<String, DeliveryZone>,
    pub orders: DashMap<Uuid, Order>,
    pub batches: DashMap<Uuid, DeliveryBatch>,
    pub drivers: DashMap<Uuid, Driver>,
    /// One slot per (order, handoff kind); reissue overwrites the slot.
    pub codes: DashMap<(Uuid, HandoffKind), VerificationCode>,
    batch_seq: DashMap<(String, NaiveDate), u32>,
    pub events_tx: broadcast::Sender<DispatchEvent>,
    pub metrics: Metrics,
    pub code_ttl: Duration,
    pub max_orders_per_batch: usize,
}

impl AppState {
    pub fn new(event_buffer_size: usize, code_ttl_secs: i64, max_orders_per_batch: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            zones: DashMap::new(),
            orders: DashMap::new(),
            batches: DashMap::new(),
            drivers: DashMap::new(),
            codes: DashMap::new(),
            batch_seq: DashMap::new(),
            events_tx,
            metrics: Metrics::new(),
            code_ttl: Duration::seconds(code_ttl_secs),
            max_orders_per_batch,
        }
    }

    /// Mints the next human-readable batch number for a zone+date,
    /// monotonic within that pair.
    pub fn next_batch_number(&self, zone_id: &str, date: NaiveDate) -> String {
        let mut seq = self
            .batch_seq
            .entry((zone_id.to_string(), date))
            .or_insert(0);
        *seq += 1;

        format!(
            "B-{}-{}-{:03}",
            zone_id.to_uppercase(),
            date.format("%Y%m%d"),
            *seq
        )
    }
}
