//! Reservation metrics
//!
//! Recorded through the `metrics` facade; exported only when a recorder
//! (the Prometheus exporter) is installed by the binary.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use std::time::Duration;

/// Metric handles for the reservation core
///
/// # Metrics
///
/// * `reservation_orders_created_total` - Orders placed successfully
/// * `reservation_orders_rejected_total{reason}` - Failed order placements by error kind
/// * `reservation_orders_confirmed_total` - Orders confirmed
/// * `reservation_orders_cancelled_total` - Orders cancelled
/// * `reservation_units_reserved_total` - Stock units reserved by new orders
/// * `reservation_units_released_total` - Stock units released by cancellations
/// * `reservation_create_duration_seconds` - Order placement latency
/// * `reservation_pool_queue_depth` - Jobs waiting for a worker
#[derive(Clone)]
pub struct ReservationMetrics {
    orders_created: Counter,
    orders_confirmed: Counter,
    orders_cancelled: Counter,
    units_reserved: Counter,
    units_released: Counter,
    create_duration: Histogram,
    queue_depth: Gauge,
}

impl ReservationMetrics {
    pub fn new() -> Self {
        Self {
            orders_created: counter!("reservation_orders_created_total"),
            orders_confirmed: counter!("reservation_orders_confirmed_total"),
            orders_cancelled: counter!("reservation_orders_cancelled_total"),
            units_reserved: counter!("reservation_units_reserved_total"),
            units_released: counter!("reservation_units_released_total"),
            create_duration: histogram!("reservation_create_duration_seconds"),
            queue_depth: gauge!("reservation_pool_queue_depth"),
        }
    }

    pub fn order_created(&self, units: u64, elapsed: Duration) {
        self.orders_created.increment(1);
        self.units_reserved.increment(units);
        self.create_duration.record(elapsed.as_secs_f64());
    }

    pub fn order_rejected(&self, reason: &'static str, elapsed: Duration) {
        counter!("reservation_orders_rejected_total", "reason" => reason).increment(1);
        self.create_duration.record(elapsed.as_secs_f64());
    }

    pub fn order_confirmed(&self) {
        self.orders_confirmed.increment(1);
    }

    pub fn order_cancelled(&self, units_released: u64) {
        self.orders_cancelled.increment(1);
        self.units_released.increment(units_released);
    }

    pub fn job_queued(&self) {
        self.queue_depth.increment(1.0);
    }

    pub fn job_started(&self) {
        self.queue_depth.decrement(1.0);
    }
}

impl Default for ReservationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
