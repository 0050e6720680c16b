//! Metrics for gateway operations.

use std::time::Instant;

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::Operation;

/// Latency and error instruments, labelled by operation and backend.
#[derive(Clone)]
pub struct GatewayMetrics {
    pub operations: Histogram<f64>,
    pub errors: Counter<u64>,
}

impl GatewayMetrics {
    pub fn new(meter: &Meter) -> Self {
        let operations = meter
            .f64_histogram("storage_gateway_operation_duration_seconds")
            .with_description("Duration of storage gateway operations in seconds")
            .build();

        let errors = meter
            .u64_counter("storage_gateway_errors_total")
            .with_description("Total number of storage gateway errors")
            .build();

        Self { operations, errors }
    }

    pub fn labels(operation: Operation, backend: &'static str) -> [KeyValue; 2] {
        [
            KeyValue::new("op", operation.as_ref().to_string()),
            KeyValue::new("backend", backend),
        ]
    }

    /// Time an operation; the latency is recorded when the guard drops.
    pub fn timer(&self, operation: Operation, backend: &'static str) -> Timer {
        Timer {
            start: Instant::now(),
            histogram: self.operations.clone(),
            labels: Self::labels(operation, backend),
        }
    }

    pub fn record_error(&self, operation: Operation, backend: &'static str) {
        self.errors.add(1, &Self::labels(operation, backend));
    }
}

pub struct Timer {
    start: Instant,
    histogram: Histogram<f64>,
    labels: [KeyValue; 2],
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.histogram
            .record(self.start.elapsed().as_secs_f64(), &self.labels);
    }
}
