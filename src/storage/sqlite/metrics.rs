//! Metrics recording for store transactions.

use std::time::Instant;

/// Records count and latency of one store operation.
///
/// Emits `storage_operations_total` and `storage_operation_duration_ms`,
/// both labelled with the operation name and `success`/`error` status.
pub fn record_operation_metrics(operation: &'static str, start: Instant, status: &'static str) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder() {
        // No recorder is installed in tests; recording must be a no-op.
        record_operation_metrics("apply_review", Instant::now(), "success");
        record_operation_metrics("apply_review", Instant::now(), "error");
    }
}
