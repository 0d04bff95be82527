use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref QUERY_COUNTER: CounterVec = register_counter_vec!(
        "order_queries_total",
        "Total number of order listings served",
        &["strategy", "status"]
    )
    .expect("metric cannot be created");

    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "order_query_duration_seconds",
        "Order listing duration in seconds",
        &["strategy"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");

    pub static ref QUERY_ROUND_TRIPS: HistogramVec = register_histogram_vec!(
        "order_query_round_trips",
        "Store round trips issued per order listing",
        &["strategy"],
        vec![1.0, 2.0, 3.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]
    )
    .expect("metric cannot be created");

    pub static ref VIEWS_ASSEMBLED: CounterVec = register_counter_vec!(
        "order_views_assembled_total",
        "Total number of order views produced",
        &["strategy"]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a finished listing
pub fn record_query(strategy: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    QUERY_COUNTER
        .with_label_values(&[strategy, status])
        .inc();
    QUERY_DURATION
        .with_label_values(&[strategy])
        .observe(duration_secs);
}

/// Record how much work a successful listing did against the store
pub fn record_fetch(strategy: &str, round_trips: usize, views: usize) {
    QUERY_ROUND_TRIPS
        .with_label_values(&[strategy])
        .observe(round_trips as f64);
    VIEWS_ASSEMBLED
        .with_label_values(&[strategy])
        .inc_by(views as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_query() {
        record_query("flat_row_regroup", true, 0.02);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("order_queries_total"));
        assert!(metrics.contains("order_query_duration_seconds"));
    }

    #[test]
    fn test_record_fetch() {
        record_fetch("batch_fetch", 3, 12);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("order_query_round_trips"));
        assert!(metrics.contains("order_views_assembled_total"));
    }
}
