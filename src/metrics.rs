//! Prometheus metrics for detection latency and search volume.
//!
//! Metrics go through the `metrics` facade, so every recording function is a
//! no-op until a recorder is installed (see [`install_prometheus`]).

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::{debug, info};

// === Metric Name Constants ===

/// Opportunity detection latency metric name.
pub const METRIC_OPPORTUNITY_DETECTION_LATENCY: &str = "opportunity_detection_latency_ms";
/// Per-market scan latency metric name.
pub const METRIC_MARKET_SCAN_LATENCY: &str = "market_scan_latency_ms";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Combinations evaluated counter metric name.
pub const METRIC_COMBINATIONS_EVALUATED: &str = "combinations_evaluated_total";
/// Rejected quotes counter metric name.
pub const METRIC_QUOTES_REJECTED: &str = "quotes_rejected_total";
/// Budget exceeded counter metric name.
pub const METRIC_BUDGET_EXCEEDED: &str = "budget_exceeded_total";
/// Stake plans counter metric name.
pub const METRIC_STAKE_PLANS: &str = "stake_plans_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(
        METRIC_OPPORTUNITY_DETECTION_LATENCY,
        "Time to search one odds book in milliseconds"
    );
    describe_histogram!(
        METRIC_MARKET_SCAN_LATENCY,
        "Time to scan one market including conversion in milliseconds"
    );

    // Counters
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of arbitrage opportunities detected"
    );
    describe_counter!(
        METRIC_COMBINATIONS_EVALUATED,
        "Total number of candidate quotes examined during enumeration"
    );
    describe_counter!(
        METRIC_QUOTES_REJECTED,
        "Total number of quotes dropped for a missing or unusable price"
    );
    describe_counter!(
        METRIC_BUDGET_EXCEEDED,
        "Total number of enumerations stopped by their budget"
    );
    describe_counter!(METRIC_STAKE_PLANS, "Total number of stake plans computed");

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder with an HTTP scrape endpoint on `port`.
///
/// Must be called from within a Tokio runtime.
pub fn install_prometheus(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Add to the opportunities detected counter.
pub fn add_opportunities_detected(count: u64) {
    counter!(METRIC_OPPORTUNITIES_DETECTED).increment(count);
}

/// Add to the combinations evaluated counter.
pub fn add_combinations_evaluated(count: u64) {
    counter!(METRIC_COMBINATIONS_EVALUATED).increment(count);
}

/// Add to the rejected quotes counter.
pub fn add_quotes_rejected(count: u64) {
    counter!(METRIC_QUOTES_REJECTED).increment(count);
}

/// Increment budget exceeded counter.
pub fn inc_budget_exceeded() {
    counter!(METRIC_BUDGET_EXCEEDED).increment(1);
}

/// Increment stake plans counter.
pub fn inc_stake_plans() {
    counter!(METRIC_STAKE_PLANS).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for opportunity detection.
pub fn timer_opportunity_detection() -> LatencyTimer {
    LatencyTimer::new(METRIC_OPPORTUNITY_DETECTION_LATENCY)
}

/// Create a latency timer for a market scan.
pub fn timer_market_scan() -> LatencyTimer {
    LatencyTimer::new(METRIC_MARKET_SCAN_LATENCY)
}
