//! Metrics infrastructure for the DA16K AT command driver.
//!
//! Every metric the driver records is declared here once, as a [`Metric`]
//! constant carrying its kind, unit, description and label keys. Recording
//! sites refer to the constant's name instead of repeating string literals.
//!
//! Nothing is exported unless the application installs a recorder; without one
//! all recording calls are no-ops.
//!
//! # Example
//!
//! ```rust,ignore
//! use da16k_metrics::{metric_defs, describe_metrics};
//!
//! describe_metrics();
//!
//! metrics::counter!(metric_defs::AT_COMMANDS_SENT.name).increment(1);
//! ```
//!
//! # Metric Type
//!
//! ```rust
//! use da16k_metrics::{Metric, MetricKind};
//! use metrics::Unit;
//!
//! const MY_COUNTER: Metric = Metric::counter("my.counter")
//!     .with_description("A counter metric")
//!     .with_unit(Unit::Count)
//!     .with_labels(&["outcome"]);
//!
//! assert_eq!(MY_COUNTER.kind, MetricKind::Counter);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, kind and metadata of one driver metric.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted metric name, e.g. `da16k.at.commands_sent`.
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys the metric is recorded with.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Metric {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register the description (and unit, if any) with the installed recorder.
    pub fn describe(&self) {
        let name = self.name;
        let description = self.description;
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, description),
            (MetricKind::Counter, None) => describe_counter!(name, description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(name, unit, description),
            (MetricKind::Gauge, None) => describe_gauge!(name, description),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, description),
            (MetricKind::Histogram, None) => describe_histogram!(name, description),
        }
    }
}

/// All metric definitions for the driver.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Standard Label Keys
    // ========================================================================

    /// Label carrying the classified transaction outcome
    /// (`success`, `error_code`, `no_ok`, `timeout`, ...).
    pub const OUTCOME_LABELS: &[&str] = &["outcome"];

    // ========================================================================
    // Transport / Line Layer
    // ========================================================================

    /// Bytes handed to the transport.
    pub const AT_TX_BYTES: Metric = Metric::counter("da16k.at.tx_bytes")
        .with_description("Bytes written to the module")
        .with_unit(Unit::Bytes);

    /// Bytes received from the transport.
    pub const AT_RX_BYTES: Metric = Metric::counter("da16k.at.rx_bytes")
        .with_description("Bytes read from the module")
        .with_unit(Unit::Bytes);

    /// Complete CRLF-terminated lines received.
    pub const AT_LINES_RECEIVED: Metric = Metric::counter("da16k.at.lines_received")
        .with_description("Complete response lines received")
        .with_unit(Unit::Count);

    /// Lines that did not fit the receive buffer.
    pub const AT_LINE_OVERFLOWS: Metric = Metric::counter("da16k.at.line_overflows")
        .with_description("Response lines exceeding the receive buffer")
        .with_unit(Unit::Count);

    /// Per-byte receive timeouts.
    pub const AT_TIMEOUTS: Metric = Metric::counter("da16k.at.timeouts")
        .with_description("Receive timeouts while waiting for the module")
        .with_unit(Unit::Count);

    // ========================================================================
    // Transaction Layer
    // ========================================================================

    /// Terminated AT commands written.
    pub const AT_COMMANDS_SENT: Metric = Metric::counter("da16k.at.commands_sent")
        .with_description("AT commands sent (CRLF terminated)")
        .with_unit(Unit::Count);

    /// Classified responses.
    ///
    /// Labels: outcome
    pub const AT_TRANSACTIONS: Metric = Metric::counter("da16k.at.transactions")
        .with_description("Classified AT responses by outcome")
        .with_unit(Unit::Count)
        .with_labels(OUTCOME_LABELS);

    /// Time spent classifying a response.
    pub const AT_TRANSACTION_TIME: Metric = Metric::histogram("da16k.at.transaction_time_ms")
        .with_description("Wall-clock time spent waiting for a classified response")
        .with_unit(Unit::Milliseconds);

    // ========================================================================
    // Telemetry / Device Layer
    // ========================================================================

    /// Bulk message batches finalized.
    pub const BULK_BATCHES: Metric = Metric::counter("da16k.bulk.batches")
        .with_description("Bulk telemetry commands finalized")
        .with_unit(Unit::Count);

    /// Telemetry tuples written.
    pub const BULK_TUPLES: Metric = Metric::counter("da16k.bulk.tuples")
        .with_description("Telemetry tuples written to the module")
        .with_unit(Unit::Count);

    /// Size of each telemetry message in tuples.
    pub const BULK_MESSAGE_SIZE: Metric = Metric::histogram("da16k.bulk.message_size")
        .with_description("Tuples per telemetry message")
        .with_unit(Unit::Count);

    /// Cloud-to-device commands fetched.
    pub const COMMANDS_RECEIVED: Metric = Metric::counter("da16k.cmd.received")
        .with_description("Cloud-to-device commands received")
        .with_unit(Unit::Count);

    /// Whether an IoTConnect session was last started successfully (1) or stopped (0).
    pub const IOTC_CONNECTED: Metric = Metric::gauge("da16k.iotc.connected")
        .with_description("IoTConnect session state as last commanded");

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &AT_TX_BYTES,
        &AT_RX_BYTES,
        &AT_LINES_RECEIVED,
        &AT_LINE_OVERFLOWS,
        &AT_TIMEOUTS,
        &AT_COMMANDS_SENT,
        &AT_TRANSACTIONS,
        &AT_TRANSACTION_TIME,
        &BULK_BATCHES,
        &BULK_TUPLES,
        &BULK_MESSAGE_SIZE,
        &COMMANDS_RECEIVED,
        &IOTC_CONNECTED,
    ];
}

/// Describes all metrics used by the driver.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Installs a Prometheus exporter listening on `addr` and describes all metrics.
#[cfg(feature = "prometheus")]
pub fn install_prometheus_exporter(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::AT_COMMANDS_SENT.name, "da16k.at.commands_sent");
        assert_eq!(metric_defs::AT_COMMANDS_SENT.kind, MetricKind::Counter);
        assert_eq!(metric_defs::AT_TRANSACTIONS.labels, &["outcome"]);
        assert_eq!(metric_defs::AT_TRANSACTION_TIME.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::AT_TRANSACTION_TIME.unit, Some(Unit::Milliseconds));
        assert_eq!(metric_defs::IOTC_CONNECTED.kind, MetricKind::Gauge);
    }

    #[test]
    fn test_all_metrics_count() {
        assert_eq!(metric_defs::ALL.len(), 13);
    }

    #[test]
    fn test_metric_names_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::counter("minimal");

        assert_eq!(MINIMAL.name, "minimal");
        assert_eq!(MINIMAL.kind, MetricKind::Counter);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert_eq!(MINIMAL.labels, &[] as &[&str]);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
    }

    #[test]
    fn test_describe_without_recorder() {
        // No recorder installed: describing must be a silent no-op.
        describe_metrics();
    }
}
