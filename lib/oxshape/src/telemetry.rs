//! Telemetry contract: spans with attributes and named metrics.
//!
//! Operations open a span with [`Telemetry::start_span`], attach counts with
//! [`SpanGuard::set_attribute`] and report to an injected [`TelemetrySink`] when the
//! guard is finished or dropped. Every guard also enters a `tracing` span for its
//! lifetime, so log lines emitted inside an operation carry its name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::span::EnteredSpan;
use tracing::{debug, info_span, warn};

/// Value of a span attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A finished span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub name: String,
    pub category: String,
    pub success: bool,
    pub elapsed_ms: f64,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl SpanRecord {
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Receiver of telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn span_finished(&self, span: &SpanRecord);

    fn record_metric(&self, name: &str, value: f64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn span_finished(&self, _: &SpanRecord) {}

    fn record_metric(&self, _: &str, _: f64) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn span_finished(&self, span: &SpanRecord) {
        let attributes = span
            .attributes
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        if span.success {
            debug!(
                span = %span.name,
                category = %span.category,
                elapsed_ms = span.elapsed_ms,
                %attributes,
                "span finished"
            );
        } else {
            warn!(
                span = %span.name,
                category = %span.category,
                elapsed_ms = span.elapsed_ms,
                %attributes,
                "span failed"
            );
        }
    }

    fn record_metric(&self, name: &str, value: f64) {
        debug!(metric = name, value, "metric recorded");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct MetricSummary {
    count: u64,
    sum: f64,
}

/// Keeps every span and a running sum per metric, for inspection and export.
#[derive(Debug, Default)]
pub struct MetricsSink {
    spans: Mutex<Vec<SpanRecord>>,
    metrics: Mutex<BTreeMap<String, MetricSummary>>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every finished span, in completion order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        Self::lock(&self.spans).clone()
    }

    /// The last finished span with this name.
    pub fn span(&self, name: &str) -> Option<SpanRecord> {
        Self::lock(&self.spans)
            .iter()
            .rev()
            .find(|span| span.name == name)
            .cloned()
    }

    /// Sum of the values recorded for a metric.
    pub fn metric(&self, name: &str) -> Option<f64> {
        Self::lock(&self.metrics).get(name).map(|m| m.sum)
    }

    /// Number of values recorded for a metric.
    pub fn metric_count(&self, name: &str) -> u64 {
        Self::lock(&self.metrics).get(name).map_or(0, |m| m.count)
    }

    /// Forgets every span and metric.
    pub fn clear(&self) {
        Self::lock(&self.spans).clear();
        Self::lock(&self.metrics).clear();
    }

    /// Export metrics and span counts in Prometheus text format.
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();
        for (name, summary) in Self::lock(&self.metrics).iter() {
            let name = format!("oxshape_{}", sanitize(name));
            let _ = writeln!(output, "# TYPE {name} summary");
            let _ = writeln!(output, "{name}_sum {}", summary.sum);
            let _ = writeln!(output, "{name}_count {}", summary.count);
        }

        let mut spans = BTreeMap::<(String, bool), (u64, f64)>::new();
        for span in Self::lock(&self.spans).iter() {
            let entry = spans.entry((span.name.clone(), span.success)).or_default();
            entry.0 += 1;
            entry.1 += span.elapsed_ms;
        }
        if !spans.is_empty() {
            output.push_str("# TYPE oxshape_span_duration_ms summary\n");
        }
        for ((name, success), (count, sum)) in spans {
            let _ = writeln!(
                output,
                "oxshape_span_duration_ms_sum{{name=\"{name}\",success=\"{success}\"}} {sum}"
            );
            let _ = writeln!(
                output,
                "oxshape_span_duration_ms_count{{name=\"{name}\",success=\"{success}\"}} {count}"
            );
        }
        output
    }
}

impl TelemetrySink for MetricsSink {
    fn span_finished(&self, span: &SpanRecord) {
        Self::lock(&self.spans).push(span.clone());
    }

    fn record_metric(&self, name: &str, value: f64) {
        let mut metrics = Self::lock(&self.metrics);
        let summary = metrics.entry(name.to_owned()).or_default();
        summary.count += 1;
        summary.sum += value;
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Handle on an injected [`TelemetrySink`].
#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn TelemetrySink>,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    /// A handle discarding every event.
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    /// Opens a span. It is reported when the returned guard is finished or dropped.
    pub fn start_span(&self, name: &str, category: &str) -> SpanGuard {
        let entered = info_span!("operation", operation = name, category).entered();
        SpanGuard {
            sink: Arc::clone(&self.sink),
            record: Some(SpanRecord {
                name: name.to_owned(),
                category: category.to_owned(),
                success: true,
                elapsed_ms: 0.,
                attributes: BTreeMap::new(),
            }),
            start: Instant::now(),
            _entered: entered,
        }
    }

    pub fn record_metric(&self, name: &str, value: f64) {
        self.sink.record_metric(name, value);
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}

/// An open span.
#[must_use]
pub struct SpanGuard {
    sink: Arc<dyn TelemetrySink>,
    record: Option<SpanRecord>,
    start: Instant,
    _entered: EnteredSpan,
}

impl SpanGuard {
    pub fn set_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) {
        if let Some(record) = &mut self.record {
            record.attributes.insert(key.to_owned(), value.into());
        }
    }

    /// Marks the operation failed, keeping the error message as the `error` attribute.
    pub fn fail(&mut self, error: impl fmt::Display) {
        if let Some(record) = &mut self.record {
            record.success = false;
            record
                .attributes
                .insert("error".to_owned(), error.to_string().into());
        }
    }

    /// Reports the span now.
    pub fn finish(mut self) {
        self.report();
    }

    fn report(&mut self) {
        if let Some(mut record) = self.record.take() {
            record.elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.;
            self.sink.span_finished(&record);
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.report();
    }
}

impl fmt::Debug for SpanGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanGuard")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_reports_on_finish() {
        let sink = Arc::new(MetricsSink::new());
        let telemetry = Telemetry::new(Arc::<MetricsSink>::clone(&sink));
        let mut span = telemetry.start_span("compile", "shacl");
        span.set_attribute("rules_compiled", 4_usize);
        span.finish();

        let record = sink.span("compile").unwrap();
        assert!(record.success);
        assert_eq!(record.category, "shacl");
        assert_eq!(record.attribute("rules_compiled"), Some(&AttributeValue::Int(4)));
        assert!(record.elapsed_ms >= 0.);
    }

    #[test]
    fn test_span_reports_on_drop_once() {
        let sink = Arc::new(MetricsSink::new());
        let telemetry = Telemetry::new(Arc::<MetricsSink>::clone(&sink));
        {
            let mut span = telemetry.start_span("parse", "shacl");
            span.fail("bad input");
        }
        let spans = sink.spans();
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].success);
        assert_eq!(
            spans[0].attribute("error"),
            Some(&AttributeValue::Text("bad input".into()))
        );
    }

    #[test]
    fn test_metrics_accumulate() {
        let sink = MetricsSink::new();
        sink.record_metric("pipeline.failure", 1.);
        sink.record_metric("pipeline.failure", 1.);
        assert_eq!(sink.metric("pipeline.failure"), Some(2.));
        assert_eq!(sink.metric_count("pipeline.failure"), 2);
        assert_eq!(sink.metric("missing"), None);
    }

    #[test]
    fn test_prometheus_format() {
        let sink = MetricsSink::new();
        sink.record_metric("validation.violations", 3.);
        sink.span_finished(&SpanRecord {
            name: "validate".into(),
            category: "shacl".into(),
            success: true,
            elapsed_ms: 2.5,
            attributes: BTreeMap::new(),
        });
        let output = sink.to_prometheus_format();
        assert!(output.contains("oxshape_validation_violations_sum 3"));
        assert!(output.contains("oxshape_validation_violations_count 1"));
        assert!(output.contains(
            "oxshape_span_duration_ms_count{name=\"validate\",success=\"true\"} 1"
        ));
    }
}
