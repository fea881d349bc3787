use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("slack_events_statds")
        .with_description("Slack events receiver statistics")
        .with_unit("request")
        .build()
});

fn incr_statds(metric: &'static str, value: &str) {
    STATDS.add(1, &[KeyValue::new(metric, value.to_string())]);
}

/// Counts how each request ended: `challenge`, `event`, `rejected`, `not_found`
pub fn incr_request_statds(outcome: &str) {
    incr_statds("request_outcome", outcome)
}

pub fn incr_handler_statds(outcome: &str) {
    incr_statds("handler", outcome)
}
