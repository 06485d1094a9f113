//! JSON log formatting.
//!
//! Every log line is a single flat JSON object on stdout:
//! `ts` (ISO-8601 UTC, millisecond precision), `level`, `trace_id`,
//! `job_id` and `stage` when the event carries them, `msg`, and any
//! remaining fields grouped under `meta`.

use std::fmt::{self, Write as _};

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::field::Field;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Field names promoted to top-level keys of each line.
const TOP_LEVEL_FIELDS: [&str; 3] = ["trace_id", "job_id", "stage"];

/// Event formatter producing the flat log-line schema.
pub struct JsonLineFormatter;

impl<S, N> FormatEvent<S, N> for JsonLineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let mut line = Map::new();
        line.insert(
            "ts".to_string(),
            json!(Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
        );
        line.insert(
            "level".to_string(),
            json!(event.metadata().level().to_string()),
        );
        for key in TOP_LEVEL_FIELDS {
            if let Some(value) = collector.fields.remove(key) {
                line.insert(key.to_string(), value);
            }
        }
        line.insert(
            "msg".to_string(),
            Value::String(collector.message.unwrap_or_default()),
        );
        if !collector.fields.is_empty() {
            line.insert("meta".to_string(), Value::Object(collector.fields));
        }

        writeln!(writer, "{}", Value::Object(line))
    }
}

/// Collects event fields, splitting the message off from the rest.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl tracing::field::Visit for FieldCollector {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, json!(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.push(field, json!(rendered));
        }
    }
}
