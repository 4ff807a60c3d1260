//! Chart input from query results, with seeded sample data as a fallback.

use crate::models::{ChartData, ChartKind, ChartSource, QueryResult, Record};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// Days covered by the time-series samples.
pub const SAMPLE_DAYS: i64 = 30;

/// Size of the sample fleet.
pub const SAMPLE_FLEET_SIZE: usize = 5;

/// States a sample bot can be in.
pub const BOT_STATES: [&str; 3] = ["IDLE", "MOVING", "CHARGING"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn seed(kind: ChartKind) -> u64 {
    match kind {
        ChartKind::Faults => 0x6661_756c_7473,
        ChartKind::Jobs => 0x6a6f_6273,
        ChartKind::Bots => 0x626f_7473,
    }
}

/// Chart input for `kind`.
///
/// A non-empty result is passed through row for row, without reshaping.
/// Otherwise the chart gets sample data, identical for the same `now`.
pub fn chart_data(kind: ChartKind, result: Option<&QueryResult>, now: DateTime<Utc>) -> ChartData {
    match result {
        Some(result) if !result.is_empty() => {
            ChartData { kind, source: ChartSource::Live, rows: result.records() }
        }
        _ => {
            tracing::debug!(chart = %kind, "No rows, using sample data");
            ChartData { kind, source: ChartSource::Sample, rows: sample_rows(kind, now) }
        }
    }
}

/// Seeded sample rows for `kind`.
pub fn sample_rows(kind: ChartKind, now: DateTime<Utc>) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed(kind));
    match kind {
        ChartKind::Faults => daily_series(now, |_| json!({ "count": rng.gen_range(0..=10) })),
        ChartKind::Jobs => daily_series(now, |_| {
            json!({
                "completed": rng.gen_range(50..=100),
                "failed": rng.gen_range(0..=20),
            })
        }),
        ChartKind::Bots => (1..=SAMPLE_FLEET_SIZE)
            .map(|id| {
                let state = BOT_STATES[rng.gen_range(0..BOT_STATES.len())];
                record(json!({
                    "id": id,
                    "name": format!("bot-{id:02}"),
                    "position_x": round2(rng.gen_range(0.0..100.0)),
                    "position_y": round2(rng.gen_range(0.0..100.0)),
                    "battery_soc": rng.gen_range(0..=100),
                    "state": state,
                }))
            })
            .collect(),
    }
}

/// One point per day, oldest first, ending at `now`.
fn daily_series(now: DateTime<Utc>, mut values: impl FnMut(i64) -> Value) -> Vec<Record> {
    (0..SAMPLE_DAYS)
        .rev()
        .map(|days_ago| {
            let timestamp = (now - Duration::days(days_ago)).format(TIMESTAMP_FORMAT).to_string();
            let mut row = Record::new();
            row.insert("timestamp".to_string(), Value::String(timestamp));
            if let Value::Object(fields) = values(days_ago) {
                row.extend(fields);
            }
            row
        })
        .collect()
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
