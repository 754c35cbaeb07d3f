//! InfluxDB v2 store implementation
//!
//! Writes use the line protocol with nanosecond precision; queries issue a
//! Flux `range`/`filter` pipeline and parse the CSV response. Transport
//! failures surface as recoverable store errors; the coordinator retains
//! its batch and retries.

use crate::config::StoreConfig;
use crate::error::{OscimonError, Result};
use crate::store::{ModeRecord, TimeRange, TimeSeriesStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP request timeout for store calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Store client speaking the InfluxDB v2 HTTP API
pub struct InfluxStore {
    client: reqwest::blocking::Client,
    config: StoreConfig,
}

impl InfluxStore {
    /// Create a client for the configured endpoint
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }
}

impl TimeSeriesStore for InfluxStore {
    fn write(&mut self, records: &[ModeRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let body = records
            .iter()
            .map(to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");
        let url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ns",
            self.config.url, self.config.org, self.config.bucket
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()?;
        if !response.status().is_success() {
            return Err(OscimonError::Store(format!(
                "write rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn query(&mut self, range: TimeRange, measurement: &str) -> Result<Vec<ModeRecord>> {
        let flux = format!(
            r#"from(bucket: "{}") |> range(start: {}, stop: {}) |> filter(fn: (r) => r._measurement == "{}")"#,
            self.config.bucket,
            range.start.to_rfc3339(),
            range.stop.to_rfc3339(),
            measurement
        );
        let url = format!("{}/api/v2/query?org={}", self.config.url, self.config.org);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.token))
            .header("Accept", "application/csv")
            .json(&serde_json::json!({ "query": flux, "type": "flux" }))
            .send()?;
        if !response.status().is_success() {
            return Err(OscimonError::Store(format!(
                "query rejected with status {}",
                response.status()
            )));
        }
        parse_query_csv(&response.text()?)
    }
}

/// Render one record as an InfluxDB line-protocol line
fn to_line_protocol(record: &ModeRecord) -> String {
    let mut line = escape_measurement(&record.measurement);
    for (key, value) in &record.tags {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }
    line.push(' ');
    let fields = record
        .fields
        .iter()
        .map(|(key, value)| format!("{}={}", escape_tag(key), value))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str(&fields);
    line.push(' ');
    let nanos = record.timestamp.timestamp_nanos_opt().unwrap_or(0);
    line.push_str(&nanos.to_string());
    line
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

/// Parse the CSV body of a Flux query response into records.
///
/// Each CSV row carries one field of one point; rows sharing a timestamp
/// are folded back into a single record.
fn parse_query_csv(body: &str) -> Result<Vec<ModeRecord>> {
    let mut header: Option<Vec<String>> = None;
    // Keyed by timestamp so multi-field points reassemble deterministically.
    let mut grouped: BTreeMap<DateTime<Utc>, ModeRecord> = BTreeMap::new();

    for raw_line in body.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() {
            // Table boundary; the next non-empty line is a fresh header.
            header = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let cells = split_csv_line(line);
        if header.is_none() {
            header = Some(cells);
            continue;
        }
        let Some(columns) = header.as_ref() else {
            continue;
        };

        let get = |name: &str| -> Option<&str> {
            columns
                .iter()
                .position(|c| c == name)
                .and_then(|i| cells.get(i))
                .map(|s| s.as_str())
        };

        let (Some(time), Some(value), Some(field), Some(measurement)) = (
            get("_time"),
            get("_value"),
            get("_field"),
            get("_measurement"),
        ) else {
            continue;
        };
        let timestamp = DateTime::parse_from_rfc3339(time)
            .map_err(|e| OscimonError::Store(format!("bad timestamp in response: {}", e)))?
            .with_timezone(&Utc);
        let value: f64 = value
            .parse()
            .map_err(|e| OscimonError::Store(format!("bad value in response: {}", e)))?;

        let record = grouped.entry(timestamp).or_insert_with(|| ModeRecord {
            timestamp,
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
        });
        record.fields.push((field.to_string(), value));

        for (i, column) in columns.iter().enumerate() {
            let reserved = column.is_empty()
                || column.starts_with('_')
                || column == "result"
                || column == "table";
            if reserved {
                continue;
            }
            if let Some(value) = cells.get(i) {
                if !record.tags.iter().any(|(k, _)| k == column) {
                    record.tags.push((column.clone(), value.clone()));
                }
            }
        }
    }

    Ok(grouped.into_values().collect())
}

/// Split one CSV line, honoring double-quoted cells
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                cells.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}
