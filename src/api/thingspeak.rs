use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::error::SensorWatchError;
use crate::model::{Reading, SampleWindow};

pub const THINGSPEAK_BASE_URL: &str = "https://api.thingspeak.com";

/// Matches the `results` parameter sent with every request; the provider
/// never returns more entries than this.
const RESULT_COUNT: usize = crate::model::WINDOW_CAP;

/// The source does not bound request latency; 10s keeps a stalled poll from
/// wedging the refresh loop for longer than the slowest allowed interval.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    feeds: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    // Missing or null timestamps drop the entry, not the batch.
    #[serde(default)]
    created_at: Option<String>,
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

pub struct ThingSpeakClient {
    http: Client,
    base_url: String,
    channel_id: String,
    api_key: String,
    field: u8,
}

impl ThingSpeakClient {
    pub fn new(
        base_url: impl Into<String>,
        channel_id: impl Into<String>,
        api_key: impl Into<String>,
        field: u8,
    ) -> Result<Self, SensorWatchError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            channel_id: channel_id.into(),
            api_key: api_key.into(),
            field,
        })
    }

    /// Fetches the most recent feed entries for the configured channel and
    /// field. Any non-success status is an error; individual entries that
    /// fail timestamp or numeric conversion are dropped, not errors.
    pub async fn fetch_window(&self) -> Result<SampleWindow, SensorWatchError> {
        let url = format!(
            "{}/channels/{}/fields/{}.json",
            self.base_url, self.channel_id, self.field
        );

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("results", &RESULT_COUNT.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SensorWatchError::BadStatus(status));
        }

        let body = decode_body(&resp.text().await?)?;
        let window = parse_feeds(body, self.field);

        debug!(
            "fetched {} readings for channel {} field {}",
            window.len(),
            self.channel_id,
            self.field
        );

        Ok(window)
    }
}

fn decode_body(body: &str) -> Result<FeedResponse, SensorWatchError> {
    Ok(serde_json::from_str(body)?)
}

/// Converts decoded feed entries into a window, silently dropping entries
/// whose timestamp or value does not parse.
fn parse_feeds(body: FeedResponse, field: u8) -> SampleWindow {
    let field_key = format!("field{}", field);

    let readings = body
        .feeds
        .into_iter()
        .filter_map(|entry| {
            let raw_ts = match entry.created_at.as_deref() {
                Some(ts) => ts,
                None => {
                    warn!("dropping entry without a timestamp");
                    return None;
                }
            };

            let timestamp = match DateTime::parse_from_rfc3339(raw_ts) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    warn!("dropping entry with bad timestamp '{}': {}", raw_ts, e);
                    return None;
                }
            };

            let value = entry.fields.get(&field_key).and_then(coerce_value)?;

            Some(Reading { timestamp, value })
        })
        .collect();

    SampleWindow::from_readings(readings)
}

/// ThingSpeak reports field values as strings, but numbers and nulls show
/// up in practice. Anything that does not coerce to a finite f64 is None.
fn coerce_value(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };

    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn decode(json: &str) -> FeedResponse {
        decode_body(json).unwrap()
    }

    #[test]
    fn parses_well_formed_feed_into_ordered_window() {
        let body = decode(
            r#"{
                "channel": {"id": 2737844},
                "feeds": [
                    {"created_at": "2024-01-01T00:00:00Z", "entry_id": 1, "field1": "10.5"},
                    {"created_at": "2024-01-01T00:01:00Z", "entry_id": 2, "field1": "30"},
                    {"created_at": "2024-01-01T00:02:00Z", "entry_id": 3, "field1": "75.25"}
                ]
            }"#,
        );

        let window = parse_feeds(body, 1);

        assert_eq!(window.len(), 3);
        assert_eq!(window.readings()[0].value, 10.5);
        assert_eq!(
            window.readings()[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(window.latest().unwrap().value, 75.25);
    }

    #[test]
    fn window_length_equals_count_of_numeric_entries() {
        let body = decode(
            r#"{"feeds": [
                {"created_at": "2024-01-01T00:00:00Z", "field1": "1.0"},
                {"created_at": "2024-01-01T00:01:00Z", "field1": "abc"},
                {"created_at": "2024-01-01T00:02:00Z", "field1": null},
                {"created_at": "2024-01-01T00:03:00Z", "field1": "2.0"},
                {"created_at": "2024-01-01T00:04:00Z", "field1": "NaN"}
            ]}"#,
        );

        let window = parse_feeds(body, 1);

        assert_eq!(window.len(), 2);
        assert_eq!(window.readings()[0].value, 1.0);
        assert_eq!(window.readings()[1].value, 2.0);
    }

    #[test]
    fn single_unparseable_entry_yields_empty_window() {
        let body = decode(
            r#"{"feeds": [{"created_at": "2024-01-01T00:00:00Z", "field1": "abc"}]}"#,
        );

        let window = parse_feeds(body, 1);

        assert!(window.is_empty());
    }

    #[test]
    fn entry_with_bad_timestamp_is_dropped() {
        let body = decode(
            r#"{"feeds": [
                {"created_at": "not-a-time", "field1": "5.0"},
                {"created_at": "2024-01-01T00:01:00Z", "field1": "6.0"}
            ]}"#,
        );

        let window = parse_feeds(body, 1);

        assert_eq!(window.len(), 1);
        assert_eq!(window.latest().unwrap().value, 6.0);
    }

    #[test]
    fn entry_with_missing_or_null_timestamp_does_not_abort_the_batch() {
        let body = decode(
            r#"{"feeds": [
                {"field1": "5.0"},
                {"created_at": null, "field1": "5.5"},
                {"created_at": "2024-01-01T00:01:00Z", "field1": "6.0"}
            ]}"#,
        );

        let window = parse_feeds(body, 1);

        assert_eq!(window.len(), 1);
        assert_eq!(window.latest().unwrap().value, 6.0);
    }

    #[test]
    fn malformed_body_is_a_json_error() {
        let result = decode_body("<html>503 Service Unavailable</html>");

        assert!(matches!(result, Err(SensorWatchError::JsonError(_))));
    }

    #[test]
    fn missing_feeds_array_is_an_empty_window() {
        let window = parse_feeds(decode(r#"{"channel": {"id": 1}}"#), 1);

        assert!(window.is_empty());
    }

    #[test]
    fn reads_the_configured_field_key_only() {
        let body = decode(
            r#"{"feeds": [
                {"created_at": "2024-01-01T00:00:00Z", "field1": "1.0", "field3": "9.0"}
            ]}"#,
        );

        let window = parse_feeds(body, 3);

        assert_eq!(window.len(), 1);
        assert_eq!(window.latest().unwrap().value, 9.0);
    }

    #[test]
    fn coerces_bare_json_numbers() {
        assert_eq!(coerce_value(&serde_json::json!(42)), Some(42.0));
        assert_eq!(coerce_value(&serde_json::json!("  7.5 ")), Some(7.5));
        assert_eq!(coerce_value(&serde_json::json!(null)), None);
        assert_eq!(coerce_value(&serde_json::json!("inf")), None);
    }
}
