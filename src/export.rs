use std::path::PathBuf;

use chrono::{Local, SecondsFormat};

use crate::error::SensorWatchError;
use crate::model::SampleWindow;

/// Serializes the window as `Timestamp,Value` CSV. Timestamps are RFC 3339
/// UTC, with sub-second precision kept when present; values use Rust's
/// shortest round-trippable float formatting.
pub fn to_csv(window: &SampleWindow) -> String {
    let mut out = String::from("Timestamp,Value\n");
    for reading in window.readings() {
        out.push_str(&reading.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        out.push(',');
        out.push_str(&reading.value.to_string());
        out.push('\n');
    }
    out
}

/// Writes the current window to a timestamped CSV file in the working
/// directory and returns its path.
pub fn write_snapshot(window: &SampleWindow) -> Result<PathBuf, SensorWatchError> {
    let path = PathBuf::from(format!(
        "sensorwatch-{}.csv",
        Local::now().format("%Y%m%d-%H%M%S")
    ));
    std::fs::write(&path, to_csv(window))?;
    Ok(path)
}
