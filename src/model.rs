use chrono::{DateTime, Utc};

/// Maximum number of readings kept for display, matching the `results`
/// parameter sent to the provider.
pub const WINDOW_CAP: usize = 20;

/// One timestamped sample from the telemetry feed. `value` is always a
/// finite number; entries that fail numeric conversion never become
/// readings.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// The bounded, most-recent set of readings currently held for display.
///
/// Rebuilt wholesale on every poll; readings are kept in ascending
/// timestamp order as delivered by the provider (newest last).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleWindow {
    readings: Vec<Reading>,
}

impl SampleWindow {
    /// Builds a window from provider-ordered readings, keeping at most the
    /// `WINDOW_CAP` most recent ones.
    pub fn from_readings(mut readings: Vec<Reading>) -> Self {
        if readings.len() > WINDOW_CAP {
            readings.drain(..readings.len() - WINDOW_CAP);
        }
        Self { readings }
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Alert decision for the most recent reading in a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertState {
    /// Empty window; the threshold comparison is skipped entirely.
    NoData,
    /// Latest value is at or below the threshold.
    Nominal { latest: f64, threshold: f64 },
    /// Latest value is strictly above the threshold.
    Exceeded { latest: f64, threshold: f64 },
}

impl AlertState {
    /// Compares only the last reading against the threshold. Equality is
    /// nominal; only a strictly greater value raises the alert.
    pub fn evaluate(window: &SampleWindow, threshold: f64) -> Self {
        match window.latest() {
            None => AlertState::NoData,
            Some(reading) if reading.value > threshold => AlertState::Exceeded {
                latest: reading.value,
                threshold,
            },
            Some(reading) => AlertState::Nominal {
                latest: reading.value,
                threshold,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(secs: i64, value: f64) -> Reading {
        Reading {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            value,
        }
    }

    #[test]
    fn window_caps_to_most_recent_readings() {
        let readings: Vec<Reading> = (0..30).map(|i| reading(i, i as f64)).collect();
        let window = SampleWindow::from_readings(readings);

        assert_eq!(window.len(), WINDOW_CAP);
        assert_eq!(window.readings()[0].value, 10.0);
        assert_eq!(window.latest().unwrap().value, 29.0);
    }

    #[test]
    fn alert_raised_when_last_value_exceeds_threshold() {
        let window =
            SampleWindow::from_readings(vec![reading(1, 10.0), reading(2, 30.0), reading(3, 75.0)]);

        assert_eq!(
            AlertState::evaluate(&window, 50.0),
            AlertState::Exceeded {
                latest: 75.0,
                threshold: 50.0
            }
        );
    }

    #[test]
    fn alert_nominal_when_last_value_below_threshold() {
        let window =
            SampleWindow::from_readings(vec![reading(1, 10.0), reading(2, 30.0), reading(3, 20.0)]);

        assert_eq!(
            AlertState::evaluate(&window, 50.0),
            AlertState::Nominal {
                latest: 20.0,
                threshold: 50.0
            }
        );
    }

    #[test]
    fn alert_only_considers_last_reading() {
        // An earlier spike does not matter once the value comes back down.
        let window =
            SampleWindow::from_readings(vec![reading(1, 90.0), reading(2, 10.0)]);

        assert!(matches!(
            AlertState::evaluate(&window, 50.0),
            AlertState::Nominal { .. }
        ));
    }

    #[test]
    fn alert_boundary_is_strictly_greater_than() {
        let window = SampleWindow::from_readings(vec![reading(1, 50.0)]);

        assert_eq!(
            AlertState::evaluate(&window, 50.0),
            AlertState::Nominal {
                latest: 50.0,
                threshold: 50.0
            }
        );
    }

    #[test]
    fn empty_window_yields_no_data_instead_of_comparison() {
        let window = SampleWindow::default();

        assert_eq!(AlertState::evaluate(&window, 50.0), AlertState::NoData);
    }
}
