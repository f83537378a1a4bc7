use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::models::Reading;

/// Alert thresholds. A reading at or beyond a threshold raises the alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Absolute pitch angle, degrees.
    pub pitch_deg: f64,
    /// Absolute roll angle, degrees. Crossing it is an emergency.
    pub roll_deg: f64,
    pub tof_drift_mm: f64,
    pub rain_1h_mm: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            pitch_deg: 30.0,
            roll_deg: 45.0,
            tof_drift_mm: 30.0,
            rain_1h_mm: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AlertSet {
    pub pitch_alert: bool,
    pub roll_alert: bool,
    pub tof_alert: bool,
    pub rain_alert: bool,
}

impl AlertSet {
    pub fn any(&self) -> bool {
        self.pitch_alert || self.roll_alert || self.tof_alert || self.rain_alert
    }
}

/// Device severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Normal => "normal",
            Status::Warning => "warning",
            Status::Critical => "critical",
        }
    }

    /// Severity token used by the dashboard.
    pub fn severity(&self) -> &'static str {
        match self {
            Status::Normal => "success",
            Status::Warning => "warn",
            Status::Critical => "danger",
        }
    }

    pub fn label(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub alerts: AlertSet,
    pub status: Status,
}

pub fn evaluate(reading: &Reading, thresholds: &Thresholds) -> Evaluation {
    let alerts = AlertSet {
        pitch_alert: reading.pitch.abs() >= thresholds.pitch_deg,
        roll_alert: reading.roll.abs() >= thresholds.roll_deg,
        tof_alert: reading.tof_drift_mm >= thresholds.tof_drift_mm,
        rain_alert: reading.rain_1h_mm >= thresholds.rain_1h_mm,
    };

    let status = if alerts.roll_alert {
        Status::Critical
    } else if alerts.any() {
        Status::Warning
    } else {
        Status::Normal
    };

    Evaluation { alerts, status }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(pitch: f64, roll: f64, drift: f64, rain: f64) -> Reading {
        Reading {
            pitch,
            roll,
            tof_drift_mm: drift,
            rain_1h_mm: rain,
            ..Default::default()
        }
    }

    #[test]
    fn pitch_only_is_warning() {
        let eval = evaluate(&reading(32.0, 5.0, 0.0, 0.0), &Thresholds::default());
        assert_eq!(
            eval.alerts,
            AlertSet {
                pitch_alert: true,
                ..Default::default()
            }
        );
        assert_eq!(eval.status, Status::Warning);
    }

    #[test]
    fn roll_forces_critical_regardless_of_others() {
        let thresholds = Thresholds::default();
        for (pitch, drift, rain) in [(0.0, 0.0, 0.0), (40.0, 50.0, 20.0), (-31.0, 0.0, 16.0)] {
            for roll in [45.0, -45.0, 50.0, -170.0] {
                let eval = evaluate(&reading(pitch, roll, drift, rain), &thresholds);
                assert!(eval.alerts.roll_alert);
                assert_eq!(eval.status, Status::Critical);
            }
        }
    }

    #[test]
    fn any_minor_alert_below_roll_is_warning() {
        let thresholds = Thresholds::default();
        let cases = [
            reading(30.0, 44.9, 0.0, 0.0),
            reading(-30.0, -44.9, 0.0, 0.0),
            reading(0.0, 0.0, 30.0, 0.0),
            reading(0.0, 0.0, 0.0, 15.0),
            reading(35.0, 10.0, 31.0, 16.0),
        ];
        for case in cases {
            let eval = evaluate(&case, &thresholds);
            assert!(!eval.alerts.roll_alert);
            assert_eq!(eval.status, Status::Warning, "{case:?}");
        }
    }

    #[test]
    fn below_all_thresholds_is_normal() {
        let eval = evaluate(&reading(29.99, -44.99, 29.9, 14.99), &Thresholds::default());
        assert_eq!(eval.alerts, AlertSet::default());
        assert_eq!(eval.status, Status::Normal);
    }

    #[test]
    fn negative_drift_does_not_alert() {
        let eval = evaluate(&reading(0.0, 0.0, -40.0, 0.0), &Thresholds::default());
        assert!(!eval.alerts.tof_alert);
    }

    #[test]
    fn thresholds_are_injectable() {
        let strict = Thresholds {
            pitch_deg: 5.0,
            roll_deg: 10.0,
            tof_drift_mm: 1.0,
            rain_1h_mm: 1.0,
        };
        let eval = evaluate(&reading(5.0, 0.0, 0.0, 0.0), &strict);
        assert_eq!(eval.status, Status::Warning);
        let eval = evaluate(&reading(0.0, 10.0, 0.0, 0.0), &strict);
        assert_eq!(eval.status, Status::Critical);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let r = reading(32.0, 5.0, 0.0, 0.0);
        let thresholds = Thresholds::default();
        assert_eq!(evaluate(&r, &thresholds), evaluate(&r, &thresholds));
    }

    #[test]
    fn status_ordering_and_labels() {
        assert!(Status::Normal < Status::Warning);
        assert!(Status::Warning < Status::Critical);
        assert_eq!(Status::Critical.severity(), "danger");
        assert_eq!(Status::Warning.severity(), "warn");
        assert_eq!(Status::Normal.severity(), "success");
        assert_eq!(Status::Warning.label(), "WARNING");
        assert_eq!(serde_json::to_string(&Status::Critical).unwrap(), "\"critical\"");
    }
}
