//! Advisory health thresholds evaluated on every heartbeat.

use signage_common::DeviceMetrics;
use signage_config::schema::AlertThresholds;

/// Human-readable alerts for every threshold `metrics` exceeds.
pub fn check_alerts(metrics: &DeviceMetrics, thresholds: &AlertThresholds) -> Vec<String> {
    let mut alerts = Vec::new();

    if let Some(t) = metrics.temperature.filter(|t| *t > thresholds.temperature) {
        alerts.push(format!("High temperature: {t}°C"));
    }
    if let Some(c) = metrics.cpu_load.filter(|c| *c > thresholds.cpu_load) {
        alerts.push(format!("High CPU load: {c}%"));
    }
    if let Some(m) = metrics.memory_usage.filter(|m| *m > thresholds.memory_usage) {
        alerts.push(format!("High memory usage: {m}%"));
    }
    if let Some(d) = metrics.disk_usage.filter(|d| *d > thresholds.disk_usage) {
        alerts.push(format!("High disk usage: {d}%"));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_metrics_raise_nothing() {
        let metrics = DeviceMetrics {
            temperature: Some(55.0),
            cpu_load: Some(20.0),
            memory_usage: Some(40.0),
            disk_usage: Some(50.0),
            ..Default::default()
        };
        assert!(check_alerts(&metrics, &AlertThresholds::default()).is_empty());
    }

    #[test]
    fn thresholds_are_strict() {
        let metrics = DeviceMetrics {
            temperature: Some(75.0),
            cpu_load: Some(85.0),
            ..Default::default()
        };
        assert!(check_alerts(&metrics, &AlertThresholds::default()).is_empty());
    }

    #[test]
    fn every_exceeded_threshold_is_listed() {
        let metrics = DeviceMetrics {
            temperature: Some(80.5),
            cpu_load: Some(90.0),
            memory_usage: Some(95.0),
            disk_usage: Some(91.0),
            ..Default::default()
        };
        let alerts = check_alerts(&metrics, &AlertThresholds::default());
        assert_eq!(
            alerts,
            vec![
                "High temperature: 80.5°C",
                "High CPU load: 90%",
                "High memory usage: 95%",
                "High disk usage: 91%",
            ]
        );
    }

    #[test]
    fn missing_fields_are_skipped() {
        let metrics = DeviceMetrics {
            disk_usage: Some(99.0),
            ..Default::default()
        };
        assert_eq!(
            check_alerts(&metrics, &AlertThresholds::default()),
            vec!["High disk usage: 99%"]
        );
    }
}
