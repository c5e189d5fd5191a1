//! Ordering of finished scans for presentation

use crate::proxy::models::{ProbeResult, SpeedResult};
use crate::proxy::scanner::ScanOutcome;
use serde::Serialize;
use std::cmp::Ordering;

/// Validation results split and ordered for display
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Working proxies, fastest first
    pub successes: Vec<ProbeResult>,
    /// Failed proxies in submission order
    pub failures: Vec<ProbeResult>,
    pub total: usize,
    pub cancelled: bool,
}

impl ValidationReport {
    pub fn from_outcome(outcome: ScanOutcome<ProbeResult>) -> Self {
        let (successes, failures) = rank_by_latency(outcome.results);
        Self {
            successes,
            failures,
            total: outcome.total,
            cancelled: outcome.cancelled,
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Raw strings of the working proxies, fastest first
    pub fn working_proxies(&self) -> Vec<String> {
        self.successes.iter().map(|r| r.raw.clone()).collect()
    }
}

/// Speed results ranked for display
#[derive(Debug, Clone, Serialize)]
pub struct SpeedReport {
    /// Measured proxies, fastest first
    pub ranked: Vec<SpeedResult>,
    /// Proxies whose download failed or came up short
    pub failed: usize,
    pub total: usize,
    pub cancelled: bool,
}

impl SpeedReport {
    pub fn from_outcome(outcome: ScanOutcome<SpeedResult>) -> Self {
        let (ranked, failed) = rank_by_throughput(outcome.results);
        Self {
            ranked,
            failed,
            total: outcome.total,
            cancelled: outcome.cancelled,
        }
    }
}

/// Split into successes and failures.
///
/// Successes are ordered by ascending latency, failures by submission order;
/// equal keys keep submission order.
pub fn rank_by_latency(results: Vec<ProbeResult>) -> (Vec<ProbeResult>, Vec<ProbeResult>) {
    let (mut successes, mut failures): (Vec<_>, Vec<_>) =
        results.into_iter().partition(|r| r.is_working());

    successes.sort_by(|a, b| {
        let latency_a = a.latency_ms.unwrap_or(f64::INFINITY);
        let latency_b = b.latency_ms.unwrap_or(f64::INFINITY);
        latency_a.total_cmp(&latency_b).then(a.order.cmp(&b.order))
    });
    failures.sort_by_key(|r| r.order);

    (successes, failures)
}

/// Rank measured proxies by descending throughput and count the rest
pub fn rank_by_throughput(results: Vec<SpeedResult>) -> (Vec<SpeedResult>, usize) {
    let total = results.len();
    let mut ranked: Vec<SpeedResult> = results.into_iter().filter(|r| r.is_measured()).collect();
    let failed = total - ranked.len();

    ranked.sort_by(|a, b| match (a.throughput_mbps, b.throughput_mbps) {
        (Some(x), Some(y)) => y.total_cmp(&x).then(a.order.cmp(&b.order)),
        _ => Ordering::Equal,
    });

    (ranked, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::{
        AnonymityGrade, CheckKind, EndpointError, ProbeFailure, ProxyEndpoint, ProxyScheme,
    };

    fn endpoint(order: usize) -> ProxyEndpoint {
        let host = format!("10.0.0.{}", order);
        let raw = format!("http://{}:8080", host);
        ProxyEndpoint::new(ProxyScheme::Http, host, 8080, raw)
    }

    fn working(order: usize, latency: f64) -> ProbeResult {
        ProbeResult::working(order, endpoint(order), CheckKind::Soft, latency, AnonymityGrade::Elite)
    }

    fn failed(order: usize) -> ProbeResult {
        ProbeResult::failed(
            order,
            "garbage",
            None,
            CheckKind::Soft,
            ProbeFailure::MalformedEndpoint(EndpointError::MissingSchemeSeparator),
        )
    }

    fn speed(order: usize, mbps: Option<f64>) -> SpeedResult {
        match mbps {
            Some(mbps) => SpeedResult::measured(order, endpoint(order), mbps),
            None => SpeedResult::failed(
                order,
                &endpoint(order).raw,
                Some(endpoint(order)),
                ProbeFailure::ShortDownload {
                    received: 1,
                    expected: 2,
                },
            ),
        }
    }

    #[test]
    fn test_successes_sorted_by_latency() {
        let results = vec![
            working(0, 310.0),
            failed(1),
            working(2, 95.5),
            working(3, 180.25),
            failed(4),
        ];
        let (successes, failures) = rank_by_latency(results);

        let latencies: Vec<f64> = successes.iter().filter_map(|r| r.latency_ms).collect();
        assert_eq!(latencies, vec![95.5, 180.25, 310.0]);
        assert!(latencies.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(failures.iter().map(|r| r.order).collect::<Vec<_>>(), vec![1, 4]);
    }

    #[test]
    fn test_equal_latency_keeps_submission_order() {
        // Completion order is scrambled on purpose
        let results = vec![working(7, 50.0), working(2, 50.0), working(5, 10.0), working(4, 50.0)];
        let (successes, _) = rank_by_latency(results);
        let orders: Vec<usize> = successes.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![5, 2, 4, 7]);
    }

    #[test]
    fn test_speed_ranked_descending() {
        let results = vec![
            speed(0, Some(1.5)),
            speed(1, None),
            speed(2, Some(12.0)),
            speed(3, Some(1.5)),
            speed(4, None),
            speed(5, Some(4.25)),
        ];
        let (ranked, failed) = rank_by_throughput(results);

        assert_eq!(failed, 2);
        let orders: Vec<usize> = ranked.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![2, 5, 0, 3]);
        let speeds: Vec<f64> = ranked.iter().filter_map(|r| r.throughput_mbps).collect();
        assert!(speeds.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_report_from_outcome() {
        let outcome = ScanOutcome {
            results: vec![working(1, 20.0), failed(0), working(2, 10.0)],
            total: 5,
            cancelled: true,
        };
        let report = ValidationReport::from_outcome(outcome);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.total, 5);
        assert!(report.cancelled);
        assert_eq!(
            report.working_proxies(),
            vec!["http://10.0.0.2:8080".to_string(), "http://10.0.0.1:8080".to_string()]
        );

        let report = SpeedReport::from_outcome(ScanOutcome {
            results: vec![speed(0, None), speed(1, Some(2.0))],
            total: 2,
            cancelled: false,
        });
        assert_eq!(report.failed, 1);
        assert_eq!(report.ranked.len(), 1);
    }
}
