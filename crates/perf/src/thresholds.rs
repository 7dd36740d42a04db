use serde::{Deserialize, Serialize};

use crate::metrics::{round1, AppMetrics, DbMetrics, SystemMetrics};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Cpu,
    Memory,
    Database,
    ErrorRate,
    Heap,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// A threshold breach. Informational; never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

/// Fixed limits; a value strictly above its limit is a breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub cpu: f64,
    pub memory: f64,
    pub db_query_time_ms: f64,
    pub error_rate: f64,
    pub heap_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: 80.0,
            memory: 85.0,
            db_query_time_ms: 500.0,
            error_rate: 5.0,
            heap_ratio: 90.0,
        }
    }
}

impl Thresholds {
    pub fn evaluate(&self, system: &SystemMetrics, db: &DbMetrics, app: &AppMetrics) -> Vec<Issue> {
        let mut issues = Vec::new();
        let mut check = |kind, severity, value: f64, threshold: f64, message: String| {
            if value > threshold {
                issues.push(Issue {
                    kind,
                    severity,
                    value,
                    threshold,
                    message,
                });
            }
        };

        check(
            IssueKind::Cpu,
            Severity::Warning,
            system.cpu_usage,
            self.cpu,
            format!("high CPU usage: {}%", round1(system.cpu_usage)),
        );
        check(
            IssueKind::Memory,
            Severity::Warning,
            system.memory_usage,
            self.memory,
            format!("high memory usage: {}%", round1(system.memory_usage)),
        );
        check(
            IssueKind::Database,
            Severity::Warning,
            db.query_time_ms,
            self.db_query_time_ms,
            format!("slow database queries: {}ms", round1(db.query_time_ms)),
        );
        check(
            IssueKind::ErrorRate,
            Severity::Critical,
            app.error_rate,
            self.error_rate,
            format!("high error rate: {}%", round1(app.error_rate)),
        );
        let heap = app.heap_ratio();
        check(
            IssueKind::Heap,
            Severity::Warning,
            heap,
            self.heap_ratio,
            format!("memory pressure on the process: {}%", heap.round()),
        );
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> (SystemMetrics, DbMetrics, AppMetrics) {
        (
            SystemMetrics {
                cpu_usage: 10.0,
                memory_usage: 40.0,
                ..SystemMetrics::default()
            },
            DbMetrics {
                query_time_ms: 3.0,
                ..DbMetrics::default()
            },
            AppMetrics {
                heap_used_mb: 50.0,
                heap_total_mb: 200.0,
                ..AppMetrics::default()
            },
        )
    }

    #[test]
    fn quiet_host_has_no_issues() {
        let (s, d, a) = quiet();
        assert!(Thresholds::default().evaluate(&s, &d, &a).is_empty());
    }

    #[test]
    fn limits_are_exclusive() {
        let (mut s, mut d, mut a) = quiet();
        s.cpu_usage = 80.0;
        s.memory_usage = 85.0;
        d.query_time_ms = 500.0;
        a.error_rate = 5.0;
        assert!(Thresholds::default().evaluate(&s, &d, &a).is_empty());

        s.cpu_usage = 80.5;
        let issues = Thresholds::default().evaluate(&s, &d, &a);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Cpu);
        assert_eq!(issues[0].threshold, 80.0);
    }

    #[test]
    fn error_rate_is_critical_everything_else_a_warning() {
        let (mut s, mut d, mut a) = quiet();
        s.memory_usage = 90.0;
        d.query_time_ms = 750.0;
        a.error_rate = 12.5;
        a.heap_used_mb = 190.0;

        let issues = Thresholds::default().evaluate(&s, &d, &a);
        let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IssueKind::Memory, IssueKind::Database, IssueKind::ErrorRate, IssueKind::Heap]
        );
        for issue in &issues {
            let expected = if issue.kind == IssueKind::ErrorRate {
                Severity::Critical
            } else {
                Severity::Warning
            };
            assert_eq!(issue.severity, expected, "{:?}", issue.kind);
        }
    }

    proptest::proptest! {
        #[test]
        fn cpu_breach_iff_above_limit(cpu in 0.0f64..100.0) {
            let (mut s, d, a) = quiet();
            s.cpu_usage = cpu;
            let issues = Thresholds::default().evaluate(&s, &d, &a);
            proptest::prop_assert_eq!(issues.iter().any(|i| i.kind == IssueKind::Cpu), cpu > 80.0);
        }
    }

    #[test]
    fn unknown_heap_total_is_not_a_breach() {
        let (s, d, mut a) = quiet();
        a.heap_total_mb = 0.0;
        a.heap_used_mb = 10.0;
        assert!(Thresholds::default().evaluate(&s, &d, &a).is_empty());
    }
}
