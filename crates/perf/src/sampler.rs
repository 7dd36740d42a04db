use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use erpbot_core::records::Priority;
use erpbot_core::BoundedHistory;
use erpbot_infra::QueryExecutor;

use crate::db::{collect_app_activity, collect_db_metrics};
use crate::host::HostMetrics;
use crate::metrics::{round1, AppMetrics, PerformanceSample, SystemMetrics};
use crate::thresholds::{IssueKind, Thresholds};

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub history_capacity: usize,
    /// Samples averaged by `summary` and `recommendations`.
    pub summary_window: usize,
    /// Fewer samples than this yields no recommendations.
    pub min_samples_for_recommendations: usize,
    pub thresholds: Thresholds,
    pub main_tables: Vec<String>,
    /// Age after which persisted samples are pruned.
    pub retention: Duration,
    /// Memory budget of this process; the machine's total memory when unset.
    pub process_memory_limit_mb: Option<f64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            summary_window: 10,
            min_samples_for_recommendations: 5,
            thresholds: Thresholds::default(),
            main_tables: ["users", "products", "customers", "invoices", "tasks", "notifications"]
                .into_iter()
                .map(String::from)
                .collect(),
            retention: Duration::hours(24),
            process_memory_limit_mb: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub avg_db_time: f64,
    pub total_issues: usize,
    pub samples: usize,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub priority: Priority,
    pub title: String,
    pub suggestions: Vec<String>,
}

fn recommendation(kind: IssueKind, priority: Priority, title: &str, suggestions: &[&str]) -> Recommendation {
    Recommendation {
        kind,
        priority,
        title: title.to_string(),
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
    }
}

pub struct PerformanceSampler {
    host: Arc<dyn HostMetrics>,
    executor: Arc<dyn QueryExecutor>,
    config: SamplerConfig,
    history: Mutex<BoundedHistory<PerformanceSample>>,
}

impl PerformanceSampler {
    pub fn new(host: Arc<dyn HostMetrics>, executor: Arc<dyn QueryExecutor>, config: SamplerConfig) -> Self {
        let history = Mutex::new(BoundedHistory::new(config.history_capacity));
        Self {
            host,
            executor,
            config,
            history,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BoundedHistory<PerformanceSample>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take one sample, evaluate it and append it to the history.
    #[instrument(skip(self))]
    pub async fn collect(&self) -> PerformanceSample {
        let host = self.host.snapshot();
        let db = collect_db_metrics(self.executor.as_ref(), &self.config.main_tables).await;
        let activity = collect_app_activity(self.executor.as_ref()).await;

        let system = SystemMetrics {
            cpu_usage: host.cpu_usage,
            memory_usage: host.memory_usage(),
            total_memory_mb: host.total_memory_mb(),
            available_memory_mb: host.available_memory_mb(),
            cpu_count: host.cpu_count,
            uptime_secs: host.uptime_secs,
        };
        let app = AppMetrics {
            heap_used_mb: host.process_rss_mb(),
            heap_total_mb: self
                .config
                .process_memory_limit_mb
                .unwrap_or(host.total_memory_mb() as f64),
            rss_mb: host.process_rss_mb(),
            process_uptime_secs: host.process_uptime_secs,
            requests_per_minute: activity.requests_per_minute,
            error_rate: activity.error_rate,
        };
        let issues = self.config.thresholds.evaluate(&system, &db, &app);
        if !issues.is_empty() {
            tracing::warn!(issues = issues.len(), "performance thresholds exceeded");
        }

        let sample = PerformanceSample {
            timestamp: Utc::now(),
            system,
            db,
            app,
            issues,
        };
        self.lock().push(sample.clone());
        sample
    }

    /// The last `limit` samples, oldest first.
    pub fn history(&self, limit: usize) -> Vec<PerformanceSample> {
        self.lock().recent_vec(limit)
    }

    pub fn latest(&self) -> Option<PerformanceSample> {
        self.lock().latest().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Averages over the summary window; `None` before the first sample.
    pub fn summary(&self) -> Option<PerformanceSummary> {
        let history = self.lock();
        let last_check = history.latest()?.timestamp;
        let window: Vec<&PerformanceSample> = history.recent(self.config.summary_window).collect();
        let n = window.len() as f64;
        let avg = |f: fn(&PerformanceSample) -> f64| round1(window.iter().map(|s| f(s)).sum::<f64>() / n);

        Some(PerformanceSummary {
            avg_cpu: avg(|s| s.system.cpu_usage),
            avg_memory: avg(|s| s.system.memory_usage),
            avg_db_time: avg(|s| s.db.query_time_ms),
            total_issues: window.iter().map(|s| s.issues.len()).sum(),
            samples: window.len(),
            last_check,
        })
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        if self.len() < self.config.min_samples_for_recommendations {
            return Vec::new();
        }
        let Some(summary) = self.summary() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        if summary.avg_cpu > 70.0 {
            out.push(recommendation(
                IssueKind::Cpu,
                Priority::High,
                "Optimize CPU usage",
                &[
                    "Review heavy operations",
                    "Optimize database queries",
                    "Cache frequently used results",
                ],
            ));
        }
        if summary.avg_memory > 75.0 {
            out.push(recommendation(
                IssueKind::Memory,
                Priority::Medium,
                "Optimize memory usage",
                &[
                    "Clean up unused data",
                    "Use leaner data structures",
                    "Check for memory leaks",
                ],
            ));
        }
        if summary.avg_db_time > 100.0 {
            out.push(recommendation(
                IssueKind::Database,
                Priority::Medium,
                "Speed up database queries",
                &[
                    "Add indexes on frequently filtered columns",
                    "Simplify complex queries",
                    "Archive old data",
                ],
            ));
        }
        out
    }

    /// Persisted samples created before this instant are stale.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.retention
    }
}
