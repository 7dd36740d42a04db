//! `erpbot-perf`: periodic performance sampling.
//!
//! A [`PerformanceSampler`] combines a host reading ([`HostMetrics`]), a few
//! cheap database probes and the trailing audit-log error rate into one
//! [`PerformanceSample`], evaluates it against fixed [`Thresholds`] and keeps a
//! bounded history from which summaries and recommendations are derived.

pub mod db;
pub mod host;
pub mod metrics;
pub mod sampler;
pub mod thresholds;

pub use db::{collect_app_activity, collect_db_metrics, AppActivity};
pub use host::{HostMetrics, HostSnapshot, StaticHost, SysinfoHost};
pub use metrics::{AppMetrics, DbMetrics, PerformanceSample, SystemMetrics, TableCount};
pub use sampler::{PerformanceSampler, PerformanceSummary, Recommendation, SamplerConfig};
pub use thresholds::{Issue, IssueKind, Severity, Thresholds};
