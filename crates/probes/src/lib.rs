//! Health and coverage checks against the live ERP.
//!
//! - [`ProbeRunner`] runs the fixed battery (endpoints, database, pure logic)
//!   every testing cycle and yields a [`TestReport`].
//! - [`FeatureCoverageRunner`] runs the wider, category-bucketed checklist on
//!   demand and yields a graded [`CoverageReport`].
//!
//! Probe failures are values, never errors: a timeout or refused connection is
//! a failed [`ProbeResult`].

pub mod battery;
pub mod coverage;
pub mod grade;
pub mod probe;
pub mod runner;

pub use coverage::{Category, CategoryReport, CheckResult, CoverageConfig, CoverageReport, FeatureCoverageRunner};
pub use grade::{pass_rate, Grade};
pub use probe::{
    login, send_bounded, Credentials, DbExpectation, DbProbe, EndpointProbe, LogicAssertion,
    ProbeKind, ProbeResult, LOGIN_PATH,
};
pub use runner::{ProbeConfig, ProbeRunner, TestReport};
