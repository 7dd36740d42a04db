//! `erpbot-simulation`: synthetic business activity and simulated users.
//!
//! - [`weighted`]: the cumulative-subtraction weighted choice used by every
//!   randomised cycle.
//! - [`generator`]: the activity generator, creating customers, products,
//!   invoices, payments, tasks and stock movements through the typed ERP store.
//! - [`user_sim`]: scripted user scenarios driven over the live HTTP API.

pub mod catalog;
pub mod generator;
pub mod user_sim;
pub mod weighted;

pub use generator::{
    ActionKind, ActionOutcome, ActivityGenerator, BulkCounts, BulkReport, GenerationReport,
    GeneratorConfig, Prerequisite,
};
pub use user_sim::{Scenario, ScenarioOutcome, SessionReport, UserSimulator, UserSimulatorConfig};
pub use weighted::{choose_weighted, select_weighted, total_weight};
