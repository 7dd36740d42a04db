//! `erpbot-agent`: the orchestrator that keeps the ERP exercised.
//!
//! [`Bot`] schedules six independent cycles (testing, healing, generation,
//! UX analysis, performance, simulation), contains their failures, keeps the
//! counters and histories, and broadcasts [`BotEvent`]s. The cycles themselves
//! live in the probe, simulation and perf crates; healing and UX analysis are
//! pluggable through [`Healer`] and [`UxAnalyzer`].

pub mod bot;
pub mod config;
pub mod cycle;
pub mod error;
pub mod events;
pub mod healer;
pub mod persist;
pub mod state;
pub mod ticker;
pub mod ux;

pub use bot::{Bot, BotParts, Collaborators, DEFAULT_SESSION_SCENARIOS, MAX_SESSION_SCENARIOS};
pub use config::{BotConfig, ConfigError, Intervals};
pub use cycle::CycleKind;
pub use error::{BotError, BotResult};
pub use events::{BotEvent, EventChannel};
pub use healer::{default_rules, HealError, HealReport, HealRule, Healer, RuleHealer};
pub use persist::{AuditWrite, AuditWriter};
pub use state::{BotState, BotStatus, ErrorRecord, Lifecycle, Stats, StatsDelta};
pub use ticker::TickerSet;
pub use ux::{default_ux_rules, ApplyOutcome, RuleUxAnalyzer, UxAnalyzer, UxCategory, UxError, UxFix, UxRule};
