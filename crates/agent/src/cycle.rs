use serde::{Deserialize, Serialize};

/// The independently scheduled jobs of the orchestrator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    Testing,
    Healing,
    Generation,
    UxAnalysis,
    Performance,
    Simulation,
}

impl CycleKind {
    pub const ALL: [CycleKind; 6] = [
        CycleKind::Testing,
        CycleKind::Healing,
        CycleKind::Generation,
        CycleKind::UxAnalysis,
        CycleKind::Performance,
        CycleKind::Simulation,
    ];

    /// Error-record source and ticker name.
    pub fn source(&self) -> &'static str {
        match self {
            CycleKind::Testing => "testing_cycle",
            CycleKind::Healing => "healing_cycle",
            CycleKind::Generation => "generator_cycle",
            CycleKind::UxAnalysis => "ux_analysis_cycle",
            CycleKind::Performance => "performance_cycle",
            CycleKind::Simulation => "simulation_cycle",
        }
    }
}

impl core::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.source())
    }
}
