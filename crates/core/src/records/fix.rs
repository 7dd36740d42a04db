use serde::{Deserialize, Serialize};

/// Outcome of one healing rule in a heal pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub rule: String,
    pub found: u64,
    pub fixed: u64,
}

impl Fix {
    pub fn new(rule: impl Into<String>, found: u64, fixed: u64) -> Self {
        Self {
            rule: rule.into(),
            found,
            fixed,
        }
    }

    pub fn description(&self) -> String {
        format!("found {} issues", self.found)
    }

    pub fn applied(&self) -> String {
        format!("fixed {} issues", self.fixed)
    }

    pub fn succeeded(&self) -> bool {
        self.fixed > 0
    }
}
