use serde::{Deserialize, Serialize};

/// Letter grade for a coverage pass rate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
    F,
}

impl Grade {
    /// `≥95 A+, ≥90 A, ≥85 B+, ≥80 B, ≥75 C+, ≥70 C, ≥60 D, else F`.
    pub fn from_pass_rate(rate: f64) -> Self {
        match rate {
            r if r >= 95.0 => Grade::APlus,
            r if r >= 90.0 => Grade::A,
            r if r >= 85.0 => Grade::BPlus,
            r if r >= 80.0 => Grade::B,
            r if r >= 75.0 => Grade::CPlus,
            r if r >= 70.0 => Grade::C,
            r if r >= 60.0 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `passed / total * 100`, rounded to one decimal; `0.0` when nothing ran.
pub fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = passed as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}
