//! UX analysis contract and the rule-based analyzer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use erpbot_core::records::{Priority, Suggestion};
use erpbot_core::SuggestionId;

mod analyzer;
mod rules;

pub use analyzer::{RuleUxAnalyzer, DEFAULT_MAX_FILES};
pub use rules::{default_ux_rules, UxCategory, UxFix, UxRule};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UxError {
    #[error("analysis failed: {0}")]
    Analysis(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApplyOutcome {
    pub fn applied() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait UxAnalyzer: Send + Sync {
    async fn analyze(&self) -> Result<Vec<Suggestion>, UxError>;

    async fn apply_suggestion(&self, suggestion: &Suggestion) -> Result<ApplyOutcome, UxError>;

    /// Apply the low-priority suggestions marked safe to auto-fix; returns
    /// the ids that were applied.
    async fn apply_auto_suggestions(&self, suggestions: &[Suggestion]) -> Vec<SuggestionId> {
        let mut applied = Vec::new();
        for suggestion in suggestions {
            if !suggestion.auto_fix || suggestion.priority != Priority::Low || !suggestion.is_pending() {
                continue;
            }
            match self.apply_suggestion(suggestion).await {
                Ok(outcome) if outcome.success => applied.push(suggestion.id),
                Ok(_) => {}
                Err(e) => tracing::warn!(suggestion = %suggestion.id, error = %e, "auto-apply failed"),
            }
        }
        applied
    }
}

#[async_trait]
impl<U> UxAnalyzer for Arc<U>
where
    U: UxAnalyzer + ?Sized,
{
    async fn analyze(&self) -> Result<Vec<Suggestion>, UxError> {
        (**self).analyze().await
    }

    async fn apply_suggestion(&self, suggestion: &Suggestion) -> Result<ApplyOutcome, UxError> {
        (**self).apply_suggestion(suggestion).await
    }

    async fn apply_auto_suggestions(&self, suggestions: &[Suggestion]) -> Vec<SuggestionId> {
        (**self).apply_auto_suggestions(suggestions).await
    }
}
