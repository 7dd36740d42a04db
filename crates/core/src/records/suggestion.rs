use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::Priority;
use super::text_enum;
use crate::id::SuggestionId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Applied,
    Rejected,
}

text_enum!(SuggestionStatus, "suggestion status", {
    Pending => "pending",
    Applied => "applied",
    Rejected => "rejected",
});

/// An improvement proposed by the UX analysis cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    #[serde(rename = "type")]
    pub kind: String,
    pub component: String,
    pub text: String,
    pub priority: Priority,
    pub status: SuggestionStatus,
    /// Safe to apply without a human in the loop.
    pub auto_fix: bool,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    /// Name of the rule that raised it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    /// Source file the suggestion is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Suggestion {
    pub fn new(
        kind: impl Into<String>,
        component: impl Into<String>,
        text: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: SuggestionId::new(),
            kind: kind.into(),
            component: component.into(),
            text: text.into(),
            priority,
            status: SuggestionStatus::Pending,
            auto_fix: false,
            created_at: Utc::now(),
            applied_at: None,
            issue: None,
            file: None,
        }
    }

    pub fn with_auto_fix(mut self, auto_fix: bool) -> Self {
        self.auto_fix = auto_fix;
        self
    }

    pub fn with_origin(mut self, issue: impl Into<String>, file: impl Into<String>) -> Self {
        self.issue = Some(issue.into());
        self.file = Some(file.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == SuggestionStatus::Pending
    }

    pub fn mark_applied(&mut self, at: DateTime<Utc>) {
        self.status = SuggestionStatus::Applied;
        self.applied_at = Some(at);
    }

    pub fn mark_rejected(&mut self) {
        self.status = SuggestionStatus::Rejected;
    }
}
