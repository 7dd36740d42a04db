use thiserror::Error;

use erpbot_core::records::SuggestionStatus;
use erpbot_core::SuggestionId;
use erpbot_infra::erp::StoreError;

use crate::config::ConfigError;
use crate::healer::HealError;
use crate::ux::UxError;

/// Failures surfaced to the caller of a direct operation.
///
/// Scheduled cycles never return these; they are recorded in the error
/// history instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BotError {
    #[error("suggestion not found: {0}")]
    SuggestionNotFound(SuggestionId),

    #[error("suggestion {id} is {status}, not pending")]
    SuggestionNotPending {
        id: SuggestionId,
        status: SuggestionStatus,
    },

    #[error("{cycle} panicked")]
    Panicked { cycle: &'static str },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Heal(#[from] HealError),

    #[error(transparent)]
    Ux(#[from] UxError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type BotResult<T> = Result<T, BotError>;
