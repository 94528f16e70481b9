use thiserror::Error;

use crate::dialogue::Stage;

#[derive(Debug, Error)]
pub enum ChatbotError {
    #[error("cannot {action} while the conversation is at {stage:?}")]
    WrongStage { action: &'static str, stage: Stage },

    #[error("there is no unit number {0}")]
    UnknownUnit(usize),

    /// Rejected form input; the message is what the visitor is shown.
    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChatbotError>;
