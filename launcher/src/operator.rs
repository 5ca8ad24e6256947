use inquire::{Confirm, InquireError, Text};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Prompt was cancelled by the operator")]
    Cancelled,

    #[error("Prompt failed: {0}")]
    Prompt(String),
}

impl From<InquireError> for OperatorError {
    fn from(error: InquireError) -> Self {
        match error {
            InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                OperatorError::Cancelled
            }
            other => OperatorError::Prompt(other.to_string()),
        }
    }
}

pub type OperatorResult<T> = Result<T, OperatorError>;

/// The human at the terminal. Calls block until they answer.
pub trait Operator: Send + Sync {
    fn input(&self, message: &str) -> OperatorResult<String>;

    fn confirm(&self, message: &str, default: bool) -> OperatorResult<bool>;
}

/// Interactive terminal prompts
#[derive(Debug, Clone, Default)]
pub struct TerminalOperator;

impl TerminalOperator {
    pub fn new() -> Self {
        Self
    }
}

impl Operator for TerminalOperator {
    fn input(&self, message: &str) -> OperatorResult<String> {
        Ok(Text::new(message).prompt()?)
    }

    fn confirm(&self, message: &str, default: bool) -> OperatorResult<bool> {
        Ok(Confirm::new(message).with_default(default).prompt()?)
    }
}
