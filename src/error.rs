use std::io;

use crate::{
    config::ConfigError, external::ExecError, llm::LlmError, session::TransitionError,
};

/// Top-level error for a scriptwright run.
///
/// Script failures are not errors: they are outcomes handled by the session
/// loops. Everything here aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("generation failed: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("failed to save script: {0}")]
    Persist(#[source] io::Error),
    #[error("console error: {0}")]
    Console(#[from] rustyline::error::ReadlineError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
