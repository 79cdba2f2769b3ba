// sluice/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SluiceError {
  #[error("Stage not found: {stage_name}")]
  StageNotFound { stage_name: String },

  #[error("Stage already exists in pipeline: {stage_name}")]
  DuplicateStage { stage_name: String },

  #[error("Error in user-provided stage or handler. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal sluice error: {0}")]
  Internal(String),
}

// Lets stages and handlers written against `anyhow` use `?` freely.
impl From<AnyhowError> for SluiceError {
  fn from(err: AnyhowError) -> Self {
    // Unwrap a SluiceError that was boxed into anyhow on the way up,
    // so callers can still match on the inner variant.
    match err.downcast::<SluiceError>() {
      Ok(inner) => inner,
      Err(source) => SluiceError::HandlerError { source },
    }
  }
}

pub type SluiceResult<T, E = SluiceError> = std::result::Result<T, E>;
