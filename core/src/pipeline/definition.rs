// sluice/src/pipeline/definition.rs

//! Contains the `Pipeline<Err>` struct, its builder, and the composition
//! operations that derive new pipelines from existing ones.

use crate::core::context::Context;
use crate::core::handler::{BoxedHandler, Handler, NotFound};
use crate::core::request::RequestInfo;
use crate::core::response::ResponseWriter;
use crate::core::stage::{self, BoxedStage, Stage};
use crate::error::{SluiceError, SluiceResult};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{event, Level};

/// An immutable, ordered sequence of stages plus the fallback handler used
/// when `then` is given no terminal handler.
///
/// `Err` is the error type stages and handlers return. A pipeline holds no
/// per-request state, so one instance can be cloned cheaply and shared across
/// any number of concurrent requests.
pub struct Pipeline<Err = SluiceError>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  pub(crate) stages: Arc<[BoxedStage<Err>]>,
  pub(crate) fallback: BoxedHandler<Err>,
}

impl<Err> Pipeline<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  /// An empty pipeline with the `NotFound` fallback.
  pub fn new() -> Self {
    Self {
      stages: Arc::from(Vec::new()),
      fallback: Arc::new(NotFound),
    }
  }

  pub fn builder() -> PipelineBuilder<Err> {
    PipelineBuilder::new()
  }

  /// Starts a builder pre-filled with this pipeline's stages and fallback.
  pub fn to_builder(&self) -> PipelineBuilder<Err> {
    PipelineBuilder {
      stages: self.stages.to_vec(),
      fallback: Some(self.fallback.clone()),
    }
  }

  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  pub fn stage_names(&self) -> Vec<&str> {
    self.stages.iter().map(|s| s.name()).collect()
  }

  pub fn fallback(&self) -> &BoxedHandler<Err> {
    &self.fallback
  }

  /// Returns a new pipeline with `stage` added after the existing stages.
  /// `self` is left unchanged.
  pub fn append(&self, stage: impl Stage<Err> + 'static) -> SluiceResult<Self> {
    let mut builder = self.to_builder();
    builder.stage(stage)?;
    Ok(builder.build())
  }

  /// Returns a new pipeline running `self`'s stages followed by `other`'s.
  /// The fallback of `self` is kept.
  pub fn extend(&self, other: &Pipeline<Err>) -> SluiceResult<Self> {
    let mut builder = self.to_builder();
    for stage in other.stages.iter() {
      builder.shared_stage(stage.clone())?;
    }
    Ok(builder.build())
  }
}

impl<Err> Default for Pipeline<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<Err> Clone for Pipeline<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  fn clone(&self) -> Self {
    Self {
      stages: Arc::clone(&self.stages),
      fallback: Arc::clone(&self.fallback),
    }
  }
}

impl<Err> fmt::Debug for Pipeline<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipeline")
      .field("stages", &self.stage_names())
      .finish_non_exhaustive()
  }
}

/// Assembles a `Pipeline`. Stage names must be unique within one pipeline.
pub struct PipelineBuilder<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  stages: Vec<BoxedStage<Err>>,
  fallback: Option<BoxedHandler<Err>>,
}

impl<Err> PipelineBuilder<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      stages: Vec::new(),
      fallback: None,
    }
  }

  fn position(&self, stage_name: &str) -> SluiceResult<usize> {
    self
      .stages
      .iter()
      .position(|s| s.name() == stage_name)
      .ok_or_else(|| SluiceError::StageNotFound {
        stage_name: stage_name.to_string(),
      })
  }

  fn ensure_stage_not_exists(&self, stage_name: &str) -> SluiceResult<()> {
    if self.stages.iter().any(|s| s.name() == stage_name) {
      return Err(SluiceError::DuplicateStage {
        stage_name: stage_name.to_string(),
      });
    }
    Ok(())
  }

  /// Adds a stage after all current stages.
  pub fn stage(&mut self, stage: impl Stage<Err> + 'static) -> SluiceResult<&mut Self> {
    self.shared_stage(Arc::new(stage))
  }

  /// Adds an already shared stage after all current stages.
  pub fn shared_stage(&mut self, stage: BoxedStage<Err>) -> SluiceResult<&mut Self> {
    self.ensure_stage_not_exists(stage.name())?;
    event!(Level::TRACE, stage_name = %stage.name(), "Stage added.");
    self.stages.push(stage);
    Ok(self)
  }

  /// Adds an inbound-only stage built from a closure.
  pub fn inbound<F, Fut, UserErr>(&mut self, name: impl Into<String>, f: F) -> SluiceResult<&mut Self>
  where
    F: Fn(Context, ResponseWriter, RequestInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Context, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + 'static,
  {
    self.stage(stage::inbound(name, f))
  }

  /// Adds an outbound-only stage built from a closure.
  pub fn outbound<F, Fut>(&mut self, name: impl Into<String>, f: F) -> SluiceResult<&mut Self>
  where
    F: Fn(Context, RequestInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.stage(stage::outbound(name, f))
  }

  pub fn insert_before(&mut self, existing_stage: &str, stage: impl Stage<Err> + 'static) -> SluiceResult<&mut Self> {
    let idx = self.position(existing_stage)?;
    self.ensure_stage_not_exists(stage.name())?;
    self.stages.insert(idx, Arc::new(stage));
    Ok(self)
  }

  pub fn insert_after(&mut self, existing_stage: &str, stage: impl Stage<Err> + 'static) -> SluiceResult<&mut Self> {
    let idx = self.position(existing_stage)?;
    self.ensure_stage_not_exists(stage.name())?;
    self.stages.insert(idx + 1, Arc::new(stage));
    Ok(self)
  }

  /// Removes the named stage. Returns whether a stage was removed.
  pub fn remove(&mut self, stage_name: &str) -> bool {
    match self.position(stage_name) {
      Ok(idx) => {
        self.stages.remove(idx);
        true
      }
      Err(_) => false,
    }
  }

  /// Sets the handler `then(None)` falls back to. Defaults to `NotFound`.
  pub fn fallback(&mut self, handler: impl Handler<Err> + 'static) -> &mut Self {
    self.shared_fallback(Arc::new(handler))
  }

  pub fn shared_fallback(&mut self, handler: BoxedHandler<Err>) -> &mut Self {
    self.fallback = Some(handler);
    self
  }

  pub fn build(&self) -> Pipeline<Err> {
    let fallback: BoxedHandler<Err> = match &self.fallback {
      Some(handler) => handler.clone(),
      None => Arc::new(NotFound),
    };
    Pipeline {
      stages: Arc::from(self.stages.clone()),
      fallback,
    }
  }
}

impl<Err> Default for PipelineBuilder<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
