// sluice/src/pipeline/chain.rs

//! Contains `Pipeline::then`, which composes a pipeline with a terminal
//! handler into a single `Handler`.

use crate::core::context::Context;
use crate::core::handler::{handler_fn, BoxedHandler, Handler};
use crate::core::request::RequestInfo;
use crate::core::response::ResponseWriter;
use crate::pipeline::definition::Pipeline;
use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::future::Future;
use std::sync::Arc;
use tracing::{event, Level};

/// A pipeline bound to its terminal handler.
///
/// Each `serve` call runs the inbound pass, the handler (only if the pass was
/// neither cancelled nor faulted), and then always the outbound pass for the
/// stages that ran. A panic in a stage or the handler is re-raised after the
/// outbound pass. Per-request bookkeeping lives on the call stack, so one
/// `Chained` can serve concurrent requests.
pub struct Chained<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  pipeline: Pipeline<Err>,
  handler: BoxedHandler<Err>,
}

impl<Err> Pipeline<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  /// Composes this pipeline with a terminal handler.
  ///
  /// `None` selects the pipeline's fallback handler (see
  /// `PipelineBuilder::fallback`).
  pub fn then(&self, handler: Option<BoxedHandler<Err>>) -> Chained<Err> {
    let handler = handler.unwrap_or_else(|| self.fallback.clone());
    Chained {
      pipeline: self.clone(),
      handler,
    }
  }

  /// Like `then`, for a handler that is not yet shared.
  pub fn then_handler(&self, handler: impl Handler<Err> + 'static) -> Chained<Err> {
    self.then(Some(Arc::new(handler)))
  }

  /// Like `then`, for an async closure.
  ///
  /// `pipeline.then_fn(f)` is equivalent to `pipeline.then_handler(handler_fn(f))`.
  pub fn then_fn<F, Fut, UserErr>(&self, f: F) -> Chained<Err>
  where
    F: Fn(Context, ResponseWriter, RequestInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + 'static,
  {
    self.then_handler(handler_fn(f))
  }
}

impl<Err> Chained<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  pub fn pipeline(&self) -> &Pipeline<Err> {
    &self.pipeline
  }

  pub fn handler(&self) -> &BoxedHandler<Err> {
    &self.handler
  }
}

#[async_trait]
impl<Err> Handler<Err> for Chained<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  async fn serve(&self, ctx: Context, res: ResponseWriter, req: RequestInfo) -> Result<(), Err> {
    let (pass, mut panicked) = self.pipeline.guarded_inbound(ctx, res.clone(), req.clone()).await;
    let should_serve = pass.should_serve();

    let outcome = match pass.fault {
      Some(e) => Err(e),
      None if panicked.is_some() => Ok(()),
      None if should_serve => {
        event!(Level::TRACE, "Invoking terminal handler.");
        let served = AssertUnwindSafe(self.handler.serve(pass.context.clone(), res, req.clone()))
          .catch_unwind()
          .await;
        match served {
          Ok(Err(e)) => {
            event!(Level::ERROR, error = %e, "Terminal handler failed.");
            Err(e)
          }
          Ok(Ok(())) => Ok(()),
          Err(payload) => {
            event!(Level::ERROR, "Terminal handler panicked.");
            panicked = Some(payload);
            Ok(())
          }
        }
      }
      None => {
        event!(Level::DEBUG, "Terminal handler skipped; request was cancelled.");
        Ok(())
      }
    };

    // Unwind regardless of how the inbound pass or the handler ended.
    self.pipeline.outbound(&pass.context, pass.progress, req).await;

    if let Some(payload) = panicked {
      panic::resume_unwind(payload);
    }
    outcome
  }
}

impl<Err> Clone for Chained<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  fn clone(&self) -> Self {
    Self {
      pipeline: self.pipeline.clone(),
      handler: Arc::clone(&self.handler),
    }
  }
}

impl<Err> fmt::Debug for Chained<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Chained")
      .field("pipeline", &self.pipeline)
      .finish_non_exhaustive()
  }
}
