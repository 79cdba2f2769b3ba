// sluice/src/core/stage.rs

//! Defines the `Stage` capability: a named unit with an inbound context
//! transform and an outbound finalizer, plus builders for closures.

use crate::core::context::Context;
use crate::core::request::RequestInfo;
use crate::core::response::ResponseWriter;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased inbound closure. Errors are already converted to the pipeline's `Err`.
pub type InboundFn<Err> =
  Box<dyn Fn(Context, ResponseWriter, RequestInfo) -> BoxFuture<'static, Result<Context, Err>> + Send + Sync>;

/// Type-erased outbound closure.
pub type OutboundFn = Box<dyn Fn(Context, RequestInfo) -> BoxFuture<'static, ()> + Send + Sync>;

/// A stage shared between a pipeline and any pipelines derived from it.
pub type BoxedStage<Err> = Arc<dyn Stage<Err>>;

/// One unit of pipeline behavior.
///
/// `inbound` runs on the way in, in declaration order. It receives the current
/// context and returns the context for the next stage. To short-circuit the
/// request it returns a cancelled context (see `Context::cancel`); writing any
/// client-visible error to the `ResponseWriter` beforehand is the stage's job.
///
/// `outbound` runs after the terminal handler, in reverse order, and only if
/// this stage's `inbound` ran for the same request. It gets the final context
/// and cannot fail the request.
///
/// Both methods default to no-ops.
#[async_trait]
pub trait Stage<Err: Send + 'static>: Send + Sync {
  /// Name used for structural edits and in tracing spans. Unique per pipeline.
  fn name(&self) -> &str;

  async fn inbound(&self, ctx: Context, _res: ResponseWriter, _req: RequestInfo) -> Result<Context, Err> {
    Ok(ctx)
  }

  async fn outbound(&self, _ctx: Context, _req: RequestInfo) {}
}

/// A stage that only transforms the context on the way in.
pub struct InboundStage<Err> {
  name: String,
  f: InboundFn<Err>,
}

/// A stage that only finalizes on the way out.
pub struct OutboundStage {
  name: String,
  f: OutboundFn,
}

/// A stage with both capabilities supplied as closures.
pub struct FnStage<Err> {
  name: String,
  inbound: InboundFn<Err>,
  outbound: OutboundFn,
}

fn box_inbound<Err, F, Fut, UserErr>(f: F) -> InboundFn<Err>
where
  F: Fn(Context, ResponseWriter, RequestInfo) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Context, UserErr>> + Send + 'static,
  UserErr: Into<Err> + Send + 'static,
  Err: Send + 'static,
{
  Box::new(move |ctx, res, req| -> BoxFuture<'static, Result<Context, Err>> {
    let user_fut = f(ctx, res, req);
    Box::pin(async move { user_fut.await.map_err(Into::into) })
  })
}

fn box_outbound<F, Fut>(f: F) -> OutboundFn
where
  F: Fn(Context, RequestInfo) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  Box::new(move |ctx, req| -> BoxFuture<'static, ()> { Box::pin(f(ctx, req)) })
}

/// Builds an inbound-only stage from a closure.
///
/// The closure's error type only needs to convert into the pipeline's `Err`.
pub fn inbound<Err, F, Fut, UserErr>(name: impl Into<String>, f: F) -> InboundStage<Err>
where
  F: Fn(Context, ResponseWriter, RequestInfo) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Context, UserErr>> + Send + 'static,
  UserErr: Into<Err> + Send + 'static,
  Err: Send + 'static,
{
  InboundStage {
    name: name.into(),
    f: box_inbound(f),
  }
}

/// Builds an outbound-only stage from a closure.
pub fn outbound<F, Fut>(name: impl Into<String>, f: F) -> OutboundStage
where
  F: Fn(Context, RequestInfo) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  OutboundStage {
    name: name.into(),
    f: box_outbound(f),
  }
}

/// Builds a stage with both an inbound and an outbound closure.
pub fn from_fns<Err, FIn, FutIn, UserErr, FOut, FutOut>(
  name: impl Into<String>,
  inbound_fn: FIn,
  outbound_fn: FOut,
) -> FnStage<Err>
where
  FIn: Fn(Context, ResponseWriter, RequestInfo) -> FutIn + Send + Sync + 'static,
  FutIn: Future<Output = Result<Context, UserErr>> + Send + 'static,
  UserErr: Into<Err> + Send + 'static,
  FOut: Fn(Context, RequestInfo) -> FutOut + Send + Sync + 'static,
  FutOut: Future<Output = ()> + Send + 'static,
  Err: Send + 'static,
{
  FnStage {
    name: name.into(),
    inbound: box_inbound(inbound_fn),
    outbound: box_outbound(outbound_fn),
  }
}

#[async_trait]
impl<Err: Send + 'static> Stage<Err> for InboundStage<Err> {
  fn name(&self) -> &str {
    &self.name
  }

  async fn inbound(&self, ctx: Context, res: ResponseWriter, req: RequestInfo) -> Result<Context, Err> {
    (self.f)(ctx, res, req).await
  }
}

#[async_trait]
impl<Err: Send + 'static> Stage<Err> for OutboundStage {
  fn name(&self) -> &str {
    &self.name
  }

  async fn outbound(&self, ctx: Context, req: RequestInfo) {
    (self.f)(ctx, req).await
  }
}

#[async_trait]
impl<Err: Send + 'static> Stage<Err> for FnStage<Err> {
  fn name(&self) -> &str {
    &self.name
  }

  async fn inbound(&self, ctx: Context, res: ResponseWriter, req: RequestInfo) -> Result<Context, Err> {
    (self.inbound)(ctx, res, req).await
  }

  async fn outbound(&self, ctx: Context, req: RequestInfo) {
    (self.outbound)(ctx, req).await
  }
}

// Closures don't implement Debug; only the name is shown.
impl<Err> fmt::Debug for InboundStage<Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InboundStage").field("name", &self.name).finish()
  }
}

impl fmt::Debug for OutboundStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OutboundStage").field("name", &self.name).finish()
  }
}

impl<Err> fmt::Debug for FnStage<Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FnStage").field("name", &self.name).finish()
  }
}
