// sluice/src/core/handler.rs

//! Defines the terminal `Handler` capability and the default fallback.

use crate::core::context::Context;
use crate::core::request::RequestInfo;
use crate::core::response::ResponseWriter;
use crate::core::stage::BoxFuture;
use async_trait::async_trait;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use std::future::Future;
use std::sync::Arc;
use tracing::{event, Level};

/// The request's business logic.
///
/// A handler writes its outcome to the `ResponseWriter`. An `Err` is a fault,
/// not a response: it is handed back to whoever invoked the handler.
#[async_trait]
pub trait Handler<Err: Send + 'static>: Send + Sync {
  async fn serve(&self, ctx: Context, res: ResponseWriter, req: RequestInfo) -> Result<(), Err>;
}

/// A handler shared between pipelines, chains and adapters.
pub type BoxedHandler<Err> = Arc<dyn Handler<Err>>;

type ServeFn<Err> = Box<dyn Fn(Context, ResponseWriter, RequestInfo) -> BoxFuture<'static, Result<(), Err>> + Send + Sync>;

/// A handler backed by a closure. Built with `handler_fn`.
pub struct HandlerFn<Err> {
  f: ServeFn<Err>,
}

/// Wraps an async closure as a `Handler`.
pub fn handler_fn<Err, F, Fut, UserErr>(f: F) -> HandlerFn<Err>
where
  F: Fn(Context, ResponseWriter, RequestInfo) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<(), UserErr>> + Send + 'static,
  UserErr: Into<Err> + Send + 'static,
  Err: Send + 'static,
{
  HandlerFn {
    f: Box::new(move |ctx, res, req| -> BoxFuture<'static, Result<(), Err>> {
      let user_fut = f(ctx, res, req);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    }),
  }
}

#[async_trait]
impl<Err: Send + 'static> Handler<Err> for HandlerFn<Err> {
  async fn serve(&self, ctx: Context, res: ResponseWriter, req: RequestInfo) -> Result<(), Err> {
    (self.f)(ctx, res, req).await
  }
}

/// The default fallback: answers every request with `404 Not Found`.
///
/// Used by pipelines that were not given a fallback of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

pub(crate) const NOT_FOUND_BODY: &str = "404 page not found\n";

#[async_trait]
impl<Err: Send + 'static> Handler<Err> for NotFound {
  async fn serve(&self, _ctx: Context, res: ResponseWriter, req: RequestInfo) -> Result<(), Err> {
    event!(Level::DEBUG, method = %req.method(), uri = %req.uri(), "No handler; answering 404.");
    res.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    res.write_status(StatusCode::NOT_FOUND);
    res.write_str(NOT_FOUND_BODY);
    Ok(())
  }
}
