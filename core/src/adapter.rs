// sluice/src/adapter.rs

//! Defines `Adapter`, the entry point a dispatcher calls once per request.
//! It pairs a handler (usually a `Chained` pipeline) with a base context and
//! turns an `http::Request` into an `http::Response`.

use crate::core::context::Context;
use crate::core::handler::{BoxedHandler, Handler};
use crate::core::request::RequestInfo;
use crate::core::response::ResponseWriter;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use std::fmt;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Serves requests by delegating to a handler with a fixed base context.
///
/// Every request starts from a clone of the base context, so values bound
/// while serving one request are never visible to another.
pub struct Adapter<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  base: Context,
  handler: BoxedHandler<Err>,
}

impl<Err> Adapter<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  /// Creates an adapter. A `None` base context means `Context::background()`.
  pub fn new(handler: impl Handler<Err> + 'static, base: Option<Context>) -> Self {
    Self::from_shared(Arc::new(handler), base)
  }

  pub fn from_shared(handler: BoxedHandler<Err>, base: Option<Context>) -> Self {
    Self {
      base: base.unwrap_or_default(),
      handler,
    }
  }

  pub fn base_context(&self) -> &Context {
    &self.base
  }

  /// Serves one request and returns whatever the handler wrote, or the
  /// handler's error.
  #[instrument(
    name = "Adapter::try_serve",
    skip_all,
    fields(method = %request.method(), uri = %request.uri()),
    err(Display)
  )]
  pub async fn try_serve(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>, Err> {
    let res = ResponseWriter::new();
    self
      .handler
      .serve(self.base.clone(), res.clone(), RequestInfo::new(request))
      .await?;
    Ok(res.into_response())
  }

  /// Serves one request, turning a handler error into `500 Internal Server Error`.
  ///
  /// If the failing handler had already committed a status, that response is
  /// returned as written.
  #[instrument(name = "Adapter::serve", skip_all, fields(method = %request.method(), uri = %request.uri()))]
  pub async fn serve(&self, request: http::Request<Bytes>) -> http::Response<Bytes> {
    let res = ResponseWriter::new();
    let outcome = self
      .handler
      .serve(self.base.clone(), res.clone(), RequestInfo::new(request))
      .await;

    if let Err(e) = outcome {
      event!(Level::ERROR, error = %e, "Request failed.");
      if !res.is_committed() {
        res.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        res.write_status(StatusCode::INTERNAL_SERVER_ERROR);
        res.write_str("Internal Server Error\n");
      }
    }
    res.into_response()
  }
}

impl<Err> Clone for Adapter<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  fn clone(&self) -> Self {
    Self {
      base: self.base.clone(),
      handler: Arc::clone(&self.handler),
    }
  }
}

impl<Err> fmt::Debug for Adapter<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Adapter")
      .field("base", &self.base)
      .finish_non_exhaustive()
  }
}
