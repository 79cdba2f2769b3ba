// sluice/examples/error_handling.rs

use bytes::Bytes;
use sluice::{Adapter, Context, Handler, Pipeline, RequestInfo, ResponseWriter};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum AppError {
  #[error("Sluice framework error: {0}")]
  Sluice(#[from] sluice::SluiceError),

  #[error("Upstream unavailable: {0}")]
  Upstream(String),

  #[error("Invalid input: {0}")]
  Validation(String),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Error Handling Example ---");

  let mut builder = Pipeline::<AppError>::builder();
  builder
    .stage(sluice::stage::from_fns(
      "tx",
      |ctx: Context, _res: ResponseWriter, _req: RequestInfo| async move {
        info!("Transaction opened.");
        Ok::<_, AppError>(ctx.with_value("tx", "open"))
      },
      |_ctx: Context, _req: RequestInfo| async move {
        // Runs whether the handler succeeded or not.
        info!("Transaction closed.");
      },
    ))?
    .inbound("validate", |ctx: Context, _res: ResponseWriter, req: RequestInfo| async move {
      if req.uri().query().is_some_and(|q| q.contains("bad")) {
        return Err(AppError::Validation("query rejected".to_string()));
      }
      Ok(ctx)
    })?;
  let pipeline = builder.build();

  // A handler whose dependency is down.
  let endpoint = pipeline.then_fn(|_ctx: Context, _res: ResponseWriter, _req: RequestInfo| async move {
    Err::<(), _>(AppError::Upstream("inventory service".to_string()))
  });

  // 1. Driving the chained handler directly surfaces the error.
  let req = RequestInfo::empty(http::Method::GET, "/items").map_err(|e| AppError::Validation(e.to_string()))?;
  match endpoint.serve(Context::background(), ResponseWriter::new(), req).await {
    Ok(()) => info!("Unexpected success."),
    Err(e) => warn!(error = %e, "Handler failed; outbound still ran."),
  }

  // 2. A stage fault unwinds only the stages that ran, then propagates.
  let req = RequestInfo::empty(http::Method::GET, "/items?bad=1").map_err(|e| AppError::Validation(e.to_string()))?;
  let pass = pipeline.inbound(Context::background(), ResponseWriter::new(), req.clone()).await;
  info!(progress = ?pass.progress, "Inbound pass ended.");
  pipeline.outbound(&pass.context, pass.progress, req).await;
  if let Some(e) = pass.fault {
    warn!(error = %e, "Stage fault reported to caller.");
  }

  // 3. An adapter converts errors into a 500 for the client.
  let adapter = Adapter::new(endpoint, None);
  let request = http::Request::builder()
    .uri("/items")
    .body(Bytes::new())
    .map_err(|e| AppError::Validation(e.to_string()))?;
  let response = adapter.serve(request).await;
  info!(status = %response.status(), "Client sees a generic error.");

  // 4. Setup mistakes come back as `SluiceError` and lift into `AppError`.
  let mut broken = Pipeline::<AppError>::builder();
  if let Err(e) = broken.insert_after("missing", sluice::stage::outbound("late", |_ctx, _req| async {})) {
    let lifted: AppError = e.into();
    warn!(error = %lifted, "Builder rejected the edit.");
  }
  Ok(())
}
