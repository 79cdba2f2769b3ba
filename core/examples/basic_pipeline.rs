// sluice/examples/basic_pipeline.rs

use bytes::Bytes;
use sluice::{Adapter, Context, Pipeline, RequestInfo, ResponseWriter, SluiceError};
use std::time::Instant;
use tracing::info;

#[derive(Clone, Debug)]
struct RequestId(u64);

#[tokio::main]
async fn main() -> Result<(), SluiceError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Basic Pipeline Example ---");

  // 1. Declare stages in the order their inbound halves should run.
  let mut builder = Pipeline::<SluiceError>::builder();
  builder
    .stage(sluice::stage::from_fns(
      "timing",
      |ctx: Context, _res: ResponseWriter, _req: RequestInfo| async move {
        Ok::<_, SluiceError>(ctx.with_value("started", Instant::now()))
      },
      |ctx: Context, req: RequestInfo| async move {
        if let Some(started) = ctx.value::<Instant>("started") {
          info!(uri = %req.uri(), elapsed = ?started.elapsed(), "Request finished.");
        }
      },
    ))?
    .inbound("request_id", |ctx: Context, res: ResponseWriter, _req: RequestInfo| async move {
      let id = RequestId(42);
      res.insert_header(
        http::header::HeaderName::from_static("x-request-id"),
        http::HeaderValue::from(id.0),
      );
      Ok::<_, SluiceError>(ctx.with_value("request_id", id))
    })?
    .outbound("audit", |ctx: Context, _req: RequestInfo| async move {
      info!(request_id = ?ctx.value::<RequestId>("request_id"), "Audit record written.");
    })?;
  let pipeline = builder.build();
  info!(stages = ?pipeline.stage_names(), "Pipeline built.");

  // 2. Bind the terminal handler.
  let endpoint = pipeline.then_fn(|ctx: Context, res: ResponseWriter, req: RequestInfo| async move {
    let id = ctx.value::<RequestId>("request_id").map(|id| id.0).unwrap_or_default();
    res.write_str(&format!("hello from {} (request {})\n", req.uri().path(), id));
    Ok::<_, SluiceError>(())
  });

  // 3. Serve a request the way a dispatcher would.
  let adapter = Adapter::new(endpoint, None);
  let request = http::Request::builder()
    .uri("/greet")
    .body(Bytes::new())
    .map_err(|e| SluiceError::Internal(e.to_string()))?;
  let response = adapter.try_serve(request).await?;

  info!(status = %response.status(), headers = ?response.headers(), "Response ready.");
  info!("Body: {}", String::from_utf8_lossy(response.body()));
  Ok(())
}
