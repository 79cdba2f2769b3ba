// sluice/examples/pipeline_cancel.rs

use bytes::Bytes;
use http::StatusCode;
use sluice::{Adapter, Context, Pipeline, RequestInfo, ResponseWriter, SluiceError};
use tracing::{error, info};

fn request(token: Option<&str>) -> Result<http::Request<Bytes>, SluiceError> {
  let mut builder = http::Request::builder().uri("/account");
  if let Some(token) = token {
    builder = builder.header(http::header::AUTHORIZATION, token);
  }
  builder.body(Bytes::new()).map_err(|e| SluiceError::Internal(e.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), SluiceError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Pipeline Cancel Example ---");

  let mut builder = Pipeline::<SluiceError>::builder();
  builder
    .stage(sluice::stage::from_fns(
      "log",
      |ctx: Context, _res: ResponseWriter, req: RequestInfo| async move {
        info!(uri = %req.uri(), "-> inbound");
        Ok::<_, SluiceError>(ctx)
      },
      |ctx: Context, _req: RequestInfo| async move {
        info!(cancelled = ?ctx.cancellation(), "<- outbound");
      },
    ))?
    // Refuses requests without a bearer token. It writes the 401 itself;
    // the pipeline only stops calling further stages.
    .inbound("auth", |ctx: Context, res: ResponseWriter, req: RequestInfo| async move {
      let authorized = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
      if !authorized {
        res.write_status(StatusCode::UNAUTHORIZED);
        res.write_str("missing credentials\n");
        return Ok::<_, SluiceError>(ctx.cancel("unauthorized"));
      }
      Ok(ctx.with_value("user", "alice".to_string()))
    })?
    .inbound("never_without_auth", |ctx: Context, _res: ResponseWriter, _req: RequestInfo| async move {
      if ctx.value::<String>("user").is_none() {
        error!("Reached a stage after cancellation (SHOULD NOT HAPPEN).");
      }
      Ok::<_, SluiceError>(ctx)
    })?;

  let endpoint = builder.build().then_fn(|ctx: Context, res: ResponseWriter, _req: RequestInfo| async move {
    let user = ctx.value::<String>("user").cloned().unwrap_or_default();
    res.write_str(&format!("balance for {user}: 100\n"));
    Ok::<_, SluiceError>(())
  });
  let adapter = Adapter::new(endpoint, None);

  for token in [None, Some("Bearer abc")] {
    let response = adapter.serve(request(token)?).await;
    info!(
      status = %response.status(),
      body = %String::from_utf8_lossy(response.body()).trim_end(),
      "Served request (token: {:?}).",
      token
    );
  }
  Ok(())
}
