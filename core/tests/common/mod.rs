// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use bytes::Bytes;
use http::StatusCode;
use parking_lot::Mutex;
use sluice::{stage, Context, FnStage, HandlerFn, RequestInfo, ResponseWriter, SluiceError};
use std::sync::Arc;
use tracing::Level;

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Sluice framework error: {0}")]
  Sluice(String), // Store as String for Eq comparison

  #[error("Test stage failed: {0}")]
  Stage(String),

  #[error("Test handler failed: {0}")]
  Handler(String),
}

impl From<SluiceError> for TestError {
  fn from(se: SluiceError) -> Self {
    TestError::Sluice(format!("{:?}", se))
  }
}

/// Shared, ordered log of everything stages and handlers did.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, entry: impl Into<String>) {
    self.0.lock().push(entry.into());
  }

  pub fn entries(&self) -> Vec<String> {
    self.0.lock().clone()
  }
}

// --- Common Stage and Handler Creators ---

/// Writes `tag` to the response on the way in and `{tag}-out` to the trace on
/// the way out. Records both phases in `trace`.
pub fn tag_stage(tag: &'static str, trace: &Trace) -> FnStage<TestError> {
  let in_trace = trace.clone();
  let out_trace = trace.clone();
  stage::from_fns(
    tag,
    move |ctx: Context, res: ResponseWriter, _req: RequestInfo| {
      let trace = in_trace.clone();
      async move {
        res.write_str(tag);
        trace.push(tag);
        Ok::<_, TestError>(ctx)
      }
    },
    move |_ctx: Context, _req: RequestInfo| {
      let trace = out_trace.clone();
      async move {
        trace.push(format!("{tag}-out"));
      }
    },
  )
}

/// Like `tag_stage`, but cancels the request with `403 Forbidden` after
/// tagging.
pub fn cancelling_stage(tag: &'static str, trace: &Trace) -> FnStage<TestError> {
  let in_trace = trace.clone();
  let out_trace = trace.clone();
  stage::from_fns(
    tag,
    move |ctx: Context, res: ResponseWriter, _req: RequestInfo| {
      let trace = in_trace.clone();
      async move {
        res.write_status(StatusCode::FORBIDDEN);
        res.write_str(tag);
        trace.push(tag);
        Ok::<_, TestError>(ctx.cancel(format!("{tag} refused")))
      }
    },
    move |_ctx: Context, _req: RequestInfo| {
      let trace = out_trace.clone();
      async move {
        trace.push(format!("{tag}-out"));
      }
    },
  )
}

/// Records its inbound, then fails with `TestError::Stage`.
pub fn failing_stage(tag: &'static str, trace: &Trace) -> FnStage<TestError> {
  let in_trace = trace.clone();
  let out_trace = trace.clone();
  stage::from_fns(
    tag,
    move |_ctx: Context, _res: ResponseWriter, _req: RequestInfo| {
      let trace = in_trace.clone();
      async move {
        trace.push(tag);
        Err::<Context, _>(TestError::Stage(format!("{tag} broke")))
      }
    },
    move |_ctx: Context, _req: RequestInfo| {
      let trace = out_trace.clone();
      async move {
        trace.push(format!("{tag}-out"));
      }
    },
  )
}

fn blow_up<T>(tag: &str) -> Result<T, TestError> {
  panic!("{tag} blew up")
}

/// Records its inbound, then panics.
pub fn panicking_stage(tag: &'static str, trace: &Trace) -> FnStage<TestError> {
  let in_trace = trace.clone();
  let out_trace = trace.clone();
  stage::from_fns(
    tag,
    move |_ctx: Context, _res: ResponseWriter, _req: RequestInfo| {
      let trace = in_trace.clone();
      async move {
        trace.push(tag);
        blow_up::<Context>(tag)
      }
    },
    move |_ctx: Context, _req: RequestInfo| {
      let trace = out_trace.clone();
      async move {
        trace.push(format!("{tag}-out"));
      }
    },
  )
}

/// Terminal handler that records `tag` and then panics.
pub fn panicking_app(tag: &'static str, trace: &Trace) -> HandlerFn<TestError> {
  let trace = trace.clone();
  sluice::handler_fn(move |_ctx: Context, _res: ResponseWriter, _req: RequestInfo| {
    let trace = trace.clone();
    async move {
      trace.push(tag);
      blow_up::<()>(tag)
    }
  })
}

/// Terminal handler that writes `tag` and records it.
pub fn tag_app(tag: &'static str, trace: &Trace) -> HandlerFn<TestError> {
  let trace = trace.clone();
  sluice::handler_fn(move |_ctx: Context, res: ResponseWriter, _req: RequestInfo| {
    let trace = trace.clone();
    async move {
      res.write_str(tag);
      trace.push(tag);
      Ok::<_, TestError>(())
    }
  })
}

/// Terminal handler that writes the string stored under `key`.
pub fn context_value_app(key: &'static str) -> HandlerFn<TestError> {
  sluice::handler_fn(move |ctx: Context, res: ResponseWriter, _req: RequestInfo| async move {
    let value = ctx.value::<String>(key).cloned().unwrap_or_else(|| "<missing>".to_string());
    res.write_str(&value);
    Ok::<_, TestError>(())
  })
}

pub fn get_request(uri: &str) -> RequestInfo {
  RequestInfo::empty(http::Method::GET, uri).expect("valid test uri")
}

pub fn http_request(method: http::Method, uri: &str) -> http::Request<Bytes> {
  http::Request::builder()
    .method(method)
    .uri(uri)
    .body(Bytes::new())
    .expect("valid test request")
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::TRACE)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
