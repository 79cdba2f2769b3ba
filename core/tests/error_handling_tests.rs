// tests/error_handling_tests.rs
mod common;

use common::*;
use serial_test::serial;
use sluice::{Context, Handler, Pipeline, Progress, RequestInfo, ResponseWriter, SluiceError};

#[tokio::test]
#[serial]
async fn test_stage_fault_unwinds_stages_that_ran_and_propagates() {
  setup_tracing();
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder.stage(tag_stage("A", &trace)).unwrap();
  builder.stage(failing_stage("B", &trace)).unwrap();
  builder.stage(tag_stage("C", &trace)).unwrap();
  let handler = builder.build().then_handler(tag_app("X", &trace));

  let result = handler
    .serve(Context::background(), ResponseWriter::new(), get_request("/"))
    .await;

  assert_eq!(result, Err(TestError::Stage("B broke".to_string())));
  assert_eq!(trace.entries(), vec!["A", "B", "B-out", "A-out"]);
}

#[tokio::test]
#[serial]
async fn test_inbound_reports_fault_index() {
  setup_tracing();
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder
    .inbound("bind", |ctx: Context, _res: ResponseWriter, _req: RequestInfo| async move {
      Ok::<_, TestError>(ctx.with_value("bound", true))
    })
    .unwrap();
  builder.stage(failing_stage("boom", &trace)).unwrap();
  let pipeline = builder.build();

  let pass = pipeline
    .inbound(Context::background(), ResponseWriter::new(), get_request("/"))
    .await;

  assert_eq!(pass.progress, Progress::Faulted { at: 1 });
  assert!(pass.is_faulted());
  assert!(!pass.is_cancelled());
  // The context handed to the failing stage is kept.
  assert_eq!(pass.context.value::<bool>("bound"), Some(&true));
  assert_eq!(pass.fault, Some(TestError::Stage("boom broke".to_string())));
}

#[tokio::test]
#[serial]
async fn test_handler_fault_still_runs_full_outbound() {
  setup_tracing();
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder.stage(tag_stage("A", &trace)).unwrap();
  builder.stage(tag_stage("B", &trace)).unwrap();
  let handler = builder.build().then_fn(|_ctx: Context, _res: ResponseWriter, _req: RequestInfo| async move {
    Err::<(), _>(TestError::Handler("db down".to_string()))
  });

  let result = handler
    .serve(Context::background(), ResponseWriter::new(), get_request("/"))
    .await;

  assert_eq!(result, Err(TestError::Handler("db down".to_string())));
  assert_eq!(trace.entries(), vec!["A", "B", "B-out", "A-out"]);
}

#[tokio::test]
#[serial]
async fn test_first_stage_fault_unwinds_only_itself() {
  setup_tracing();
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder.stage(failing_stage("A", &trace)).unwrap();
  builder.stage(tag_stage("B", &trace)).unwrap();
  let handler = builder.build().then_handler(tag_app("X", &trace));

  let result = handler
    .serve(Context::background(), ResponseWriter::new(), get_request("/"))
    .await;

  assert!(result.is_err());
  assert_eq!(trace.entries(), vec!["A", "A-out"]);
}

#[tokio::test]
#[serial]
async fn test_anyhow_errors_convert_into_sluice_error() {
  setup_tracing();
  let mut builder = Pipeline::<SluiceError>::builder();
  builder
    .inbound("parse", |_ctx: Context, _res: ResponseWriter, _req: RequestInfo| async move {
      Err::<Context, _>(anyhow::anyhow!("malformed header"))
    })
    .unwrap();
  let handler = builder.build().then(None);

  let result = handler
    .serve(Context::background(), ResponseWriter::new(), get_request("/"))
    .await;

  match result {
    Err(SluiceError::HandlerError { source }) => assert_eq!(source.to_string(), "malformed header"),
    other => panic!("Expected SluiceError::HandlerError, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_sluice_error_survives_anyhow_round_trip() {
  setup_tracing();
  let wrapped = anyhow::Error::new(SluiceError::Internal("kept".to_string()));
  match SluiceError::from(wrapped) {
    SluiceError::Internal(msg) => assert_eq!(msg, "kept"),
    other => panic!("Expected SluiceError::Internal, got {:?}", other),
  }
}

#[test]
fn test_builder_rejects_duplicate_stage_names() {
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder.stage(tag_stage("A", &trace)).unwrap();

  match builder.stage(tag_stage("A", &trace)) {
    Err(SluiceError::DuplicateStage { stage_name }) => assert_eq!(stage_name, "A"),
    Err(other) => panic!("Expected SluiceError::DuplicateStage, got {:?}", other),
    Ok(_) => panic!("Expected SluiceError::DuplicateStage, got Ok"),
  }
  assert_eq!(builder.build().stage_names(), vec!["A"]);
}

#[test]
fn test_builder_rejects_unknown_anchor() {
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder.stage(tag_stage("A", &trace)).unwrap();

  let err = builder
    .insert_before("missing", tag_stage("B", &trace))
    .err()
    .expect("insert_before should fail");
  assert!(matches!(err, SluiceError::StageNotFound { ref stage_name } if stage_name == "missing"));

  // The error can be lifted into an application error type.
  let lifted: TestError = err.into();
  assert!(matches!(lifted, TestError::Sluice(ref s) if s.contains("StageNotFound")));
}

#[tokio::test]
#[serial]
async fn test_handler_panic_still_unwinds_and_reaches_caller() {
  setup_tracing();
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder.stage(tag_stage("A", &trace)).unwrap();
  builder.stage(tag_stage("B", &trace)).unwrap();
  let handler = builder.build().then_handler(panicking_app("X", &trace));

  let joined = tokio::spawn(async move {
    handler
      .serve(Context::background(), ResponseWriter::new(), get_request("/"))
      .await
  })
  .await;

  let err = joined.expect_err("the panic should reach the caller");
  assert!(err.is_panic());
  let payload = err.into_panic();
  assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("X blew up"));
  assert_eq!(trace.entries(), vec!["A", "B", "X", "B-out", "A-out"]);
}

#[tokio::test]
#[serial]
async fn test_stage_panic_unwinds_stages_that_ran() {
  setup_tracing();
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder.stage(tag_stage("A", &trace)).unwrap();
  builder.stage(panicking_stage("B", &trace)).unwrap();
  builder.stage(tag_stage("C", &trace)).unwrap();
  let handler = builder.build().then_handler(tag_app("X", &trace));

  let joined = tokio::spawn(async move {
    handler
      .serve(Context::background(), ResponseWriter::new(), get_request("/"))
      .await
  })
  .await;

  assert!(joined.expect_err("the panic should reach the caller").is_panic());
  assert_eq!(trace.entries(), vec!["A", "B", "B-out", "A-out"]);
}

#[tokio::test]
#[serial]
async fn test_inbound_alone_lets_stage_panic_through() {
  setup_tracing();
  let trace = Trace::new();
  let mut builder = Pipeline::<TestError>::builder();
  builder.stage(tag_stage("A", &trace)).unwrap();
  builder.stage(panicking_stage("B", &trace)).unwrap();
  let pipeline = builder.build();

  let joined = tokio::spawn(async move {
    pipeline
      .inbound(Context::background(), ResponseWriter::new(), get_request("/"))
      .await
      .progress
  })
  .await;

  // Driving the passes by hand leaves unwinding to the caller.
  assert!(joined.expect_err("the panic should reach the caller").is_panic());
  assert_eq!(trace.entries(), vec!["A", "B"]);
}
