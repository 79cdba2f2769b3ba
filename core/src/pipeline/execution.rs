// sluice/src/pipeline/execution.rs

//! Contains the two passes of a pipeline: `inbound`, which walks the stages in
//! order and records how far it got, and `outbound`, which unwinds exactly the
//! stages that ran, in reverse.

use crate::core::context::Context;
use crate::core::control::{InboundPass, PanicPayload, Progress};
use crate::core::request::RequestInfo;
use crate::core::response::ResponseWriter;
use crate::pipeline::definition::Pipeline;
use futures::FutureExt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{event, info_span, instrument, Instrument, Level};

impl<Err> Pipeline<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  /// Runs every stage's inbound in declaration order.
  ///
  /// Stops right after the first stage that returns a cancelled context or an
  /// error; later stages never run. The returned `InboundPass` carries the
  /// context in effect at that point and the high-water mark needed by
  /// `outbound`.
  ///
  /// An empty pipeline returns `ctx` unchanged with `Progress::NotStarted`.
  ///
  /// A panicking stage is not unwound here; the panic propagates to the caller.
  pub async fn inbound(&self, ctx: Context, res: ResponseWriter, req: RequestInfo) -> InboundPass<Err> {
    let (pass, panicked) = self.guarded_inbound(ctx, res, req).await;
    if let Some(payload) = panicked {
      panic::resume_unwind(payload);
    }
    pass
  }

  /// Inbound pass that stops at a panicking stage instead of unwinding
  /// through the caller. The pass is then `Faulted` at that stage and the
  /// payload is handed back for re-raising once outbound has run.
  #[instrument(
    name = "Pipeline::inbound",
    skip_all,
    fields(
      num_stages = self.stages.len(),
      method = %req.method(),
      uri = %req.uri(),
    )
  )]
  pub(crate) async fn guarded_inbound(
    &self,
    ctx: Context,
    res: ResponseWriter,
    req: RequestInfo,
  ) -> (InboundPass<Err>, Option<PanicPayload>) {
    if self.stages.is_empty() {
      event!(Level::TRACE, "No stages; inbound pass is a no-op.");
      let pass = InboundPass {
        context: ctx,
        progress: Progress::NotStarted,
        fault: None,
      };
      return (pass, None);
    }

    event!(Level::DEBUG, "Inbound pass starting.");
    let mut ctx = ctx;

    for (stage_idx, stage) in self.stages.iter().enumerate() {
      let stage_span = info_span!("inbound_stage", stage_name = stage.name(), stage_index = stage_idx);

      let result = AssertUnwindSafe(stage.inbound(ctx.clone(), res.clone(), req.clone()).instrument(stage_span))
        .catch_unwind()
        .await;

      let result = match result {
        Ok(result) => result,
        Err(payload) => {
          event!(Level::ERROR, stage_name = stage.name(), stage_index = stage_idx, "Stage inbound panicked.");
          let pass = InboundPass {
            context: ctx,
            progress: Progress::Faulted { at: stage_idx },
            fault: None,
          };
          return (pass, Some(payload));
        }
      };

      match result {
        Ok(next) if next.is_cancelled() => {
          event!(
            Level::INFO,
            stage_name = stage.name(),
            stage_index = stage_idx,
            reason = next.cancellation().unwrap_or_default(),
            "Inbound pass cancelled by stage."
          );
          let pass = InboundPass {
            context: next,
            progress: Progress::Cancelled { at: stage_idx },
            fault: None,
          };
          return (pass, None);
        }
        Ok(next) => ctx = next,
        Err(e) => {
          event!(Level::ERROR, stage_name = stage.name(), stage_index = stage_idx, error = %e, "Stage inbound failed.");
          let pass = InboundPass {
            context: ctx,
            progress: Progress::Faulted { at: stage_idx },
            fault: Some(e),
          };
          return (pass, None);
        }
      }
    }

    event!(Level::DEBUG, "Inbound pass completed.");
    let pass = InboundPass {
      context: ctx,
      progress: Progress::Completed,
      fault: None,
    };
    (pass, None)
  }

  /// Runs outbound for exactly the stages whose inbound ran, last one first.
  ///
  /// `progress` must come from an `inbound` call on this same pipeline for the
  /// same request; every stage outbound receives `ctx`. A mark pointing past
  /// the last stage is a caller bug: it trips a debug assertion, and release
  /// builds clamp it to the last stage.
  #[instrument(name = "Pipeline::outbound", skip_all, fields(num_stages = self.stages.len(), ?progress))]
  pub async fn outbound(&self, ctx: &Context, progress: Progress, req: RequestInfo) {
    let (Some(last), Some(start)) = (self.stages.len().checked_sub(1), progress.unwind_from(self.stages.len())) else {
      event!(Level::TRACE, "Nothing to unwind.");
      return;
    };
    debug_assert!(
      start <= last,
      "outbound start index {start} is past the last stage {last}; progress came from another pipeline"
    );
    let start = start.min(last);

    event!(Level::DEBUG, start_index = start, "Outbound pass starting.");
    for stage_idx in (0..=start).rev() {
      let stage = &self.stages[stage_idx];
      let stage_span = info_span!("outbound_stage", stage_name = stage.name(), stage_index = stage_idx);
      stage.outbound(ctx.clone(), req.clone()).instrument(stage_span).await;
    }
    event!(Level::DEBUG, "Outbound pass completed.");
  }
}
