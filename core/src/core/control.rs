// sluice/src/core/control.rs

//! Bookkeeping for how far an inbound pass got, and what it handed over to
//! the terminal handler and the outbound pass.

use crate::core::context::Context;
use std::any::Any;

/// Payload of a panic caught while a pass was running.
pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// High-water mark of a single inbound pass.
///
/// This is per-request state: it is produced by `Pipeline::inbound` and
/// consumed by `Pipeline::outbound`, and is never stored on the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
  /// The pipeline has no stages; there is nothing to unwind.
  NotStarted,
  /// Every stage's inbound ran and none cancelled.
  Completed,
  /// The stage at `at` returned a cancelled context. Its inbound counts as run.
  Cancelled { at: usize },
  /// The stage at `at` returned an error from its inbound. Its inbound counts as run.
  Faulted { at: usize },
}

impl Progress {
  /// Index of the first stage the outbound pass visits, for a pipeline of
  /// `num_stages` stages. `None` means no outbound runs at all.
  pub fn unwind_from(self, num_stages: usize) -> Option<usize> {
    match self {
      Progress::NotStarted => None,
      Progress::Completed => num_stages.checked_sub(1),
      Progress::Cancelled { at } | Progress::Faulted { at } => Some(at),
    }
  }

  /// Whether the terminal handler may run after this pass.
  pub fn reached_handler(self) -> bool {
    matches!(self, Progress::NotStarted | Progress::Completed)
  }
}

/// Outcome of `Pipeline::inbound`.
#[derive(Debug)]
pub struct InboundPass<Err> {
  /// The context in effect when the pass stopped. For a faulted pass this is
  /// the context the failing stage was given.
  pub context: Context,
  pub progress: Progress,
  /// Error returned by the faulting stage, if any.
  pub fault: Option<Err>,
}

impl<Err> InboundPass<Err> {
  pub fn is_cancelled(&self) -> bool {
    matches!(self.progress, Progress::Cancelled { .. })
  }

  pub fn is_faulted(&self) -> bool {
    self.fault.is_some()
  }

  /// Whether the terminal handler should run after this pass.
  ///
  /// False if a stage stopped the pass, and also if the context is cancelled
  /// even though no stage ran (an empty pipeline given a cancelled context).
  pub fn should_serve(&self) -> bool {
    self.fault.is_none() && self.progress.reached_handler() && !self.context.is_cancelled()
  }
}
