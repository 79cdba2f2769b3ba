// src/lib.rs

//! Sluice: a two-phase request pipeline for Rust.
//!
//! A pipeline is an ordered list of stages wrapped around a terminal handler:
//!  - Each stage's inbound half runs in declaration order and may transform
//!    the request context or cancel the request.
//!  - The terminal handler runs only if no stage cancelled.
//!  - Each stage's outbound half runs afterwards in reverse order, but only
//!    for the stages whose inbound half actually ran.
//!  - Contexts are immutable; stages derive new ones with `with_value`.
//!  - Responses are written through a shared `ResponseWriter` side-channel.

pub mod adapter;
pub mod core;
pub mod error;
pub mod pipeline;

// --- Re-exports for the Public API ---

// Core types that users will interact with frequently
pub use crate::core::context::Context;
pub use crate::core::control::{InboundPass, Progress};
pub use crate::core::handler::{handler_fn, BoxedHandler, Handler, HandlerFn, NotFound};
pub use crate::core::request::RequestInfo;
pub use crate::core::response::ResponseWriter;
pub use crate::core::stage::{BoxFuture, BoxedStage, FnStage, InboundStage, OutboundStage, Stage};

// Closure builders: `stage::inbound`, `stage::outbound`, `stage::from_fns`
pub use crate::core::stage;

// The main Pipeline struct and its builder
pub use crate::pipeline::{Chained, Pipeline, PipelineBuilder};

pub use crate::adapter::Adapter;

pub use crate::error::{SluiceError, SluiceResult};

/*
    Typical request flow:
    1. Build a `Pipeline<MyError>` once at startup with `Pipeline::builder()`,
       adding stages via `.stage(..)`, `.inbound(..)` or `.outbound(..)`.
    2. Bind it to the endpoint with `pipeline.then_handler(h)` (or `then(None)`
       to use the pipeline's fallback).
    3. Wrap the result in an `Adapter` with an optional base context.
    4. Per request, the dispatcher calls `adapter.serve(request).await`.
*/
