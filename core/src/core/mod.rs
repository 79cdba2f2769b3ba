pub mod context;
pub mod control;
pub mod handler;
pub mod request;
pub mod response;
pub mod stage;

// Re-export key types for easier access from other sluice modules (and lib.rs)
pub use context::Context;
pub use control::{InboundPass, Progress};
pub use handler::{handler_fn, BoxedHandler, Handler, HandlerFn, NotFound};
pub use request::RequestInfo;
pub use response::ResponseWriter;
pub use stage::{BoxFuture, BoxedStage, FnStage, InboundStage, OutboundStage, Stage};
