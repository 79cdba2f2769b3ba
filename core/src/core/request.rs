// sluice/src/core/request.rs

//! Read-only request metadata shared by every stage and the terminal handler.

use bytes::Bytes;
use std::ops::Deref;
use std::sync::Arc;

/// A cheaply cloneable handle over the incoming `http::Request`.
///
/// Stages and handlers receive their own clone, so a boxed future can hold it
/// without borrowing from the caller.
#[derive(Debug, Clone)]
pub struct RequestInfo(Arc<http::Request<Bytes>>);

impl RequestInfo {
  pub fn new(request: http::Request<Bytes>) -> Self {
    RequestInfo(Arc::new(request))
  }

  /// Builds a body-less request for `method` and `uri`.
  ///
  /// Fails if `uri` does not parse.
  pub fn empty(method: http::Method, uri: &str) -> Result<Self, http::Error> {
    let request = http::Request::builder().method(method).uri(uri).body(Bytes::new())?;
    Ok(Self::new(request))
  }
}

impl Deref for RequestInfo {
  type Target = http::Request<Bytes>;

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl From<http::Request<Bytes>> for RequestInfo {
  fn from(request: http::Request<Bytes>) -> Self {
    Self::new(request)
  }
}
