// sluice/src/core/response.rs

//! The response side-channel through which stages and handlers signal
//! success or failure to the client.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{event, Level};

#[derive(Debug, Default)]
struct ResponseState {
  status: Option<StatusCode>,
  headers: HeaderMap,
  body: BytesMut,
}

/// A buffered, shareable response.
///
/// Clones refer to the same underlying response. The pipeline never writes to
/// it; only stages and handlers do.
///
/// The status line is committed once: by the first `write_status` call, or
/// implicitly as `200 OK` by the first body write. Later status changes are
/// ignored.
///
/// IMPORTANT: the lock is only held inside each method call, never across an
/// `.await`.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter(Arc<Mutex<ResponseState>>);

impl ResponseWriter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Commits the status code. Returns `false` if a status was already committed.
  pub fn write_status(&self, status: StatusCode) -> bool {
    let mut state = self.0.lock();
    match state.status {
      Some(existing) => {
        event!(Level::WARN, %existing, ignored = %status, "Response status already committed; ignoring.");
        false
      }
      None => {
        state.status = Some(status);
        true
      }
    }
  }

  /// Sets a header, replacing any previous value under the same name.
  pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
    self.0.lock().headers.insert(name, value);
  }

  /// Appends bytes to the body, committing `200 OK` if no status was written.
  pub fn write(&self, chunk: impl AsRef<[u8]>) {
    let mut state = self.0.lock();
    state.status.get_or_insert(StatusCode::OK);
    state.body.extend_from_slice(chunk.as_ref());
  }

  pub fn write_str(&self, s: &str) {
    self.write(s.as_bytes());
  }

  /// The committed status, if any.
  pub fn status(&self) -> Option<StatusCode> {
    self.0.lock().status
  }

  pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
    self.0.lock().headers.get(name).cloned()
  }

  /// A snapshot of the body written so far.
  pub fn body(&self) -> Bytes {
    Bytes::copy_from_slice(&self.0.lock().body)
  }

  /// Lossy UTF-8 view of the body, mostly useful in tests and logs.
  pub fn body_string(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().body).into_owned()
  }

  pub fn is_committed(&self) -> bool {
    self.0.lock().status.is_some()
  }

  /// Builds the final `http::Response` from what was written.
  ///
  /// Drains the shared buffer; other clones observe an empty response afterwards.
  /// An uncommitted response becomes `200 OK` with an empty body.
  pub fn into_response(self) -> http::Response<Bytes> {
    let mut state = std::mem::take(&mut *self.0.lock());
    let mut response = http::Response::new(state.body.split().freeze());
    *response.status_mut() = state.status.unwrap_or(StatusCode::OK);
    *response.headers_mut() = state.headers;
    response
  }
}
