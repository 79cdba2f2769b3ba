// sluice/src/core/context.rs

//! Defines `Context`, the immutable request-scoped key/value carrier that is
//! threaded through every stage and into the terminal handler.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Key type for context values.
pub type ContextKey = Cow<'static, str>;

/// Type-erased value stored in a context.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

struct Node {
  key: ContextKey,
  value: ContextValue,
  parent: Option<Arc<Node>>,
}

/// An immutable, append-only key/value mapping with a cancellation flag.
///
/// Every derivation (`with_value`, `cancel`) returns a new `Context` and leaves
/// the receiver untouched, so a context handed to one stage can never be
/// changed behind its back by another. Derived contexts share their ancestry
/// through `Arc`, which makes `clone` and `with_value` O(1).
///
/// Lookups walk from the newest binding to the oldest: re-binding a key
/// shadows the previous value for every context derived afterwards.
#[derive(Clone, Default)]
pub struct Context {
  head: Option<Arc<Node>>,
  len: usize,
  cancellation: Option<Arc<str>>,
}

impl Context {
  /// The empty root context used when the dispatcher supplies none.
  pub fn background() -> Self {
    Self::default()
  }

  /// Returns a new context with `key` bound to `value`.
  ///
  /// Cancellation state is inherited from `self`.
  #[must_use]
  pub fn with_value<K, V>(&self, key: K, value: V) -> Self
  where
    K: Into<ContextKey>,
    V: Any + Send + Sync,
  {
    self.with_shared_value(key, Arc::new(value))
  }

  /// Like `with_value` but for a value that is already shared.
  #[must_use]
  pub fn with_shared_value<K: Into<ContextKey>>(&self, key: K, value: ContextValue) -> Self {
    Self {
      head: Some(Arc::new(Node {
        key: key.into(),
        value,
        parent: self.head.clone(),
      })),
      len: self.len + 1,
      cancellation: self.cancellation.clone(),
    }
  }

  /// Looks up `key` and downcasts its value to `T`.
  ///
  /// Returns `None` if the key is unbound or its newest value is not a `T`.
  pub fn value<T: Any>(&self, key: &str) -> Option<&T> {
    self.raw_value(key).and_then(|v| v.downcast_ref::<T>())
  }

  /// Looks up `key` without downcasting.
  pub fn raw_value(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
    self.nodes().find(|n| n.key == key).map(|n| n.value.as_ref())
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.nodes().any(|n| n.key == key)
  }

  /// Iterates over bound keys, newest first. Shadowed keys appear once per binding.
  pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
    self.nodes().map(|n| n.key.as_ref())
  }

  /// Number of bindings made on this context's chain, including shadowed ones.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Returns a cancelled copy of this context.
  ///
  /// Cancellation is sticky: once a context is cancelled, every context derived
  /// from it is cancelled too, and the first reason recorded is kept.
  #[must_use]
  pub fn cancel(&self, reason: impl Into<String>) -> Self {
    let mut next = self.clone();
    if next.cancellation.is_none() {
      next.cancellation = Some(Arc::from(reason.into()));
    }
    next
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancellation.is_some()
  }

  /// The reason given when the context was cancelled, if it was.
  pub fn cancellation(&self) -> Option<&str> {
    self.cancellation.as_deref()
  }

  fn nodes(&self) -> Nodes<'_> {
    Nodes {
      next: self.head.as_deref(),
    }
  }
}

struct Nodes<'a> {
  next: Option<&'a Node>,
}

impl<'a> Iterator for Nodes<'a> {
  type Item = &'a Node;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.next?;
    self.next = node.parent.as_deref();
    Some(node)
  }
}

// Values are opaque, so only keys and cancellation state are shown.
impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context")
      .field("keys", &self.keys().collect::<Vec<_>>())
      .field("cancellation", &self.cancellation)
      .finish()
  }
}
