//! A captured terminal outcome.

use crate::observer::MaybeObserver;

/// The terminal signal of a single-shot source, stored so it can be
/// delivered later or to several observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<Item, Err> {
  Success(Item),
  Complete,
  Error(Err),
}

impl<Item, Err> Notification<Item, Err> {
  /// Replays the outcome into `observer`.
  pub fn deliver<O: MaybeObserver<Item, Err>>(self, observer: O) {
    match self {
      Notification::Success(value) => observer.on_success(value),
      Notification::Complete => observer.on_complete(),
      Notification::Error(err) => observer.on_error(err),
    }
  }
}
