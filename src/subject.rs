//! Hot sources driven by hand.
//!
//! The terminal subjects ([`SingleSubject`], [`MaybeSubject`],
//! [`CompletableSubject`]) keep the first terminal signal and replay it to
//! anyone who subscribes later. Signaling takes `&self`, so a subject can be
//! cloned into several producers; the first signal wins and the rest are
//! ignored.
//!
//! [`PublishSubject`] is the multi-value flavor: it forwards items only to
//! the observers present at the time, and replays its terminal signal.
//!
//! ```rust
//! use rxsingle::prelude::*;
//!
//! let subject = SingleSubject::<i32, ()>::new();
//! let got = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
//!
//! let c_got = got.clone();
//! subject.clone().subscribe(move |v| c_got.lock().unwrap().push(v), |_| {});
//! subject.on_success(1);
//! subject.on_success(2);
//!
//! let c_got = got.clone();
//! subject.clone().subscribe(move |v| c_got.lock().unwrap().push(v), |_| {});
//! assert_eq!(*got.lock().unwrap(), vec![1, 1]);
//! ```

mod publish;
pub(crate) mod terminal;

use std::sync::Arc;

pub use publish::PublishSubject;
use terminal::{subscribe_core, TerminalCore};

use crate::{
  adapter::{AsMaybeObserver, IgnoreValue},
  completable::CompletableSource,
  maybe::MaybeSource,
  notification::Notification,
  observer::{CompletableObserver, MaybeObserver, SingleObserver},
  single::SingleSource,
};

// ==================== SingleSubject ====================

/// A Single whose outcome is set from the outside.
pub struct SingleSubject<Item, Err> {
  core: Arc<TerminalCore<Item, Err>>,
}

impl<Item, Err> Clone for SingleSubject<Item, Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<Item, Err> SingleSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  pub fn new() -> Self { Self { core: Arc::new(TerminalCore::new()) } }

  pub fn on_success(&self, value: Item) { self.core.terminate(Notification::Success(value)); }

  pub fn on_error(&self, err: Err) { self.core.terminate(Notification::Error(err)); }

  /// Whether any observer is currently waiting for the outcome.
  pub fn has_observers(&self) -> bool { self.core.has_observers() }

  pub fn is_terminated(&self) -> bool { self.core.is_terminated() }
}

impl<Item, Err> Default for SingleSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn default() -> Self { Self::new() }
}

impl<Item, Err> SingleSource for SingleSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: SingleObserver<Self::Item, Self::Err>,
  {
    subscribe_core(&self.core, AsMaybeObserver(observer))
  }
}

// ==================== MaybeSubject ====================

/// A Maybe whose outcome is set from the outside.
pub struct MaybeSubject<Item, Err> {
  core: Arc<TerminalCore<Item, Err>>,
}

impl<Item, Err> Clone for MaybeSubject<Item, Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<Item, Err> MaybeSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  pub fn new() -> Self { Self { core: Arc::new(TerminalCore::new()) } }

  pub fn on_success(&self, value: Item) { self.core.terminate(Notification::Success(value)); }

  pub fn on_complete(&self) { self.core.terminate(Notification::Complete); }

  pub fn on_error(&self, err: Err) { self.core.terminate(Notification::Error(err)); }

  pub fn has_observers(&self) -> bool { self.core.has_observers() }

  pub fn is_terminated(&self) -> bool { self.core.is_terminated() }
}

impl<Item, Err> Default for MaybeSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn default() -> Self { Self::new() }
}

impl<Item, Err> MaybeSource for MaybeSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    subscribe_core(&self.core, observer)
  }
}

// ==================== CompletableSubject ====================

/// A Completable whose outcome is set from the outside.
pub struct CompletableSubject<Err> {
  core: Arc<TerminalCore<(), Err>>,
}

impl<Err> Clone for CompletableSubject<Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<Err: Clone + Send + 'static> CompletableSubject<Err> {
  pub fn new() -> Self { Self { core: Arc::new(TerminalCore::new()) } }

  pub fn on_complete(&self) { self.core.terminate(Notification::Complete); }

  pub fn on_error(&self, err: Err) { self.core.terminate(Notification::Error(err)); }

  pub fn has_observers(&self) -> bool { self.core.has_observers() }

  pub fn is_terminated(&self) -> bool { self.core.is_terminated() }
}

impl<Err: Clone + Send + 'static> Default for CompletableSubject<Err> {
  fn default() -> Self { Self::new() }
}

impl<Err: Clone + Send + 'static> CompletableSource for CompletableSubject<Err> {
  type Err = Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: CompletableObserver<Self::Err>,
  {
    subscribe_core(&self.core, IgnoreValue(observer))
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::Barrier, thread};

  use super::*;
  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn first_signal_wins() {
    let subject = MaybeSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    subject.clone().subscribe_with(spy.clone());
    subject.on_complete();
    subject.on_success(1);
    subject.on_error("late");
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn late_subscriber_gets_the_replay() {
    let subject = CompletableSubject::<&str>::new();
    subject.on_error("gone");
    let spy = TestObserver::<(), &str>::new();
    subject.clone().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("gone")]);
    assert!(!subject.has_observers());
  }

  #[rxsingle_macro::test]
  fn dispose_detaches_the_observer() {
    let subject = SingleSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    subject.clone().subscribe_with(spy.clone());
    assert!(subject.has_observers());
    spy.dispose();
    spy.dispose();
    assert!(!subject.has_observers());
    subject.on_success(3);
    assert!(spy.is_empty());
  }

  #[rxsingle_macro::test]
  fn concurrent_signals_deliver_once() {
    for _ in 0..50 {
      let subject = SingleSubject::<usize, usize>::new();
      let spy = TestObserver::<usize, usize>::new();
      subject.clone().subscribe_with(spy.clone());
      let barrier = Arc::new(Barrier::new(4));
      let handles: Vec<_> = (0..4)
        .map(|i| {
          let (subject, barrier) = (subject.clone(), barrier.clone());
          thread::spawn(move || {
            barrier.wait();
            if i % 2 == 0 {
              subject.on_success(i);
            } else {
              subject.on_error(i);
            }
          })
        })
        .collect();
      for h in handles {
        h.join().unwrap();
      }
      assert_eq!(spy.terminal_count(), 1);
    }
  }
}
