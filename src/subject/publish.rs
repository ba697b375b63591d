//! Multi-value subject.
//!
//! Items go to the observers subscribed at the moment of the call. The
//! terminal signal is kept and replayed to later subscribers.
//!
//! Emissions are not re-entrant: calling `on_next`/`on_complete`/`on_error`
//! on a subject from inside one of its own observers panics. Subscribing or
//! disposing from inside a callback is fine; an observer added during a
//! broadcast only sees the next one.

use std::{
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
  },
  thread::{self, ThreadId},
};

use smallvec::SmallVec;

use crate::{
  observable::ObservableSource,
  observer::{BoxedObserver, Observer},
  subscription::Subscription,
};

#[derive(Clone)]
enum Outcome<Err> {
  Complete,
  Error(Err),
}

struct PublishState<Item, Err> {
  observers: Vec<(u64, BoxedObserver<Item, Err>)>,
  /// Observers that left while the list was out for a broadcast.
  removed: SmallVec<[u64; 2]>,
  broadcasting: bool,
  outcome: Option<Outcome<Err>>,
}

struct PublishCore<Item, Err> {
  state: Mutex<PublishState<Item, Err>>,
  emitting: Mutex<()>,
  emitter: Mutex<Option<ThreadId>>,
  next_id: AtomicU64,
}

/// Broadcasts every item to its current observers.
pub struct PublishSubject<Item, Err> {
  core: Arc<PublishCore<Item, Err>>,
}

impl<Item, Err> Clone for PublishSubject<Item, Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<Item, Err> PublishSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  pub fn new() -> Self {
    Self {
      core: Arc::new(PublishCore {
        state: Mutex::new(PublishState {
          observers: Vec::new(),
          removed: SmallVec::new(),
          broadcasting: false,
          outcome: None,
        }),
        emitting: Mutex::new(()),
        emitter: Mutex::new(None),
        next_id: AtomicU64::new(0),
      }),
    }
  }

  pub fn on_next(&self, value: Item) {
    self.core.emit(|observers| {
      for (_, observer) in observers.iter_mut() {
        observer.on_next(value.clone());
      }
      false
    });
  }

  pub fn on_complete(&self) { self.core.finish(Outcome::Complete) }

  pub fn on_error(&self, err: Err) { self.core.finish(Outcome::Error(err)) }

  pub fn has_observers(&self) -> bool { !self.core.state.lock().unwrap().observers.is_empty() }

  pub fn is_terminated(&self) -> bool { self.core.state.lock().unwrap().outcome.is_some() }
}

impl<Item, Err> Default for PublishSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn default() -> Self { Self::new() }
}

impl<Item, Err> PublishCore<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + 'static,
{
  /// Runs `broadcast` over the current observers with the state lock
  /// released. `broadcast` returns `true` when it consumed the observers.
  fn emit(&self, broadcast: impl FnOnce(&mut Vec<(u64, BoxedObserver<Item, Err>)>) -> bool) {
    let me = thread::current().id();
    if *self.emitter.lock().unwrap() == Some(me) {
      panic!(
        "re-entrant subject emissions are not supported (on_next/on_complete/on_error). Use an \
         explicit async boundary (e.g. observe_on) if you need feedback loops."
      );
    }
    let _serial = self.emitting.lock().unwrap();
    *self.emitter.lock().unwrap() = Some(me);

    let mut observers = {
      let mut state = self.state.lock().unwrap();
      if state.outcome.is_some() {
        *self.emitter.lock().unwrap() = None;
        return;
      }
      state.broadcasting = true;
      std::mem::take(&mut state.observers)
    };
    let consumed = broadcast(&mut observers);

    let mut state = self.state.lock().unwrap();
    state.broadcasting = false;
    let removed = std::mem::take(&mut state.removed);
    if !consumed {
      observers.retain(|(id, _)| !removed.contains(id));
      let joined = std::mem::replace(&mut state.observers, observers);
      state.observers.extend(joined);
    }
    drop(state);
    *self.emitter.lock().unwrap() = None;
  }

  fn finish(&self, outcome: Outcome<Err>) {
    let mut taken = Vec::new();
    self.emit(|observers| {
      taken = std::mem::take(observers);
      true
    });
    let outcome = {
      let mut state = self.state.lock().unwrap();
      // Observers that joined after the snapshot also hear the outcome.
      taken.extend(std::mem::take(&mut state.observers));
      state.outcome.get_or_insert(outcome).clone()
    };
    for (_, observer) in taken {
      match &outcome {
        Outcome::Complete => observer.on_complete(),
        Outcome::Error(err) => observer.on_error(err.clone()),
      }
    }
  }

  fn leave(&self, id: u64) {
    let removed = {
      let mut state = self.state.lock().unwrap();
      match state.observers.iter().position(|(member, _)| *member == id) {
        Some(index) => Some(state.observers.remove(index)),
        None => {
          if state.broadcasting {
            state.removed.push(id);
          }
          None
        }
      }
    };
    drop(removed);
  }
}

impl<Item, Err> ObservableSource for PublishSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    let ticket = Arc::new(PublishTicket {
      core: self.core.clone(),
      id: self.core.next_id.fetch_add(1, Ordering::Relaxed),
      closed: AtomicBool::new(false),
    });
    observer.on_subscribe(ticket.clone());

    let mut state = self.core.state.lock().unwrap();
    if ticket.closed.load(Ordering::SeqCst) {
      return;
    }
    match state.outcome.clone() {
      None => state.observers.push((ticket.id, Box::new(observer))),
      Some(outcome) => {
        drop(state);
        match outcome {
          Outcome::Complete => observer.on_complete(),
          Outcome::Error(err) => observer.on_error(err),
        }
      }
    }
  }
}

struct PublishTicket<Item, Err> {
  core: Arc<PublishCore<Item, Err>>,
  id: u64,
  closed: AtomicBool,
}

impl<Item, Err> Subscription for PublishTicket<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + 'static,
{
  fn unsubscribe(&self) {
    if !self.closed.swap(true, Ordering::SeqCst) {
      self.core.leave(self.id);
    }
  }

  fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  #[rxsingle_macro::test]
  fn items_reach_current_observers_only() {
    let subject = PublishSubject::<i32, &str>::new();
    let early = TestObserver::<i32, &str>::new();
    subject.clone().subscribe_with(early.clone());
    subject.on_next(1);

    let late = TestObserver::<i32, &str>::new();
    subject.clone().subscribe_with(late.clone());
    subject.on_next(2);
    subject.on_complete();
    subject.on_next(3);

    assert_eq!(early.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
    assert_eq!(late.events(), vec![Event::Next(2), Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn terminal_is_replayed() {
    let subject = PublishSubject::<i32, &str>::new();
    subject.on_error("closed");
    let spy = TestObserver::<i32, &str>::new();
    subject.clone().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("closed")]);
  }

  #[rxsingle_macro::test]
  fn dispose_inside_a_callback() {
    let subject = PublishSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    let c_spy = spy.clone();
    subject.clone().subscribe_with(spy.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let c_seen = seen.clone();
    subject.clone().subscribe(
      move |v| {
        c_seen.lock().unwrap().push(v);
        c_spy.dispose();
      },
      || {},
      |_| {},
    );
    subject.on_next(1);
    subject.on_next(2);
    assert_eq!(spy.events(), vec![Event::Next(1)]);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert!(subject.has_observers());
  }

  #[rxsingle_macro::test]
  #[should_panic(expected = "re-entrant")]
  fn reentrant_emission_panics() {
    let subject = PublishSubject::<i32, ()>::new();
    let c_subject = subject.clone();
    subject.clone().subscribe(move |v| c_subject.on_next(v + 1), || {}, |_| {});
    subject.on_next(1);
  }
}
