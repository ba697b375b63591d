//! Runs single-shot sources one after another and streams their values.
//!
//! The next source is subscribed once the current one succeeded or completed
//! empty. The same machinery drives `repeat`, where the sequence is one
//! source subscribed again and again.
//!
//! Every signal from an inner source is parked in `pending` and handled by
//! whoever owns the drain loop (`wip` went from 0 to 1). A synchronous source
//! therefore never recurses into the next subscribe call: its signal is
//! queued and the loop picks it up on the next turn, so a long run of
//! synchronous sources uses constant stack.

use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc, Mutex, Weak,
};

use tracing::debug;

use crate::{
  error::{fold_errors, CompositeError},
  maybe::MaybeSource,
  notification::Notification,
  observable::ObservableSource,
  observer::{MaybeObserver, Observer},
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

/// The sources a [`Concat`] walks through.
pub(crate) enum Sequence<S> {
  List(Vec<S>),
  /// The same source, `times` times or forever.
  Repeat(S, Option<usize>),
}

impl<S> Sequence<S> {
  fn get(&self, index: usize) -> Option<&S> {
    match self {
      Sequence::List(sources) => sources.get(index),
      Sequence::Repeat(source, Some(times)) => (index < *times).then_some(source),
      Sequence::Repeat(source, None) => Some(source),
    }
  }
}

pub struct Concat<S: MaybeSource> {
  sources: Arc<Sequence<S>>,
  /// Set in delay-errors mode: folds several collected errors into one.
  combine: Option<fn(CompositeError<S::Err>) -> S::Err>,
}

impl<S: MaybeSource> Concat<S> {
  pub(crate) fn new(sources: Vec<S>) -> Self {
    Self { sources: Arc::new(Sequence::List(sources)), combine: None }
  }

  pub(crate) fn delay_errors(sources: Vec<S>) -> Self
  where
    S::Err: From<CompositeError<S::Err>>,
  {
    let combine: fn(CompositeError<S::Err>) -> S::Err = S::Err::from;
    Self { sources: Arc::new(Sequence::List(sources)), combine: Some(combine) }
  }

  pub(crate) fn repeat(source: S, times: Option<usize>) -> Self {
    Self { sources: Arc::new(Sequence::Repeat(source, times)), combine: None }
  }
}

impl<S: MaybeSource> Clone for Concat<S> {
  fn clone(&self) -> Self { Self { sources: self.sources.clone(), combine: self.combine } }
}

impl<S: MaybeSource> ObservableSource for Concat<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    let state = Arc::new_cyclic(|this| ConcatState {
      this: this.clone(),
      sources: self.sources.clone(),
      combine: self.combine,
      wip: AtomicUsize::new(0),
      disposed: AtomicBool::new(false),
      current: SubscriptionCell::new(),
      pending: Mutex::new(None),
      drain: Mutex::new(Drain { downstream: None, index: 0, waiting: false, errors: Vec::new() }),
    });
    observer.on_subscribe(state.clone());
    state.drain.lock().unwrap().downstream = Some(observer);
    state.drain();
  }
}

/// Touched only by the owner of the drain loop.
struct Drain<O, Err> {
  downstream: Option<O>,
  index: usize,
  /// A source is subscribed and has not signaled yet.
  waiting: bool,
  errors: Vec<Err>,
}

struct ConcatState<S: MaybeSource, O> {
  this: Weak<Self>,
  sources: Arc<Sequence<S>>,
  combine: Option<fn(CompositeError<S::Err>) -> S::Err>,
  wip: AtomicUsize,
  disposed: AtomicBool,
  current: SubscriptionCell,
  pending: Mutex<Option<Notification<S::Item, S::Err>>>,
  drain: Mutex<Drain<O, S::Err>>,
}

impl<S, O> ConcatState<S, O>
where
  S: MaybeSource,
  O: Observer<S::Item, S::Err>,
{
  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      self.step();
      missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }

  fn step(&self) {
    let mut guard = self.drain.lock().unwrap();
    let drain = &mut *guard;
    if self.disposed.load(Ordering::Acquire) {
      drain.downstream = None;
      drain.errors.clear();
      self.pending.lock().unwrap().take();
      return;
    }
    let Some(observer) = drain.downstream.as_mut() else { return };

    let signal = self.pending.lock().unwrap().take();
    if let Some(signal) = signal {
      drain.waiting = false;
      match signal {
        Notification::Success(value) => observer.on_next(value),
        Notification::Complete => {}
        Notification::Error(err) => match self.combine {
          Some(_) => drain.errors.push(err),
          None => {
            if let Some(observer) = drain.downstream.take() {
              observer.on_error(err);
            }
            return;
          }
        },
      }
    }
    // A dispose from inside `on_next` is cleaned up on the next turn.
    if drain.waiting || self.disposed.load(Ordering::Acquire) {
      return;
    }

    let index = drain.index;
    let Some(source) = self.sources.get(index) else {
      if let Some(observer) = drain.downstream.take() {
        let errors = std::mem::take(&mut drain.errors);
        match self.combine.and_then(|combine| fold_errors(errors, combine)) {
          Some(err) => observer.on_error(err),
          None => observer.on_complete(),
        }
      }
      return;
    };
    drain.index += 1;
    drain.waiting = true;
    drop(guard);

    if index > 0 && matches!(*self.sources, Sequence::Repeat(..)) {
      debug!(round = index, "repeat resubscribing");
    }
    if let Some(state) = self.this.upgrade() {
      source.actual_subscribe(ConcatInner { state });
    }
  }

  fn signal(&self, notification: Notification<S::Item, S::Err>) {
    *self.pending.lock().unwrap() = Some(notification);
    self.drain();
  }
}

impl<S, O> Subscription for ConcatState<S, O>
where
  S: MaybeSource,
  O: Observer<S::Item, S::Err>,
{
  fn unsubscribe(&self) {
    if !self.disposed.swap(true, Ordering::AcqRel) {
      self.current.unsubscribe();
      self.drain();
    }
  }

  fn is_closed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

pub struct ConcatInner<S: MaybeSource, O> {
  state: Arc<ConcatState<S, O>>,
}

impl<S, O> MaybeObserver<S::Item, S::Err> for ConcatInner<S, O>
where
  S: MaybeSource,
  O: Observer<S::Item, S::Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.current.replace(subscription);
  }

  fn on_success(self, value: S::Item) { self.state.signal(Notification::Success(value)) }

  fn on_complete(self) { self.state.signal(Notification::Complete) }

  fn on_error(self, err: S::Err) { self.state.signal(Notification::Error(err)) }
}
