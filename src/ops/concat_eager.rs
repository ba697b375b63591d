//! Runs several sources at once but emits their values in source order.
//!
//! Up to `max_concurrency` sources are subscribed at the same time. Each one
//! parks its outcome in its own slot; a slot goes `Pending -> Ready ->
//! Emitted`. The drain loop emits the longest run of ready slots starting at
//! the first unemitted one, so a fast later source waits for the slower ones
//! before it.

use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc, Mutex, Weak,
};

use crate::{
  cell::OnceSlot,
  error::{fold_errors, CompositeError},
  maybe::MaybeSource,
  notification::Notification,
  observable::ObservableSource,
  observer::{MaybeObserver, Observer},
  subscription::{BoxedSubscription, Subscription, SubscriptionList},
};

pub struct ConcatEager<S: MaybeSource> {
  sources: Arc<Vec<S>>,
  max_concurrency: usize,
  combine: Option<fn(CompositeError<S::Err>) -> S::Err>,
}

impl<S: MaybeSource> ConcatEager<S> {
  /// A `max_concurrency` of zero is treated as one.
  pub(crate) fn new(sources: Vec<S>, max_concurrency: usize) -> Self {
    Self { sources: Arc::new(sources), max_concurrency: max_concurrency.max(1), combine: None }
  }

  pub(crate) fn delay_errors(sources: Vec<S>, max_concurrency: usize) -> Self
  where
    S::Err: From<CompositeError<S::Err>>,
  {
    let combine: fn(CompositeError<S::Err>) -> S::Err = S::Err::from;
    Self { combine: Some(combine), ..Self::new(sources, max_concurrency) }
  }
}

impl<S: MaybeSource> ObservableSource for ConcatEager<S> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    let len = self.sources.len();
    let state = Arc::new_cyclic(|this| EagerState {
      this: this.clone(),
      sources: self.sources.clone(),
      max_concurrency: self.max_concurrency,
      combine: self.combine,
      slots: (0..len).map(|_| OnceSlot::empty()).collect(),
      failure: OnceSlot::empty(),
      subscriptions: SubscriptionList::new(len),
      running: AtomicUsize::new(0),
      wip: AtomicUsize::new(0),
      disposed: AtomicBool::new(false),
      drain: Mutex::new(EagerDrain {
        downstream: None,
        emitted: 0,
        subscribed: 0,
        errors: Vec::new(),
      }),
    });
    observer.on_subscribe(state.clone());
    state.drain.lock().unwrap().downstream = Some(observer);
    state.drain();
  }
}

struct EagerDrain<O, Err> {
  downstream: Option<O>,
  /// Index of the first slot not emitted yet.
  emitted: usize,
  /// Index of the next source to subscribe.
  subscribed: usize,
  errors: Vec<Err>,
}

struct EagerState<S: MaybeSource, O> {
  this: Weak<Self>,
  sources: Arc<Vec<S>>,
  max_concurrency: usize,
  combine: Option<fn(CompositeError<S::Err>) -> S::Err>,
  slots: Box<[OnceSlot<Notification<S::Item, S::Err>>]>,
  /// First error in fail-fast mode.
  failure: OnceSlot<S::Err>,
  subscriptions: SubscriptionList,
  running: AtomicUsize,
  wip: AtomicUsize,
  disposed: AtomicBool,
  drain: Mutex<EagerDrain<O, S::Err>>,
}

impl<S, O> EagerState<S, O>
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
      let start = self.step();
      if let Some(state) = self.this.upgrade() {
        for index in start {
          if state.disposed.load(Ordering::Acquire) {
            break;
          }
          self.sources[index].actual_subscribe(EagerInner { state: state.clone(), index });
        }
      }
      missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }

  /// Emits what is ready and returns the sources to subscribe next.
  fn step(&self) -> std::ops::Range<usize> {
    let mut guard = self.drain.lock().unwrap();
    let drain = &mut *guard;
    if self.disposed.load(Ordering::Acquire) {
      drain.downstream = None;
      drain.errors.clear();
      return 0..0;
    }
    if drain.downstream.is_none() {
      return 0..0;
    }

    if let Some(err) = self.failure.take_ready() {
      self.subscriptions.unsubscribe();
      if let Some(observer) = drain.downstream.take() {
        observer.on_error(err);
      }
      return 0..0;
    }

    loop {
      // The downstream may dispose from inside `on_next`.
      if self.disposed.load(Ordering::Acquire) {
        drain.downstream = None;
        drain.errors.clear();
        return 0..0;
      }
      let ready = self.slots.get(drain.emitted).and_then(OnceSlot::take_ready);
      let Some(notification) = ready else { break };
      drain.emitted += 1;
      match notification {
        Notification::Success(value) => {
          if let Some(observer) = drain.downstream.as_mut() {
            observer.on_next(value);
          }
        }
        Notification::Complete => {}
        Notification::Error(err) => drain.errors.push(err),
      }
    }

    if drain.emitted == self.slots.len() {
      if let Some(observer) = drain.downstream.take() {
        let errors = std::mem::take(&mut drain.errors);
        match self.combine.and_then(|combine| fold_errors(errors, combine)) {
          Some(err) => observer.on_error(err),
          None => observer.on_complete(),
        }
      }
      return 0..0;
    }

    let start = drain.subscribed;
    while drain.subscribed < self.slots.len()
      && self.running.load(Ordering::Acquire) < self.max_concurrency
    {
      self.running.fetch_add(1, Ordering::AcqRel);
      drain.subscribed += 1;
    }
    start..drain.subscribed
  }

  fn finish(&self, index: usize, notification: Notification<S::Item, S::Err>) {
    match notification {
      Notification::Error(err) if self.combine.is_none() => {
        let _ = self.failure.put(err);
      }
      notification => {
        let _ = self.slots[index].put(notification);
      }
    }
    self.running.fetch_sub(1, Ordering::AcqRel);
    self.drain();
  }
}

impl<S, O> Subscription for EagerState<S, O>
where
  S: MaybeSource,
  O: Observer<S::Item, S::Err>,
{
  fn unsubscribe(&self) {
    if !self.disposed.swap(true, Ordering::AcqRel) {
      self.subscriptions.unsubscribe();
      self.drain();
    }
  }

  fn is_closed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

pub struct EagerInner<S: MaybeSource, O> {
  state: Arc<EagerState<S, O>>,
  index: usize,
}

impl<S, O> MaybeObserver<S::Item, S::Err> for EagerInner<S, O>
where
  S: MaybeSource,
  O: Observer<S::Item, S::Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.subscriptions.get(self.index).try_set(subscription);
  }

  fn on_success(self, value: S::Item) {
    self.state.finish(self.index, Notification::Success(value))
  }

  fn on_complete(self) { self.state.finish(self.index, Notification::Complete) }

  fn on_error(self, err: S::Err) { self.state.finish(self.index, Notification::Error(err)) }
}
