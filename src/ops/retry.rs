//! Retry operators: resubscribe to the source after it fails.
//!
//! [`Retry`] asks a [`RetryPolicy`] after every failure. [`RetryWhen`] hands
//! the failures to a user handler as a [`PublishSubject`] and resubscribes on
//! every item of the sequence the handler returns.
//!
//! Both resubscribe through a trampoline (`wip`), so a source that fails
//! synchronously loops instead of recursing.
//!
//! ```rust
//! use std::sync::{
//!   atomic::{AtomicUsize, Ordering},
//!   Arc,
//! };
//!
//! use rxsingle::prelude::*;
//!
//! let attempts = Arc::new(AtomicUsize::new(0));
//! let c_attempts = attempts.clone();
//! let result = single::defer(move || {
//!   if c_attempts.fetch_add(1, Ordering::SeqCst) < 2 {
//!     single::error("flaky").box_it()
//!   } else {
//!     single::just(7).box_it()
//!   }
//! })
//! .retry(3)
//! .blocking_get();
//!
//! assert_eq!(result, Ok(7));
//! assert_eq!(attempts.load(Ordering::SeqCst), 3);
//! ```

use std::{
  collections::VecDeque,
  fmt,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, Weak,
  },
};

use tracing::debug;

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  observable::ObservableSource,
  observer::{MaybeObserver, Observer},
  subject::PublishSubject,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

// ==================== RetryPolicy ====================

/// Decides whether a failure is retried.
///
/// `attempt` is the number of failures so far, starting at 1.
pub trait RetryPolicy<Err>: Send + Sync + 'static {
  fn should_retry(&self, err: &Err, attempt: usize) -> bool;
}

/// Retries up to `n` times.
impl<Err> RetryPolicy<Err> for usize {
  fn should_retry(&self, _: &Err, attempt: usize) -> bool { attempt <= *self }
}

impl<Err, F> RetryPolicy<Err> for F
where
  F: Fn(&Err, usize) -> bool + Send + Sync + 'static,
{
  fn should_retry(&self, err: &Err, attempt: usize) -> bool { self(err, attempt) }
}

/// Builder combining a retry count with an error predicate.
///
/// Without a count it retries forever; without a predicate every error
/// qualifies.
///
/// ```rust
/// use rxsingle::ops::retry::{RetryConfig, RetryPolicy};
///
/// let config = RetryConfig::new().count(2).when(|e: &u16| *e >= 500);
/// assert!(config.should_retry(&503, 1));
/// assert!(!config.should_retry(&404, 1));
/// assert!(!config.should_retry(&503, 3));
/// ```
pub struct RetryConfig<Err> {
  count: Option<usize>,
  when: Option<Arc<dyn Fn(&Err) -> bool + Send + Sync>>,
}

impl<Err> RetryConfig<Err> {
  pub fn new() -> Self { Self { count: None, when: None } }

  /// Sets the maximum number of retries.
  pub fn count(mut self, count: usize) -> Self {
    self.count = Some(count);
    self
  }

  /// Only retries errors matching `predicate`.
  pub fn when(mut self, predicate: impl Fn(&Err) -> bool + Send + Sync + 'static) -> Self {
    self.when = Some(Arc::new(predicate));
    self
  }
}

impl<Err> Default for RetryConfig<Err> {
  fn default() -> Self { Self::new() }
}

impl<Err> Clone for RetryConfig<Err> {
  fn clone(&self) -> Self { Self { count: self.count, when: self.when.clone() } }
}

impl<Err> fmt::Debug for RetryConfig<Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RetryConfig")
      .field("count", &self.count)
      .field("filtered", &self.when.is_some())
      .finish()
  }
}

impl<Err: 'static> RetryPolicy<Err> for RetryConfig<Err> {
  fn should_retry(&self, err: &Err, attempt: usize) -> bool {
    if self.count.is_some_and(|count| attempt > count) {
      return false;
    }
    self.when.as_ref().map_or(true, |when| when(err))
  }
}

// ==================== Retry ====================

pub struct Retry<S, P> {
  source: Arc<S>,
  policy: Arc<P>,
}

impl<S, P> Retry<S, P> {
  pub(crate) fn new(source: S, policy: P) -> Self {
    Self { source: Arc::new(source), policy: Arc::new(policy) }
  }
}

impl<S, P> MaybeSource for Retry<S, P>
where
  S: MaybeSource,
  P: RetryPolicy<S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state = Arc::new_cyclic(|this| RetryState {
      this: this.clone(),
      source: self.source.clone(),
      policy: self.policy.clone(),
      downstream: OnceSlot::empty(),
      upstream: SubscriptionCell::new(),
      attempts: AtomicUsize::new(0),
      wip: AtomicUsize::new(0),
    });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }
    state.subscribe_next();
  }
}

struct RetryState<S, P, O> {
  this: Weak<Self>,
  source: Arc<S>,
  policy: Arc<P>,
  downstream: OnceSlot<O>,
  upstream: SubscriptionCell,
  attempts: AtomicUsize,
  wip: AtomicUsize,
}

impl<S, P, O> RetryState<S, P, O>
where
  S: MaybeSource,
  P: RetryPolicy<S::Err>,
  O: MaybeObserver<S::Item, S::Err>,
{
  fn subscribe_next(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      if !self.downstream.is_closed() {
        if let Some(state) = self.this.upgrade() {
          self.source.actual_subscribe(RetryObserver { state });
        }
      }
      missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }
}

impl<S: Send + Sync, P: Send + Sync, O: Send> Subscription for RetryState<S, P, O> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.upstream.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct RetryObserver<S, P, O> {
  state: Arc<RetryState<S, P, O>>,
}

impl<S, P, O> MaybeObserver<S::Item, S::Err> for RetryObserver<S, P, O>
where
  S: MaybeSource,
  P: RetryPolicy<S::Err>,
  O: MaybeObserver<S::Item, S::Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.replace(subscription);
  }

  fn on_success(self, value: S::Item) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_success(value);
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: S::Err) {
    let attempt = self.state.attempts.fetch_add(1, Ordering::AcqRel) + 1;
    if self.state.policy.should_retry(&err, attempt) {
      debug!(attempt, "retrying after failure");
      self.state.subscribe_next();
    } else if let Some(observer) = self.state.downstream.take() {
      observer.on_error(err);
    }
  }
}

// ==================== RetryWhen ====================

/// Resubscribes whenever the handler's sequence emits.
///
/// The handler runs once per subscription. Every failure of the source is
/// pushed into the subject it received; an item of the returned sequence
/// starts the next attempt. The sequence completing or failing ends the
/// whole subscription with that outcome. Items that arrive while an attempt
/// is still running collapse into one pending resubscribe.
pub struct RetryWhen<S, H> {
  source: Arc<S>,
  handler: Arc<H>,
}

impl<S, H> RetryWhen<S, H> {
  pub(crate) fn new(source: S, handler: H) -> Self {
    Self { source: Arc::new(source), handler: Arc::new(handler) }
  }
}

impl<S, H, N> MaybeSource for RetryWhen<S, H>
where
  S: MaybeSource,
  S::Err: Clone,
  H: Fn(PublishSubject<S::Err, S::Err>) -> N + Send + Sync + 'static,
  N: ObservableSource<Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let errors = PublishSubject::new();
    let state = Arc::new_cyclic(|this| WhenState {
      this: this.clone(),
      source: self.source.clone(),
      errors: errors.clone(),
      downstream: OnceSlot::empty(),
      upstream: SubscriptionCell::new(),
      notifier: SubscriptionCell::new(),
      control: Mutex::new(Control { failures: VecDeque::new(), active: false, wanted: true }),
      attempts: AtomicUsize::new(0),
      wip: AtomicUsize::new(0),
    });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }
    (self.handler)(errors).actual_subscribe(NotifierObserver { state: state.clone() });
    state.drain();
  }
}

/// Shared between the signal handlers and the drain loop.
struct Control<Err> {
  /// Failures not yet handed to the handler's subject.
  failures: VecDeque<Err>,
  /// An attempt is subscribed and has not failed yet.
  active: bool,
  /// The notifier asked for another attempt.
  wanted: bool,
}

enum Step<Err> {
  Feed(Err),
  Subscribe,
  Idle,
}

struct WhenState<S: MaybeSource, O> {
  this: Weak<Self>,
  source: Arc<S>,
  errors: PublishSubject<S::Err, S::Err>,
  downstream: OnceSlot<O>,
  upstream: SubscriptionCell,
  notifier: SubscriptionCell,
  control: Mutex<Control<S::Err>>,
  attempts: AtomicUsize,
  wip: AtomicUsize,
}

impl<S, O> WhenState<S, O>
where
  S: MaybeSource,
  S::Err: Clone,
  O: MaybeObserver<S::Item, S::Err>,
{
  /// Only the drain owner feeds the subject or subscribes the source, so
  /// the subject never sees re-entrant emissions.
  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      loop {
        match self.next_step() {
          Step::Feed(err) => self.errors.on_next(err),
          Step::Subscribe => {
            let attempt = self.attempts.fetch_add(1, Ordering::AcqRel);
            if attempt > 0 {
              debug!(attempt, "retry_when resubscribing");
            }
            if let Some(state) = self.this.upgrade() {
              self.source.actual_subscribe(WhenObserver { state });
            }
          }
          Step::Idle => break,
        }
      }
      missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }

  fn next_step(&self) -> Step<S::Err> {
    let mut control = self.control.lock().unwrap();
    if self.downstream.is_closed() {
      control.failures.clear();
      return Step::Idle;
    }
    if let Some(err) = control.failures.pop_front() {
      return Step::Feed(err);
    }
    if control.wanted && !control.active {
      control.wanted = false;
      control.active = true;
      return Step::Subscribe;
    }
    Step::Idle
  }

  fn fail(&self, err: S::Err) {
    {
      let mut control = self.control.lock().unwrap();
      control.active = false;
      control.failures.push_back(err);
    }
    self.drain();
  }

  fn want_next(&self) {
    self.control.lock().unwrap().wanted = true;
    self.drain();
  }
}

impl<S: MaybeSource, O: Send> Subscription for WhenState<S, O> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.upstream.unsubscribe();
    self.notifier.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct WhenObserver<S: MaybeSource, O> {
  state: Arc<WhenState<S, O>>,
}

impl<S, O> WhenObserver<S, O>
where
  S: MaybeSource,
{
  fn finish(&self) -> Option<O> {
    let observer = self.state.downstream.take()?;
    self.state.notifier.unsubscribe();
    Some(observer)
  }
}

impl<S, O> MaybeObserver<S::Item, S::Err> for WhenObserver<S, O>
where
  S: MaybeSource,
  S::Err: Clone,
  O: MaybeObserver<S::Item, S::Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.replace(subscription);
  }

  fn on_success(self, value: S::Item) {
    if let Some(observer) = self.finish() {
      observer.on_success(value);
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.finish() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: S::Err) { self.state.fail(err) }
}

pub struct NotifierObserver<S: MaybeSource, O> {
  state: Arc<WhenState<S, O>>,
}

impl<S, O> NotifierObserver<S, O>
where
  S: MaybeSource,
{
  fn finish(&self) -> Option<O> {
    let observer = self.state.downstream.take()?;
    self.state.upstream.unsubscribe();
    Some(observer)
  }
}

impl<S, O, T> Observer<T, S::Err> for NotifierObserver<S, O>
where
  S: MaybeSource,
  S::Err: Clone,
  O: MaybeObserver<S::Item, S::Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.notifier.try_set(subscription);
  }

  fn on_next(&mut self, _: T) { self.state.want_next() }

  fn on_complete(self) {
    if let Some(observer) = self.finish() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: S::Err) {
    if let Some(observer) = self.finish() {
      observer.on_error(err);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::*;
  use crate::{
    prelude::*,
    test_util::{Event, Failure, TestObserver},
  };

  /// A single that fails `failures` times before it succeeds with the
  /// attempt number.
  fn flaky(failures: usize) -> (impl SingleSource<Item = usize, Err = Failure>, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let source = single::defer(move || {
      let run = c_runs.fetch_add(1, Ordering::SeqCst) + 1;
      if run <= failures {
        single::error(Failure::Upstream("flaky")).box_it()
      } else {
        single::just(run).box_it()
      }
    });
    (source, runs)
  }

  #[rxsingle_macro::test]
  fn count_policy_gives_up() {
    let (source, runs) = flaky(usize::MAX);
    let spy = TestObserver::<usize, Failure>::new();
    source.retry(2).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error(Failure::Upstream("flaky"))]);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
  }

  #[rxsingle_macro::test]
  fn success_after_failures() {
    let (source, _) = flaky(2);
    let spy = TestObserver::<usize, Failure>::new();
    source.retry(5).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Success(3)]);
  }

  #[rxsingle_macro::test]
  fn closure_policy_sees_the_error() {
    let (source, runs) = flaky(usize::MAX);
    let spy = TestObserver::<usize, Failure>::new();
    source
      .retry(|err: &Failure, attempt: usize| *err == Failure::Upstream("flaky") && attempt < 4)
      .subscribe_with(spy.clone());
    assert_eq!(runs.load(Ordering::SeqCst), 4);
    assert_eq!(spy.terminal_count(), 1);
  }

  #[rxsingle_macro::test]
  fn config_filters_errors() {
    let spy = TestObserver::<(), Failure>::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    completable::defer(move || {
      c_runs.fetch_add(1, Ordering::SeqCst);
      completable::error(Failure::Upstream("fatal"))
    })
    .retry(RetryConfig::new().count(10).when(|e: &Failure| *e != Failure::Upstream("fatal")))
    .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error(Failure::Upstream("fatal"))]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[rxsingle_macro::test]
  fn synchronous_failures_do_not_grow_the_stack() {
    let (source, runs) = flaky(50_000);
    let spy = TestObserver::<usize, Failure>::new();
    source.retry(usize::MAX).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Success(50_001)]);
    assert_eq!(runs.load(Ordering::SeqCst), 50_001);
  }

  #[rxsingle_macro::test]
  fn dispose_stops_retrying() {
    let subject = MaybeSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    subject.clone().retry(usize::MAX).subscribe_with(spy.clone());
    spy.dispose();
    assert!(!subject.has_observers());
    assert!(spy.is_empty());
  }

  #[rxsingle_macro::test]
  fn retry_when_resubscribes_per_notifier_item() {
    let (source, runs) = flaky(2);
    let spy = TestObserver::<usize, Failure>::new();
    source.retry_when(|errors| errors).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Success(3)]);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
  }

  #[rxsingle_macro::test]
  fn retry_when_notifier_completion_has_no_element() {
    let (source, runs) = flaky(usize::MAX);
    let spy = TestObserver::<usize, Failure>::new();
    source.retry_when(|errors| errors.take(2)).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error(Failure::Missing)]);
    // The second item and the completion arrive together, so the completion
    // ends the loop before the third attempt starts.
    assert_eq!(runs.load(Ordering::SeqCst), 2);
  }

  #[rxsingle_macro::test]
  fn retry_when_notifier_error_is_forwarded() {
    let spy = TestObserver::<i32, &str>::new();
    maybe::error::<i32, _>("first")
      .retry_when(|errors| errors.try_map(|e: &str| Err::<(), _>(e)))
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("first")]);
  }

  #[rxsingle_macro::test]
  fn retry_when_waits_for_the_notifier() {
    let trigger = PublishSubject::<(), Failure>::new();
    let c_trigger = trigger.clone();
    let (source, runs) = flaky(1);
    let spy = TestObserver::<usize, Failure>::new();
    source.retry_when(move |_| c_trigger.clone()).subscribe_with(spy.clone());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(spy.is_empty());
    trigger.on_next(());
    assert_eq!(spy.events(), vec![Event::Success(2)]);
    assert!(!trigger.has_observers());
  }

  #[rxsingle_macro::test]
  fn retry_when_dispose_cancels_the_notifier() {
    let notifier = PublishSubject::<(), &str>::new();
    let c_notifier = notifier.clone();
    let subject = MaybeSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    subject.clone().retry_when(move |_| c_notifier.clone()).subscribe_with(spy.clone());
    assert!(notifier.has_observers());
    spy.dispose();
    assert!(!notifier.has_observers());
    assert!(!subject.has_observers());
  }
}
