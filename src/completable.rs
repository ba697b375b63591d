//! The Completable contract: no value, only completion or an error.
//!
//! ```rust
//! use rxsingle::prelude::*;
//!
//! let done = completable::complete::<&str>()
//!   .and_then_single(single::just(2))
//!   .blocking_get();
//! assert_eq!(done, Ok(2));
//! ```
//!
//! Operators are shared with Maybe: the source is lifted with
//! [`CompletableAsMaybe`] into a Maybe of `()` and narrowed back with
//! [`MaybeAsCompletable`]. Sequencing operators that produce a stream are
//! wrapped in [`IgnoreElements`], which keeps only the terminal signal.

use crate::{
  adapter::{CompletableAsMaybe, MaybeAsCompletable, MaybeAsSingle, SingleAsMaybe},
  emitter::{CompletableEmitter, Create},
  error::{CompositeError, TimeoutError},
  factory::{Defer, Empty, Fail, Never, Timer},
  maybe::MaybeSource,
  observable::ObservableSource,
  observer::{CompletableObserver, FnObserver, Tracked},
  ops::{
    amb::Amb,
    blocking,
    box_it::BoxedCompletable,
    cache::Cache,
    concat::Concat,
    concat_eager::ConcatEager,
    delay::Delay,
    flat_map::AndThen,
    ignore_elements::IgnoreElements,
    observe_on::ObserveOn,
    on_error::{OnErrorComplete, OnErrorResumeNext},
    on_terminate_detach::OnTerminateDetach,
    repeat::RepeatWhen,
    retry::{Retry, RetryPolicy, RetryWhen},
    subscribe_on::SubscribeOn,
    take_until::TakeUntil,
    timeout::{Timeout, TimeoutFailure},
    to_observable::ToObservable,
    unsubscribe_on::UnsubscribeOn,
  },
  scheduler::{Duration, Scheduler},
  single::SingleSource,
  subject::PublishSubject,
  subscription::BoxedSubscription,
};

/// A cold or hot source that only reports how it ended.
pub trait CompletableSource: Send + Sync + 'static {
  type Err: Send + 'static;

  /// Subscribes `observer`. Implementations call `on_subscribe` first and
  /// then at most one terminal method.
  fn actual_subscribe<O>(&self, observer: O)
  where
    O: CompletableObserver<Self::Err>;
}

type Lifted<S> = CompletableAsMaybe<S>;

/// Operators available on every [`CompletableSource`].
pub trait CompletableExt: CompletableSource + Sized {
  // ==================== Sequencing ====================

  /// Subscribes `next` once this completes; an error skips it.
  fn and_then_single<N>(self, next: N) -> MaybeAsSingle<AndThen<Lifted<Self>, SingleAsMaybe<N>>>
  where
    N: SingleSource<Err = Self::Err>,
  {
    MaybeAsSingle(AndThen::new(CompletableAsMaybe(self), SingleAsMaybe(next)))
  }

  fn and_then_maybe<N>(self, next: N) -> AndThen<Lifted<Self>, N>
  where
    N: MaybeSource<Err = Self::Err>,
  {
    AndThen::new(CompletableAsMaybe(self), next)
  }

  fn and_then_completable<N>(
    self,
    next: N,
  ) -> MaybeAsCompletable<AndThen<Lifted<Self>, CompletableAsMaybe<N>>>
  where
    N: CompletableSource<Err = Self::Err>,
  {
    MaybeAsCompletable(AndThen::new(CompletableAsMaybe(self), CompletableAsMaybe(next)))
  }

  // ==================== Error handling ====================

  fn on_error_resume_next<F, R>(
    self,
    f: F,
  ) -> MaybeAsCompletable<OnErrorResumeNext<Lifted<Self>, F, R, CompletableAsMaybe<R>>>
  where
    F: Fn(Self::Err) -> R + Send + Sync + 'static,
    R: CompletableSource,
  {
    MaybeAsCompletable(OnErrorResumeNext::new(CompletableAsMaybe(self), f, CompletableAsMaybe))
  }

  /// Turns an error into a plain completion.
  fn on_error_complete(self) -> MaybeAsCompletable<OnErrorComplete<Lifted<Self>>> {
    MaybeAsCompletable(OnErrorComplete::new(CompletableAsMaybe(self)))
  }

  fn retry<P>(self, policy: P) -> MaybeAsCompletable<Retry<Lifted<Self>, P>>
  where
    P: RetryPolicy<Self::Err>,
  {
    MaybeAsCompletable(Retry::new(CompletableAsMaybe(self), policy))
  }

  fn retry_when<H, N>(self, handler: H) -> MaybeAsCompletable<RetryWhen<Lifted<Self>, H>>
  where
    Self::Err: Clone,
    H: Fn(PublishSubject<Self::Err, Self::Err>) -> N + Send + Sync + 'static,
    N: ObservableSource<Err = Self::Err>,
  {
    MaybeAsCompletable(RetryWhen::new(CompletableAsMaybe(self), handler))
  }

  // ==================== Time and threads ====================

  fn timeout<Sch>(
    self,
    bound: Duration,
    scheduler: Sch,
  ) -> MaybeAsCompletable<Timeout<Lifted<Self>, Sch, TimeoutFailure<(), Self::Err>>>
  where
    Sch: Scheduler,
    Self::Err: From<TimeoutError>,
  {
    let fallback = TimeoutFailure::new(bound);
    MaybeAsCompletable(Timeout::new(CompletableAsMaybe(self), bound, scheduler, fallback))
  }

  fn timeout_or<Sch, F>(
    self,
    bound: Duration,
    scheduler: Sch,
    fallback: F,
  ) -> MaybeAsCompletable<Timeout<Lifted<Self>, Sch, CompletableAsMaybe<F>>>
  where
    Sch: Scheduler,
    F: CompletableSource<Err = Self::Err>,
  {
    let fallback = CompletableAsMaybe(fallback);
    MaybeAsCompletable(Timeout::new(CompletableAsMaybe(self), bound, scheduler, fallback))
  }

  fn delay<Sch: Scheduler>(
    self,
    delay: Duration,
    scheduler: Sch,
  ) -> MaybeAsCompletable<Delay<Lifted<Self>, Sch>> {
    self.delay_with(delay, scheduler, false)
  }

  fn delay_with<Sch: Scheduler>(
    self,
    delay: Duration,
    scheduler: Sch,
    delay_error: bool,
  ) -> MaybeAsCompletable<Delay<Lifted<Self>, Sch>> {
    MaybeAsCompletable(Delay::new(CompletableAsMaybe(self), delay, scheduler, delay_error))
  }

  fn delay_subscription<Sch: Scheduler>(
    self,
    delay: Duration,
    scheduler: Sch,
  ) -> MaybeAsCompletable<SubscribeOn<Lifted<Self>, Sch>> {
    MaybeAsCompletable(SubscribeOn::new(CompletableAsMaybe(self), scheduler, Some(delay)))
  }

  fn subscribe_on<Sch: Scheduler>(
    self,
    scheduler: Sch,
  ) -> MaybeAsCompletable<SubscribeOn<Lifted<Self>, Sch>> {
    MaybeAsCompletable(SubscribeOn::new(CompletableAsMaybe(self), scheduler, None))
  }

  fn observe_on<Sch: Scheduler>(
    self,
    scheduler: Sch,
  ) -> MaybeAsCompletable<ObserveOn<Lifted<Self>, Sch>> {
    MaybeAsCompletable(ObserveOn::new(CompletableAsMaybe(self), scheduler))
  }

  fn unsubscribe_on<Sch: Scheduler>(
    self,
    scheduler: Sch,
  ) -> MaybeAsCompletable<UnsubscribeOn<Lifted<Self>, Sch>> {
    MaybeAsCompletable(UnsubscribeOn::new(CompletableAsMaybe(self), scheduler))
  }

  // ==================== Sharing and lifecycle ====================

  fn cache(self) -> MaybeAsCompletable<Cache<Lifted<Self>>>
  where
    Self::Err: Clone,
  {
    MaybeAsCompletable(Cache::new(CompletableAsMaybe(self)))
  }

  fn on_terminate_detach(self) -> MaybeAsCompletable<OnTerminateDetach<Lifted<Self>>> {
    MaybeAsCompletable(OnTerminateDetach::new(CompletableAsMaybe(self)))
  }

  /// Completes early once `other` succeeds or completes.
  fn take_until<U>(self, other: U) -> MaybeAsCompletable<TakeUntil<Lifted<Self>, U>>
  where
    U: MaybeSource<Err = Self::Err>,
  {
    MaybeAsCompletable(TakeUntil::new(CompletableAsMaybe(self), other))
  }

  // ==================== Repetition ====================

  /// Runs this `times` times in a row, stopping at the first error.
  fn repeat(self, times: usize) -> IgnoreElements<Concat<Lifted<Self>>> {
    IgnoreElements::new(Concat::repeat(CompletableAsMaybe(self), Some(times)))
  }

  fn repeat_forever(self) -> IgnoreElements<Concat<Lifted<Self>>> {
    IgnoreElements::new(Concat::repeat(CompletableAsMaybe(self), None))
  }

  fn repeat_when<H, N>(self, handler: H) -> IgnoreElements<RepeatWhen<Lifted<Self>, H>>
  where
    Self::Err: Clone,
    H: Fn(PublishSubject<(), Self::Err>) -> N + Send + Sync + 'static,
    N: ObservableSource<Err = Self::Err>,
  {
    IgnoreElements::new(RepeatWhen::new(CompletableAsMaybe(self), handler))
  }

  // ==================== Conversion ====================

  /// A Maybe of `()` that always completes empty.
  fn to_maybe(self) -> CompletableAsMaybe<Self> { CompletableAsMaybe(self) }

  fn to_observable(self) -> ToObservable<Lifted<Self>> {
    ToObservable::new(CompletableAsMaybe(self))
  }

  fn box_it(self) -> BoxedCompletable<Self::Err> { BoxedCompletable::new(self) }

  // ==================== Subscribing ====================

  fn subscribe_with<O>(self, observer: O) -> BoxedSubscription
  where
    O: CompletableObserver<Self::Err>,
  {
    let (tracked, handle) = Tracked::new(observer);
    self.actual_subscribe(tracked);
    handle
  }

  fn subscribe<C, E>(self, on_complete: C, on_error: E) -> BoxedSubscription
  where
    C: FnOnce() + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
  {
    self.subscribe_with(FnObserver { on_value: (), on_complete, on_error })
  }

  fn blocking_get(self) -> Result<(), Self::Err> {
    blocking::wait(|latch| self.actual_subscribe(latch))
  }

  fn blocking_get_timeout(self, timeout: Duration) -> Result<(), Self::Err>
  where
    Self::Err: From<TimeoutError>,
  {
    blocking::wait_timeout(|latch| self.actual_subscribe(latch), timeout)
      .unwrap_or_else(|| Err(TimeoutError { bound: timeout }.into()))
  }
}

impl<S: CompletableSource> CompletableExt for S {}

// ============================================================================
// Factories
// ============================================================================

pub fn complete<Err: Send + 'static>() -> MaybeAsCompletable<Empty<(), Err>> {
  MaybeAsCompletable(Empty::new())
}

pub fn error<Err>(err: Err) -> MaybeAsCompletable<Fail<(), Err>>
where
  Err: Clone + Send + Sync + 'static,
{
  MaybeAsCompletable(Fail::new(err))
}

pub fn never<Err: Send + 'static>() -> MaybeAsCompletable<Never<(), Err>> {
  MaybeAsCompletable(Never::new())
}

/// Bridges a callback API; see [`CompletableEmitter`].
pub fn create<Err, F>(f: F) -> MaybeAsCompletable<Create<F, CompletableEmitter<Err>>>
where
  Err: Send + 'static,
  F: Fn(CompletableEmitter<Err>) + Send + Sync + 'static,
{
  MaybeAsCompletable(Create::completable(f))
}

pub fn defer<F, R>(factory: F) -> MaybeAsCompletable<Defer<F, R, CompletableAsMaybe<R>>>
where
  F: Fn() -> R + Send + Sync + 'static,
  R: CompletableSource,
{
  MaybeAsCompletable(Defer::new(factory, CompletableAsMaybe))
}

/// Completes after `delay`.
pub fn timer<Err, Sch>(delay: Duration, scheduler: Sch) -> MaybeAsCompletable<Timer<Err, Sch>>
where
  Err: Send + 'static,
  Sch: Scheduler,
{
  MaybeAsCompletable(Timer::new(delay, scheduler))
}

fn lift_all<S: CompletableSource>(sources: Vec<S>) -> Vec<CompletableAsMaybe<S>> {
  sources.into_iter().map(CompletableAsMaybe).collect()
}

/// Mirrors whichever source terminates first; an empty list completes.
pub fn amb<S>(sources: Vec<S>) -> MaybeAsCompletable<Amb<CompletableAsMaybe<S>>>
where
  S: CompletableSource,
{
  MaybeAsCompletable(Amb::new(lift_all(sources)))
}

pub fn concat<S>(sources: Vec<S>) -> IgnoreElements<Concat<CompletableAsMaybe<S>>>
where
  S: CompletableSource,
{
  IgnoreElements::new(Concat::new(lift_all(sources)))
}

pub fn concat_delay_errors<S>(sources: Vec<S>) -> IgnoreElements<Concat<CompletableAsMaybe<S>>>
where
  S: CompletableSource,
  S::Err: From<CompositeError<S::Err>>,
{
  IgnoreElements::new(Concat::delay_errors(lift_all(sources)))
}

/// Runs up to `max_concurrency` sources at once and completes when all did.
pub fn concat_eager<S: CompletableSource>(
  sources: Vec<S>,
  max_concurrency: usize,
) -> IgnoreElements<ConcatEager<CompletableAsMaybe<S>>> {
  IgnoreElements::new(ConcatEager::new(lift_all(sources), max_concurrency))
}

pub fn concat_eager_delay_errors<S>(
  sources: Vec<S>,
  max_concurrency: usize,
) -> IgnoreElements<ConcatEager<CompletableAsMaybe<S>>>
where
  S: CompletableSource,
  S::Err: From<CompositeError<S::Err>>,
{
  IgnoreElements::new(ConcatEager::delay_errors(lift_all(sources), max_concurrency))
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{
    prelude::*,
    test_util::{Event, Failure, TestObserver},
  };

  #[rxsingle_macro::test]
  fn and_then_skips_the_next_source_on_error() {
    let spy = TestObserver::<i32, &str>::new();
    completable::error("first")
      .and_then_maybe(maybe::just(1))
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("first")]);
  }

  #[rxsingle_macro::test]
  fn and_then_completable_chains_completions() {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let second = completable::defer(move || {
      c_runs.fetch_add(1, Ordering::SeqCst);
      completable::complete::<()>()
    });
    assert_eq!(completable::complete().and_then_completable(second).blocking_get(), Ok(()));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[rxsingle_macro::test]
  fn concat_runs_in_order() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let step = |tag: &'static str| {
      let order = order.clone();
      completable::defer(move || {
        order.lock().unwrap().push(tag);
        completable::complete::<()>()
      })
    };
    let spy = TestObserver::<(), ()>::new();
    completable::concat(vec![step("a"), step("b"), step("c")]).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
  }

  #[rxsingle_macro::test]
  fn timeout_errors_on_virtual_time() {
    TestScheduler::init();
    let spy = TestObserver::<(), Failure>::new();
    completable::never()
      .timeout(Duration::from_millis(10), TestScheduler)
      .subscribe_with(spy.clone());
    TestScheduler::advance_by(Duration::from_millis(10));
    assert_eq!(spy.events(), vec![Event::Error(Failure::Timeout)]);
  }

  #[rxsingle_macro::test]
  fn to_observable_only_completes() {
    let spy = TestObserver::<(), ()>::new();
    completable::complete().to_observable().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn two_callback_subscribe() {
    let completed = Arc::new(AtomicUsize::new(0));
    let c_completed = completed.clone();
    completable::complete::<()>().subscribe(
      move || {
        c_completed.fetch_add(1, Ordering::SeqCst);
      },
      |_| {},
    );
    assert_eq!(completed.load(Ordering::SeqCst), 1);
  }
}
