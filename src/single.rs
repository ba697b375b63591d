//! The Single contract: exactly one value or an error.
//!
//! ```rust
//! use rxsingle::prelude::*;
//!
//! // Zipping an empty list fails, so the error type has to absorb
//! // `NoSuchElementError`.
//! let total = single::zip(
//!   vec![
//!     single::just::<_, NoSuchElementError>(1).box_it(),
//!     single::just(2).map(|v| v * 10).box_it(),
//!   ],
//!   |values: Vec<i32>| values.into_iter().sum::<i32>(),
//! )
//! .blocking_get();
//! assert_eq!(total, Ok(21));
//! ```
//!
//! Most operators run on the Maybe core: the source is lifted with
//! [`SingleAsMaybe`] and narrowed back with [`MaybeAsSingle`], or with
//! [`MaybeToSingle`] where the operator can end without a value.

use crate::{
  adapter::{CompletableAsMaybe, MaybeAsCompletable, MaybeAsSingle, MaybeToSingle, SingleAsMaybe},
  completable::CompletableSource,
  emitter::{Create, SingleEmitter},
  error::{CompositeError, NoSuchElementError, TimeoutError},
  factory::{Defer, Fail, Just, Never, Timer},
  maybe::MaybeSource,
  observable::ObservableSource,
  observer::{FnObserver, SingleObserver, Tracked},
  ops::{
    amb::Amb,
    blocking,
    box_it::BoxedSingle,
    cache::Cache,
    concat::Concat,
    concat_eager::ConcatEager,
    delay::Delay,
    flat_map::{attempt_single, Attempt, FlatMap, FlatMapObservable},
    map::{Filter, Map, TryMap},
    observe_on::ObserveOn,
    on_error::{OnErrorComplete, OnErrorResumeNext, OnErrorReturn},
    on_terminate_detach::OnTerminateDetach,
    repeat::RepeatWhen,
    retry::{Retry, RetryPolicy, RetryWhen},
    subscribe_on::SubscribeOn,
    take_until::TakeUntil,
    timeout::{Timeout, TimeoutFailure},
    to_observable::ToObservable,
    unsubscribe_on::UnsubscribeOn,
    zip::{TryZip, Zip},
  },
  scheduler::{Duration, Scheduler},
  subject::PublishSubject,
  subscription::BoxedSubscription,
};

/// A cold or hot source of exactly one value or an error.
pub trait SingleSource: Send + Sync + 'static {
  type Item: Send + 'static;
  type Err: Send + 'static;

  /// Subscribes `observer`. Implementations call `on_subscribe` first and
  /// then at most one terminal method.
  fn actual_subscribe<O>(&self, observer: O)
  where
    O: SingleObserver<Self::Item, Self::Err>;
}

type Lifted<S> = SingleAsMaybe<S>;

/// Operators available on every [`SingleSource`].
pub trait SingleExt: SingleSource + Sized {
  // ==================== Transformation ====================

  fn map<F, R>(self, f: F) -> MaybeAsSingle<Map<Lifted<Self>, F>>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: Send + 'static,
  {
    MaybeAsSingle(Map::new(SingleAsMaybe(self), f))
  }

  /// Like [`map`](SingleExt::map), but the mapper may fail; its error
  /// becomes the terminal error.
  fn try_map<F, R>(self, f: F) -> MaybeAsSingle<TryMap<Lifted<Self>, F>>
  where
    F: Fn(Self::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: Send + 'static,
  {
    MaybeAsSingle(TryMap::new(SingleAsMaybe(self), f))
  }

  /// Completes empty when the value does not pass `predicate`.
  fn filter<F>(self, predicate: F) -> Filter<Lifted<Self>, F>
  where
    F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
  {
    Filter::new(SingleAsMaybe(self), predicate)
  }

  fn flat_map<F, R>(self, f: F) -> MaybeAsSingle<FlatMap<Lifted<Self>, F, R, SingleAsMaybe<R>>>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: SingleSource<Err = Self::Err>,
  {
    MaybeAsSingle(FlatMap::new(SingleAsMaybe(self), f, SingleAsMaybe))
  }

  /// Like [`flat_map`](SingleExt::flat_map), but the mapper may fail; its
  /// error becomes the terminal error.
  fn try_flat_map<F, R>(
    self,
    f: F,
  ) -> MaybeAsSingle<FlatMap<Lifted<Self>, F, Result<R, Self::Err>, Attempt<SingleAsMaybe<R>>>>
  where
    F: Fn(Self::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: SingleSource<Err = Self::Err>,
  {
    MaybeAsSingle(FlatMap::new(SingleAsMaybe(self), f, attempt_single))
  }

  fn flat_map_maybe<F, R>(self, f: F) -> FlatMap<Lifted<Self>, F, R, R>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: MaybeSource<Err = Self::Err>,
  {
    FlatMap::new(SingleAsMaybe(self), f, std::convert::identity)
  }

  fn flat_map_completable<F, R>(
    self,
    f: F,
  ) -> MaybeAsCompletable<FlatMap<Lifted<Self>, F, R, CompletableAsMaybe<R>>>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: CompletableSource<Err = Self::Err>,
  {
    MaybeAsCompletable(FlatMap::new(SingleAsMaybe(self), f, CompletableAsMaybe))
  }

  fn flat_map_observable<F, R>(self, f: F) -> FlatMapObservable<Lifted<Self>, F>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: ObservableSource<Err = Self::Err>,
  {
    FlatMapObservable::new(SingleAsMaybe(self), f)
  }

  // ==================== Error handling ====================

  /// Switches to the Single returned by `f` when this one fails.
  fn on_error_resume_next<F, R>(
    self,
    f: F,
  ) -> MaybeAsSingle<OnErrorResumeNext<Lifted<Self>, F, R, SingleAsMaybe<R>>>
  where
    F: Fn(Self::Err) -> R + Send + Sync + 'static,
    R: SingleSource<Item = Self::Item>,
  {
    MaybeAsSingle(OnErrorResumeNext::new(SingleAsMaybe(self), f, SingleAsMaybe))
  }

  fn on_error_return<F>(self, f: F) -> MaybeAsSingle<OnErrorReturn<Lifted<Self>, F>>
  where
    F: Fn(Self::Err) -> Self::Item + Send + Sync + 'static,
  {
    MaybeAsSingle(OnErrorReturn::new(SingleAsMaybe(self), f))
  }

  /// Swallows the error and completes empty instead.
  fn on_error_complete(self) -> OnErrorComplete<Lifted<Self>> {
    OnErrorComplete::new(SingleAsMaybe(self))
  }

  fn retry<P>(self, policy: P) -> MaybeAsSingle<Retry<Lifted<Self>, P>>
  where
    P: RetryPolicy<Self::Err>,
  {
    MaybeAsSingle(Retry::new(SingleAsMaybe(self), policy))
  }

  /// Resubscribes whenever the sequence built by `handler` emits. Ending
  /// that sequence with completion fails with [`NoSuchElementError`].
  fn retry_when<H, N>(self, handler: H) -> MaybeToSingle<RetryWhen<Lifted<Self>, H>>
  where
    Self::Err: Clone + From<NoSuchElementError>,
    H: Fn(PublishSubject<Self::Err, Self::Err>) -> N + Send + Sync + 'static,
    N: ObservableSource<Err = Self::Err>,
  {
    MaybeToSingle(RetryWhen::new(SingleAsMaybe(self), handler))
  }

  // ==================== Time and threads ====================

  /// Fails with [`TimeoutError`] if no signal arrives within `bound`.
  fn timeout<Sch>(
    self,
    bound: Duration,
    scheduler: Sch,
  ) -> MaybeAsSingle<Timeout<Lifted<Self>, Sch, TimeoutFailure<Self::Item, Self::Err>>>
  where
    Sch: Scheduler,
    Self::Err: From<TimeoutError>,
  {
    let fallback = TimeoutFailure::new(bound);
    MaybeAsSingle(Timeout::new(SingleAsMaybe(self), bound, scheduler, fallback))
  }

  /// Subscribes `fallback` if no signal arrives within `bound`.
  fn timeout_or<Sch, F>(
    self,
    bound: Duration,
    scheduler: Sch,
    fallback: F,
  ) -> MaybeAsSingle<Timeout<Lifted<Self>, Sch, SingleAsMaybe<F>>>
  where
    Sch: Scheduler,
    F: SingleSource<Item = Self::Item, Err = Self::Err>,
  {
    MaybeAsSingle(Timeout::new(SingleAsMaybe(self), bound, scheduler, SingleAsMaybe(fallback)))
  }

  fn delay<Sch: Scheduler>(
    self,
    delay: Duration,
    scheduler: Sch,
  ) -> MaybeAsSingle<Delay<Lifted<Self>, Sch>> {
    self.delay_with(delay, scheduler, false)
  }

  /// `delay_error` also holds back the error for `delay`.
  fn delay_with<Sch: Scheduler>(
    self,
    delay: Duration,
    scheduler: Sch,
    delay_error: bool,
  ) -> MaybeAsSingle<Delay<Lifted<Self>, Sch>> {
    MaybeAsSingle(Delay::new(SingleAsMaybe(self), delay, scheduler, delay_error))
  }

  fn delay_subscription<Sch: Scheduler>(
    self,
    delay: Duration,
    scheduler: Sch,
  ) -> MaybeAsSingle<SubscribeOn<Lifted<Self>, Sch>> {
    MaybeAsSingle(SubscribeOn::new(SingleAsMaybe(self), scheduler, Some(delay)))
  }

  fn subscribe_on<Sch: Scheduler>(
    self,
    scheduler: Sch,
  ) -> MaybeAsSingle<SubscribeOn<Lifted<Self>, Sch>> {
    MaybeAsSingle(SubscribeOn::new(SingleAsMaybe(self), scheduler, None))
  }

  fn observe_on<Sch: Scheduler>(
    self,
    scheduler: Sch,
  ) -> MaybeAsSingle<ObserveOn<Lifted<Self>, Sch>> {
    MaybeAsSingle(ObserveOn::new(SingleAsMaybe(self), scheduler))
  }

  fn unsubscribe_on<Sch: Scheduler>(
    self,
    scheduler: Sch,
  ) -> MaybeAsSingle<UnsubscribeOn<Lifted<Self>, Sch>> {
    MaybeAsSingle(UnsubscribeOn::new(SingleAsMaybe(self), scheduler))
  }

  // ==================== Sharing and lifecycle ====================

  fn cache(self) -> MaybeAsSingle<Cache<Lifted<Self>>>
  where
    Self::Item: Clone + Sync,
    Self::Err: Clone,
  {
    MaybeAsSingle(Cache::new(SingleAsMaybe(self)))
  }

  fn on_terminate_detach(self) -> MaybeAsSingle<OnTerminateDetach<Lifted<Self>>> {
    MaybeAsSingle(OnTerminateDetach::new(SingleAsMaybe(self)))
  }

  /// Gives up with [`NoSuchElementError`] once `other` succeeds or
  /// completes.
  fn take_until<U>(self, other: U) -> MaybeToSingle<TakeUntil<Lifted<Self>, U>>
  where
    U: MaybeSource<Err = Self::Err>,
    Self::Err: From<NoSuchElementError>,
  {
    MaybeToSingle(TakeUntil::new(SingleAsMaybe(self), other))
  }

  // ==================== Repetition ====================

  /// Streams the values of `times` consecutive runs.
  fn repeat(self, times: usize) -> Concat<Lifted<Self>> {
    Concat::repeat(SingleAsMaybe(self), Some(times))
  }

  fn repeat_forever(self) -> Concat<Lifted<Self>> { Concat::repeat(SingleAsMaybe(self), None) }

  fn repeat_when<H, N>(self, handler: H) -> RepeatWhen<Lifted<Self>, H>
  where
    Self::Err: Clone,
    H: Fn(PublishSubject<(), Self::Err>) -> N + Send + Sync + 'static,
    N: ObservableSource<Err = Self::Err>,
  {
    RepeatWhen::new(SingleAsMaybe(self), handler)
  }

  // ==================== Conversion ====================

  fn to_maybe(self) -> SingleAsMaybe<Self> { SingleAsMaybe(self) }

  fn to_observable(self) -> ToObservable<Lifted<Self>> { ToObservable::new(SingleAsMaybe(self)) }

  fn ignore_element(self) -> MaybeAsCompletable<Lifted<Self>> {
    MaybeAsCompletable(SingleAsMaybe(self))
  }

  fn box_it(self) -> BoxedSingle<Self::Item, Self::Err> { BoxedSingle::new(self) }

  // ==================== Subscribing ====================

  /// Subscribes `observer` and returns a handle that disposes it.
  fn subscribe_with<O>(self, observer: O) -> BoxedSubscription
  where
    O: SingleObserver<Self::Item, Self::Err>,
  {
    let (tracked, handle) = Tracked::new(observer);
    self.actual_subscribe(tracked);
    handle
  }

  fn subscribe<N, E>(self, on_success: N, on_error: E) -> BoxedSubscription
  where
    N: FnOnce(Self::Item) + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
  {
    self.subscribe_with(FnObserver { on_value: on_success, on_complete: (), on_error })
  }

  /// Blocks the current thread until the outcome is known.
  fn blocking_get(self) -> Result<Self::Item, Self::Err> {
    blocking::wait(|latch| self.actual_subscribe(latch))
  }

  /// Like [`blocking_get`](SingleExt::blocking_get), but gives up after
  /// `timeout`, disposing the source.
  fn blocking_get_timeout(self, timeout: Duration) -> Result<Self::Item, Self::Err>
  where
    Self::Err: From<TimeoutError>,
  {
    blocking::wait_timeout(|latch| self.actual_subscribe(latch), timeout)
      .unwrap_or_else(|| Err(TimeoutError { bound: timeout }.into()))
  }
}

impl<S: SingleSource> SingleExt for S {}

// ============================================================================
// Factories
// ============================================================================

pub fn just<Item, Err>(value: Item) -> MaybeAsSingle<Just<Item, Err>>
where
  Item: Clone + Send + Sync + 'static,
  Err: Send + 'static,
{
  MaybeAsSingle(Just::new(value))
}

pub fn error<Item, Err>(err: Err) -> MaybeAsSingle<Fail<Item, Err>>
where
  Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  MaybeAsSingle(Fail::new(err))
}

pub fn never<Item, Err>() -> MaybeAsSingle<Never<Item, Err>>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  MaybeAsSingle(Never::new())
}

/// Bridges a callback API; see [`SingleEmitter`].
pub fn create<Item, Err, F>(f: F) -> MaybeAsSingle<Create<F, SingleEmitter<Item, Err>>>
where
  Item: Send + 'static,
  Err: Send + 'static,
  F: Fn(SingleEmitter<Item, Err>) + Send + Sync + 'static,
{
  MaybeAsSingle(Create::single(f))
}

pub fn defer<F, R>(factory: F) -> MaybeAsSingle<Defer<F, R, SingleAsMaybe<R>>>
where
  F: Fn() -> R + Send + Sync + 'static,
  R: SingleSource,
{
  MaybeAsSingle(Defer::new(factory, SingleAsMaybe))
}

/// Succeeds with `0` after `delay`.
pub fn timer<Err, Sch>(delay: Duration, scheduler: Sch) -> MaybeAsSingle<Timer<Err, Sch>>
where
  Err: Send + 'static,
  Sch: Scheduler,
{
  MaybeAsSingle(Timer::new(delay, scheduler))
}

fn lift_all<S: SingleSource>(sources: Vec<S>) -> Vec<SingleAsMaybe<S>> {
  sources.into_iter().map(SingleAsMaybe).collect()
}

/// Mirrors whichever source signals first; an empty list fails with
/// [`NoSuchElementError`].
pub fn amb<S>(sources: Vec<S>) -> MaybeToSingle<Amb<SingleAsMaybe<S>>>
where
  S: SingleSource,
  S::Err: From<NoSuchElementError>,
{
  MaybeToSingle(Amb::new(lift_all(sources)))
}

/// Streams the values of `sources`, one source at a time.
pub fn concat<S: SingleSource>(sources: Vec<S>) -> Concat<SingleAsMaybe<S>> {
  Concat::new(lift_all(sources))
}

pub fn concat_delay_errors<S>(sources: Vec<S>) -> Concat<SingleAsMaybe<S>>
where
  S: SingleSource,
  S::Err: From<CompositeError<S::Err>>,
{
  Concat::delay_errors(lift_all(sources))
}

pub fn concat_eager<S: SingleSource>(
  sources: Vec<S>,
  max_concurrency: usize,
) -> ConcatEager<SingleAsMaybe<S>> {
  ConcatEager::new(lift_all(sources), max_concurrency)
}

pub fn concat_eager_delay_errors<S>(
  sources: Vec<S>,
  max_concurrency: usize,
) -> ConcatEager<SingleAsMaybe<S>>
where
  S: SingleSource,
  S::Err: From<CompositeError<S::Err>>,
{
  ConcatEager::delay_errors(lift_all(sources), max_concurrency)
}

/// Combines one value of every source. An empty list fails with
/// [`NoSuchElementError`].
pub fn zip<S, F, R>(sources: Vec<S>, zipper: F) -> MaybeToSingle<Zip<SingleAsMaybe<S>, F>>
where
  S: SingleSource,
  S::Err: From<NoSuchElementError>,
  F: Fn(Vec<S::Item>) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  MaybeToSingle(Zip::new(lift_all(sources), zipper))
}

/// Like [`zip`], but the zipper may fail; its error becomes the terminal
/// error.
pub fn try_zip<S, F, R>(sources: Vec<S>, zipper: F) -> MaybeToSingle<TryZip<SingleAsMaybe<S>, F, R>>
where
  S: SingleSource,
  S::Err: From<NoSuchElementError>,
  F: Fn(Vec<S::Item>) -> Result<R, S::Err> + Send + Sync + 'static,
  R: Send + 'static,
{
  MaybeToSingle(Zip::new(lift_all(sources), zipper).fallible())
}

pub fn zip_delay_errors<S, F, R>(
  sources: Vec<S>,
  zipper: F,
) -> MaybeToSingle<Zip<SingleAsMaybe<S>, F>>
where
  S: SingleSource,
  S::Err: From<NoSuchElementError> + From<CompositeError<S::Err>>,
  F: Fn(Vec<S::Item>) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  MaybeToSingle(Zip::delay_errors(lift_all(sources), zipper))
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::{
    prelude::*,
    test_util::{Event, Failure, TestObserver},
  };

  #[rxsingle_macro::test]
  fn callbacks_receive_the_value() {
    let got = Arc::new(Mutex::new(None));
    let c_got = got.clone();
    single::just::<_, ()>("hi").subscribe(move |v| *c_got.lock().unwrap() = Some(v), |_| {});
    assert_eq!(*got.lock().unwrap(), Some("hi"));
  }

  #[rxsingle_macro::test]
  fn try_map_failure_is_the_terminal_error() {
    let spy = TestObserver::<i32, &str>::new();
    single::just(4)
      .try_map(|v: i32| if v > 3 { Err("too big") } else { Ok(v) })
      .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("too big")]);
  }

  #[rxsingle_macro::test]
  fn filter_turns_into_a_maybe() {
    let spy = TestObserver::<i32, ()>::new();
    single::just(1).filter(|v| *v > 1).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn conversions_keep_the_outcome() {
    assert_eq!(single::just::<_, ()>(5).to_maybe().blocking_get(), Ok(Some(5)));
    assert_eq!(single::just::<_, ()>(5).ignore_element().blocking_get(), Ok(()));

    let spy = TestObserver::<i32, ()>::new();
    single::just(5).to_observable().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Next(5), Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn flat_map_maybe_can_end_empty() {
    let spy = TestObserver::<i32, ()>::new();
    single::just(2).flat_map_maybe(|_| maybe::empty()).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn subscribe_handle_disposes() {
    let subject = SingleSubject::<i32, ()>::new();
    let subscription = subject.clone().map(|v| v + 1).subscribe(|_| {}, |_| {});
    assert!(subject.has_observers());
    subscription.unsubscribe();
    assert!(subscription.is_closed());
    assert!(!subject.has_observers());
  }

  #[rxsingle_macro::test]
  fn blocking_get_gives_up_after_the_timeout() {
    let got = single::never::<i32, Failure>().blocking_get_timeout(Duration::from_millis(5));
    assert_eq!(got, Err(Failure::Timeout));
  }
}
