//! The Maybe contract: at most one value, then completion or an error.
//!
//! Maybe is the core every single-shot operator is written against; Single
//! and Completable reach the same operators through the adapters in
//! [`crate::adapter`].
//!
//! ```rust
//! use rxsingle::prelude::*;
//!
//! let first_even = maybe::just::<_, ()>(3).filter(|v| v % 2 == 0);
//! assert_eq!(first_even.blocking_get(), Ok(None));
//! ```

use crate::{
  adapter::{CompletableAsMaybe, MaybeAsCompletable, MaybeToSingle, SingleAsMaybe},
  completable::CompletableSource,
  emitter::{Create, MaybeEmitter},
  error::{CompositeError, NoSuchElementError, TimeoutError},
  factory::{Defer, Empty, Fail, Just, Never, Timer},
  observable::ObservableSource,
  observer::{FnObserver, MaybeObserver, Tracked},
  ops::{
    amb::Amb,
    blocking,
    box_it::BoxedMaybe,
    cache::Cache,
    concat::Concat,
    concat_eager::ConcatEager,
    delay::Delay,
    flat_map::{attempt, Attempt, FlatMap, FlatMapObservable},
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
  single::SingleSource,
  subject::PublishSubject,
  subscription::BoxedSubscription,
};

/// A cold or hot source of zero or one value, or an error.
pub trait MaybeSource: Send + Sync + 'static {
  type Item: Send + 'static;
  type Err: Send + 'static;

  /// Subscribes `observer`. Implementations call `on_subscribe` first and
  /// then at most one terminal method.
  fn actual_subscribe<O>(&self, observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>;
}

/// Operators available on every [`MaybeSource`].
pub trait MaybeExt: MaybeSource + Sized {
  // ==================== Transformation ====================

  fn map<F, R>(self, f: F) -> Map<Self, F>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: Send + 'static,
  {
    Map::new(self, f)
  }

  fn try_map<F, R>(self, f: F) -> TryMap<Self, F>
  where
    F: Fn(Self::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: Send + 'static,
  {
    TryMap::new(self, f)
  }

  fn filter<F>(self, predicate: F) -> Filter<Self, F>
  where
    F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
  {
    Filter::new(self, predicate)
  }

  fn flat_map<F, R>(self, f: F) -> FlatMap<Self, F, R, R>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: MaybeSource<Err = Self::Err>,
  {
    FlatMap::new(self, f, std::convert::identity)
  }

  /// Like [`flat_map`](MaybeExt::flat_map), but the mapper may fail; its
  /// error becomes the terminal error.
  fn try_flat_map<F, R>(self, f: F) -> FlatMap<Self, F, Result<R, Self::Err>, Attempt<R>>
  where
    F: Fn(Self::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: MaybeSource<Err = Self::Err>,
  {
    FlatMap::new(self, f, attempt)
  }

  /// Still a Maybe: an empty upstream never reaches `f`.
  fn flat_map_single<F, R>(self, f: F) -> FlatMap<Self, F, R, SingleAsMaybe<R>>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: SingleSource<Err = Self::Err>,
  {
    FlatMap::new(self, f, SingleAsMaybe)
  }

  fn flat_map_completable<F, R>(
    self,
    f: F,
  ) -> MaybeAsCompletable<FlatMap<Self, F, R, CompletableAsMaybe<R>>>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: CompletableSource<Err = Self::Err>,
  {
    MaybeAsCompletable(FlatMap::new(self, f, CompletableAsMaybe))
  }

  fn flat_map_observable<F, R>(self, f: F) -> FlatMapObservable<Self, F>
  where
    F: Fn(Self::Item) -> R + Send + Sync + 'static,
    R: ObservableSource<Err = Self::Err>,
  {
    FlatMapObservable::new(self, f)
  }

  // ==================== Error handling ====================

  fn on_error_resume_next<F, R>(self, f: F) -> OnErrorResumeNext<Self, F, R, R>
  where
    F: Fn(Self::Err) -> R + Send + Sync + 'static,
    R: MaybeSource<Item = Self::Item>,
  {
    OnErrorResumeNext::new(self, f, std::convert::identity)
  }

  fn on_error_return<F>(self, f: F) -> OnErrorReturn<Self, F>
  where
    F: Fn(Self::Err) -> Self::Item + Send + Sync + 'static,
  {
    OnErrorReturn::new(self, f)
  }

  fn on_error_complete(self) -> OnErrorComplete<Self> { OnErrorComplete::new(self) }

  fn retry<P>(self, policy: P) -> Retry<Self, P>
  where
    P: RetryPolicy<Self::Err>,
  {
    Retry::new(self, policy)
  }

  /// Resubscribes whenever the sequence built by `handler` emits; that
  /// sequence completing completes this one empty.
  fn retry_when<H, N>(self, handler: H) -> RetryWhen<Self, H>
  where
    Self::Err: Clone,
    H: Fn(PublishSubject<Self::Err, Self::Err>) -> N + Send + Sync + 'static,
    N: ObservableSource<Err = Self::Err>,
  {
    RetryWhen::new(self, handler)
  }

  // ==================== Time and threads ====================

  fn timeout<Sch>(
    self,
    bound: Duration,
    scheduler: Sch,
  ) -> Timeout<Self, Sch, TimeoutFailure<Self::Item, Self::Err>>
  where
    Sch: Scheduler,
    Self::Err: From<TimeoutError>,
  {
    Timeout::new(self, bound, scheduler, TimeoutFailure::new(bound))
  }

  fn timeout_or<Sch, F>(self, bound: Duration, scheduler: Sch, fallback: F) -> Timeout<Self, Sch, F>
  where
    Sch: Scheduler,
    F: MaybeSource<Item = Self::Item, Err = Self::Err>,
  {
    Timeout::new(self, bound, scheduler, fallback)
  }

  fn delay<Sch: Scheduler>(self, delay: Duration, scheduler: Sch) -> Delay<Self, Sch> {
    Delay::new(self, delay, scheduler, false)
  }

  fn delay_with<Sch: Scheduler>(
    self,
    delay: Duration,
    scheduler: Sch,
    delay_error: bool,
  ) -> Delay<Self, Sch> {
    Delay::new(self, delay, scheduler, delay_error)
  }

  fn delay_subscription<Sch: Scheduler>(
    self,
    delay: Duration,
    scheduler: Sch,
  ) -> SubscribeOn<Self, Sch> {
    SubscribeOn::new(self, scheduler, Some(delay))
  }

  fn subscribe_on<Sch: Scheduler>(self, scheduler: Sch) -> SubscribeOn<Self, Sch> {
    SubscribeOn::new(self, scheduler, None)
  }

  fn observe_on<Sch: Scheduler>(self, scheduler: Sch) -> ObserveOn<Self, Sch> {
    ObserveOn::new(self, scheduler)
  }

  fn unsubscribe_on<Sch: Scheduler>(self, scheduler: Sch) -> UnsubscribeOn<Self, Sch> {
    UnsubscribeOn::new(self, scheduler)
  }

  // ==================== Sharing and lifecycle ====================

  fn cache(self) -> Cache<Self>
  where
    Self::Item: Clone + Sync,
    Self::Err: Clone,
  {
    Cache::new(self)
  }

  fn on_terminate_detach(self) -> OnTerminateDetach<Self> { OnTerminateDetach::new(self) }

  /// Completes empty once `other` succeeds or completes.
  fn take_until<U>(self, other: U) -> TakeUntil<Self, U>
  where
    U: MaybeSource<Err = Self::Err>,
  {
    TakeUntil::new(self, other)
  }

  // ==================== Repetition ====================

  fn repeat(self, times: usize) -> Concat<Self> { Concat::repeat(self, Some(times)) }

  fn repeat_forever(self) -> Concat<Self> { Concat::repeat(self, None) }

  fn repeat_when<H, N>(self, handler: H) -> RepeatWhen<Self, H>
  where
    Self::Err: Clone,
    H: Fn(PublishSubject<(), Self::Err>) -> N + Send + Sync + 'static,
    N: ObservableSource<Err = Self::Err>,
  {
    RepeatWhen::new(self, handler)
  }

  // ==================== Conversion ====================

  /// Fails with [`NoSuchElementError`] when this completes empty.
  fn to_single(self) -> MaybeToSingle<Self>
  where
    Self::Err: From<NoSuchElementError>,
  {
    MaybeToSingle(self)
  }

  fn to_observable(self) -> ToObservable<Self> { ToObservable::new(self) }

  fn ignore_element(self) -> MaybeAsCompletable<Self> { MaybeAsCompletable(self) }

  fn box_it(self) -> BoxedMaybe<Self::Item, Self::Err> { BoxedMaybe::new(self) }

  // ==================== Subscribing ====================

  fn subscribe_with<O>(self, observer: O) -> BoxedSubscription
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let (tracked, handle) = Tracked::new(observer);
    self.actual_subscribe(tracked);
    handle
  }

  fn subscribe<N, C, E>(self, on_success: N, on_complete: C, on_error: E) -> BoxedSubscription
  where
    N: FnOnce(Self::Item) + Send + 'static,
    C: FnOnce() + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
  {
    self.subscribe_with(FnObserver { on_value: on_success, on_complete, on_error })
  }

  /// Blocks until the outcome is known; `Ok(None)` means empty.
  fn blocking_get(self) -> Result<Option<Self::Item>, Self::Err> {
    blocking::wait(|latch| self.actual_subscribe(latch))
  }

  fn blocking_get_timeout(self, timeout: Duration) -> Result<Option<Self::Item>, Self::Err>
  where
    Self::Err: From<TimeoutError>,
  {
    blocking::wait_timeout(|latch| self.actual_subscribe(latch), timeout)
      .unwrap_or_else(|| Err(TimeoutError { bound: timeout }.into()))
  }
}

impl<S: MaybeSource> MaybeExt for S {}

// ============================================================================
// Factories
// ============================================================================

pub fn just<Item, Err>(value: Item) -> Just<Item, Err>
where
  Item: Clone + Send + Sync + 'static,
  Err: Send + 'static,
{
  Just::new(value)
}

pub fn error<Item, Err>(err: Err) -> Fail<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  Fail::new(err)
}

pub fn empty<Item, Err>() -> Empty<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  Empty::new()
}

pub fn never<Item, Err>() -> Never<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  Never::new()
}

pub fn create<Item, Err, F>(f: F) -> Create<F, MaybeEmitter<Item, Err>>
where
  Item: Send + 'static,
  Err: Send + 'static,
  F: Fn(MaybeEmitter<Item, Err>) + Send + Sync + 'static,
{
  Create::maybe(f)
}

pub fn defer<F, R>(factory: F) -> Defer<F, R, R>
where
  F: Fn() -> R + Send + Sync + 'static,
  R: MaybeSource,
{
  Defer::new(factory, std::convert::identity)
}

pub fn timer<Err, Sch>(delay: Duration, scheduler: Sch) -> Timer<Err, Sch>
where
  Err: Send + 'static,
  Sch: Scheduler,
{
  Timer::new(delay, scheduler)
}

/// Mirrors whichever source signals first; an empty list completes.
pub fn amb<S: MaybeSource>(sources: Vec<S>) -> Amb<S> { Amb::new(sources) }

pub fn concat<S: MaybeSource>(sources: Vec<S>) -> Concat<S> { Concat::new(sources) }

pub fn concat_delay_errors<S>(sources: Vec<S>) -> Concat<S>
where
  S: MaybeSource,
  S::Err: From<CompositeError<S::Err>>,
{
  Concat::delay_errors(sources)
}

pub fn concat_eager<S: MaybeSource>(sources: Vec<S>, max_concurrency: usize) -> ConcatEager<S> {
  ConcatEager::new(sources, max_concurrency)
}

pub fn concat_eager_delay_errors<S>(sources: Vec<S>, max_concurrency: usize) -> ConcatEager<S>
where
  S: MaybeSource,
  S::Err: From<CompositeError<S::Err>>,
{
  ConcatEager::delay_errors(sources, max_concurrency)
}

/// Combines one value of every source; any empty source completes the
/// result empty.
pub fn zip<S, F, R>(sources: Vec<S>, zipper: F) -> Zip<S, F>
where
  S: MaybeSource,
  F: Fn(Vec<S::Item>) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  Zip::new(sources, zipper)
}

/// Like [`zip`], but the zipper may fail; its error becomes the terminal
/// error.
pub fn try_zip<S, F, R>(sources: Vec<S>, zipper: F) -> TryZip<S, F, R>
where
  S: MaybeSource,
  F: Fn(Vec<S::Item>) -> Result<R, S::Err> + Send + Sync + 'static,
  R: Send + 'static,
{
  Zip::new(sources, zipper).fallible()
}

pub fn zip_delay_errors<S, F, R>(sources: Vec<S>, zipper: F) -> Zip<S, F>
where
  S: MaybeSource,
  S::Err: From<CompositeError<S::Err>>,
  F: Fn(Vec<S::Item>) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  Zip::delay_errors(sources, zipper)
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    test_util::{Event, Failure, TestObserver},
  };

  #[rxsingle_macro::test]
  fn empty_to_single_has_no_element() {
    let spy = TestObserver::<i32, Failure>::new();
    maybe::empty().to_single().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error(Failure::Missing)]);
  }

  #[rxsingle_macro::test]
  fn empty_to_observable_only_completes() {
    let spy = TestObserver::<i32, ()>::new();
    maybe::empty().to_observable().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn just_to_observable_emits_then_completes() {
    let spy = TestObserver::<i32, ()>::new();
    maybe::just(8).to_observable().subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Next(8), Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn on_error_complete_swallows_the_error() {
    assert_eq!(maybe::error::<i32, _>("x").on_error_complete().blocking_get(), Ok(None));
  }

  #[rxsingle_macro::test]
  fn map_skips_empty() {
    let spy = TestObserver::<String, ()>::new();
    maybe::empty::<i32, ()>().map(|v| v.to_string()).subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
  }

  #[rxsingle_macro::test]
  fn three_callback_subscribe() {
    let completed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let c_completed = completed.clone();
    maybe::empty::<i32, ()>().subscribe(
      |_| {},
      move || c_completed.store(true, std::sync::atomic::Ordering::SeqCst),
      |_| {},
    );
    assert!(completed.load(std::sync::atomic::Ordering::SeqCst));
  }
}
