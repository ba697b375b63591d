//! Repeat operators: resubscribe to the source after it terminates
//! normally.
//!
//! `repeat(times)` is a [`Concat`](super::concat::Concat) over the same
//! source. [`RepeatWhen`] lets a handler decide: every time the source
//! finishes a round, a `()` is pushed into the subject the handler received,
//! and an item of the sequence the handler returns starts the next round.
//! Values of every round are streamed downstream.

use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, Weak,
  },
};

use tracing::debug;

use crate::{
  maybe::MaybeSource,
  observable::ObservableSource,
  observer::{MaybeObserver, Observer},
  subject::PublishSubject,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

pub struct RepeatWhen<S, H> {
  source: Arc<S>,
  handler: Arc<H>,
}

impl<S, H> RepeatWhen<S, H> {
  pub(crate) fn new(source: S, handler: H) -> Self {
    Self { source: Arc::new(source), handler: Arc::new(handler) }
  }
}

impl<S, H, N> ObservableSource for RepeatWhen<S, H>
where
  S: MaybeSource,
  S::Err: Clone,
  H: Fn(PublishSubject<(), S::Err>) -> N + Send + Sync + 'static,
  N: ObservableSource<Err = S::Err>,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    let rounds = PublishSubject::new();
    let state = Arc::new_cyclic(|this| RepeatState {
      this: this.clone(),
      source: self.source.clone(),
      rounds: rounds.clone(),
      downstream: Mutex::new(None),
      disposed: AtomicBool::new(false),
      upstream: SubscriptionCell::new(),
      notifier: SubscriptionCell::new(),
      control: Mutex::new(Control { events: VecDeque::new(), active: false, wanted: true }),
      round: AtomicUsize::new(0),
      wip: AtomicUsize::new(0),
    });
    observer.on_subscribe(state.clone());
    *state.downstream.lock().unwrap() = Some(observer);
    (self.handler)(rounds).actual_subscribe(NotifierObserver { state: state.clone() });
    state.drain();
  }
}

enum Signal<Item, Err> {
  /// A round ended with a value.
  Value(Item),
  /// A round ended empty.
  Done,
  Error(Err),
  NotifierComplete,
  NotifierError(Err),
}

struct Control<Item, Err> {
  events: VecDeque<Signal<Item, Err>>,
  active: bool,
  wanted: bool,
}

enum Step<Item, Err> {
  Handle(Signal<Item, Err>),
  Subscribe,
  Idle,
}

struct RepeatState<S: MaybeSource, O> {
  this: Weak<Self>,
  source: Arc<S>,
  rounds: PublishSubject<(), S::Err>,
  /// Only the drain owner calls into it.
  downstream: Mutex<Option<O>>,
  disposed: AtomicBool,
  upstream: SubscriptionCell,
  notifier: SubscriptionCell,
  control: Mutex<Control<S::Item, S::Err>>,
  round: AtomicUsize,
  wip: AtomicUsize,
}

impl<S, O> RepeatState<S, O>
where
  S: MaybeSource,
  S::Err: Clone,
  O: Observer<S::Item, S::Err>,
{
  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      loop {
        match self.next_step() {
          Step::Handle(signal) => self.handle(signal),
          Step::Subscribe => {
            let round = self.round.fetch_add(1, Ordering::AcqRel);
            if round > 0 {
              debug!(round, "repeat_when resubscribing");
            }
            if let Some(state) = self.this.upgrade() {
              self.source.actual_subscribe(RoundObserver { state });
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

  fn next_step(&self) -> Step<S::Item, S::Err> {
    let mut control = self.control.lock().unwrap();
    if self.disposed.load(Ordering::Acquire) {
      control.events.clear();
      drop(control);
      self.downstream.lock().unwrap().take();
      return Step::Idle;
    }
    if let Some(signal) = control.events.pop_front() {
      return Step::Handle(signal);
    }
    if control.wanted && !control.active {
      control.wanted = false;
      control.active = true;
      return Step::Subscribe;
    }
    Step::Idle
  }

  fn handle(&self, signal: Signal<S::Item, S::Err>) {
    match signal {
      Signal::Value(value) => {
        if let Some(observer) = self.downstream.lock().unwrap().as_mut() {
          observer.on_next(value);
        }
        self.rounds.on_next(());
      }
      Signal::Done => self.rounds.on_next(()),
      Signal::Error(err) => {
        self.notifier.unsubscribe();
        self.terminate(|observer| observer.on_error(err));
      }
      Signal::NotifierComplete => {
        self.upstream.unsubscribe();
        self.terminate(|observer| observer.on_complete());
      }
      Signal::NotifierError(err) => {
        self.upstream.unsubscribe();
        self.terminate(|observer| observer.on_error(err));
      }
    }
  }

  fn terminate(&self, deliver: impl FnOnce(O)) {
    self.disposed.store(true, Ordering::Release);
    let observer = self.downstream.lock().unwrap().take();
    if let Some(observer) = observer {
      deliver(observer);
    }
  }

  fn push(&self, signal: Signal<S::Item, S::Err>, round_over: bool) {
    {
      let mut control = self.control.lock().unwrap();
      if round_over {
        control.active = false;
      }
      control.events.push_back(signal);
    }
    self.drain();
  }

  fn want_next(&self) {
    self.control.lock().unwrap().wanted = true;
    self.drain();
  }
}

impl<S, O> Subscription for RepeatState<S, O>
where
  S: MaybeSource,
  S::Err: Clone,
  O: Observer<S::Item, S::Err>,
{
  fn unsubscribe(&self) {
    if !self.disposed.swap(true, Ordering::AcqRel) {
      self.upstream.unsubscribe();
      self.notifier.unsubscribe();
      self.drain();
    }
  }

  fn is_closed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

pub struct RoundObserver<S: MaybeSource, O> {
  state: Arc<RepeatState<S, O>>,
}

impl<S, O> MaybeObserver<S::Item, S::Err> for RoundObserver<S, O>
where
  S: MaybeSource,
  S::Err: Clone,
  O: Observer<S::Item, S::Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.replace(subscription);
  }

  fn on_success(self, value: S::Item) { self.state.push(Signal::Value(value), true) }

  fn on_complete(self) { self.state.push(Signal::Done, true) }

  fn on_error(self, err: S::Err) { self.state.push(Signal::Error(err), true) }
}

pub struct NotifierObserver<S: MaybeSource, O> {
  state: Arc<RepeatState<S, O>>,
}

impl<S, O, T> Observer<T, S::Err> for NotifierObserver<S, O>
where
  S: MaybeSource,
  S::Err: Clone,
  O: Observer<S::Item, S::Err>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.notifier.try_set(subscription);
  }

  fn on_next(&mut self, _: T) { self.state.want_next() }

  fn on_complete(self) { self.state.push(Signal::NotifierComplete, false) }

  fn on_error(self, err: S::Err) { self.state.push(Signal::NotifierError(err), false) }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{
    prelude::*,
    test_util::{Event, TestObserver},
  };

  fn counter() -> (impl SingleSource<Item = usize, Err = &'static str>, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let source = single::defer(move || single::just(c_runs.fetch_add(1, Ordering::SeqCst) + 1));
    (source, runs)
  }

  #[rxsingle_macro::test]
  fn repeat_streams_every_round() {
    let (source, _) = counter();
    let spy = TestObserver::<usize, &str>::new();
    source.repeat(3).subscribe_with(spy.clone());
    assert_eq!(
      spy.events(),
      vec![Event::Next(1), Event::Next(2), Event::Next(3), Event::Complete]
    );
  }

  #[rxsingle_macro::test]
  fn repeat_stops_on_error() {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let spy = TestObserver::<i32, &str>::new();
    maybe::defer(move || {
      if c_runs.fetch_add(1, Ordering::SeqCst) == 1 {
        maybe::error("second").box_it()
      } else {
        maybe::empty().box_it()
      }
    })
    .repeat(5)
    .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Error("second")]);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
  }

  #[rxsingle_macro::test]
  fn completable_repeat_stays_completable() {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let spy = TestObserver::<(), &str>::new();
    completable::defer(move || {
      c_runs.fetch_add(1, Ordering::SeqCst);
      completable::complete()
    })
    .repeat(4)
    .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
    assert_eq!(runs.load(Ordering::SeqCst), 4);
  }

  #[rxsingle_macro::test]
  fn repeat_when_runs_until_the_notifier_completes() {
    let (source, runs) = counter();
    let spy = TestObserver::<usize, &str>::new();
    source.repeat_when(|rounds| rounds.take(2)).subscribe_with(spy.clone());
    // The second item and the completion arrive together.
    assert_eq!(spy.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
  }

  #[rxsingle_macro::test]
  fn repeat_when_waits_for_the_notifier() {
    let trigger = PublishSubject::<(), &str>::new();
    let c_trigger = trigger.clone();
    let (source, runs) = counter();
    let spy = TestObserver::<usize, &str>::new();
    source.repeat_when(move |_| c_trigger.clone()).subscribe_with(spy.clone());
    assert_eq!(spy.values(), vec![1]);

    trigger.on_next(());
    trigger.on_next(());
    assert_eq!(spy.values(), vec![1, 2, 3]);
    trigger.on_error("stop");
    assert_eq!(spy.events().last(), Some(&Event::Error("stop")));
    assert_eq!(runs.load(Ordering::SeqCst), 3);
  }

  #[rxsingle_macro::test]
  fn repeat_when_dispose_releases_both_sides() {
    let trigger = PublishSubject::<(), &str>::new();
    let c_trigger = trigger.clone();
    let subject = MaybeSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    subject.clone().repeat_when(move |_| c_trigger.clone()).subscribe_with(spy.clone());
    spy.dispose();
    assert!(!trigger.has_observers());
    assert!(!subject.has_observers());
  }

  #[rxsingle_macro::test]
  fn completable_repeat_when_counts_rounds() {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let spy = TestObserver::<(), &str>::new();
    completable::defer(move || {
      c_runs.fetch_add(1, Ordering::SeqCst);
      completable::complete()
    })
    .repeat_when(|rounds| rounds.take(3))
    .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Complete]);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
  }
}
