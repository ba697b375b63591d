//! Delay operator: shifts the terminal signal in time on a scheduler.
//!
//! Success and completion are delivered `delay` after they arrive. Errors
//! skip the wait unless the operator was built with `delay_error = true`.

use std::sync::Arc;

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  notification::Notification,
  observer::MaybeObserver,
  scheduler::{Duration, Scheduler},
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

pub struct Delay<S, Sch> {
  source: S,
  delay: Duration,
  scheduler: Sch,
  delay_error: bool,
}

impl<S, Sch> Delay<S, Sch> {
  pub(crate) fn new(source: S, delay: Duration, scheduler: Sch, delay_error: bool) -> Self {
    Self { source, delay, scheduler, delay_error }
  }
}

impl<S, Sch> MaybeSource for Delay<S, Sch>
where
  S: MaybeSource,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    let state = Arc::new(DelayState {
      downstream: OnceSlot::empty(),
      upstream: SubscriptionCell::new(),
      task: SubscriptionCell::new(),
    });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }
    self.source.actual_subscribe(DelayObserver {
      state,
      delay: self.delay,
      scheduler: self.scheduler.clone(),
      delay_error: self.delay_error,
    });
  }
}

struct DelayState<O> {
  downstream: OnceSlot<O>,
  upstream: SubscriptionCell,
  task: SubscriptionCell,
}

impl<O: Send> Subscription for DelayState<O> {
  fn unsubscribe(&self) {
    drop(self.downstream.take());
    self.upstream.unsubscribe();
    self.task.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.downstream.is_closed() }
}

pub struct DelayObserver<O, Sch> {
  state: Arc<DelayState<O>>,
  delay: Duration,
  scheduler: Sch,
  delay_error: bool,
}

impl<O, Sch> DelayObserver<O, Sch>
where
  Sch: Scheduler,
{
  fn schedule<Item, Err>(self, notification: Notification<Item, Err>)
  where
    O: MaybeObserver<Item, Err>,
    Item: Send + 'static,
    Err: Send + 'static,
  {
    if self.state.downstream.is_closed() {
      return;
    }
    let state = self.state.clone();
    let handle = self.scheduler.schedule(
      Box::new(move || {
        if let Some(observer) = state.downstream.take() {
          notification.deliver(observer);
        }
      }),
      Some(self.delay),
    );
    self.state.task.try_set(Arc::new(handle));
  }
}

impl<Item, Err, O, Sch> MaybeObserver<Item, Err> for DelayObserver<O, Sch>
where
  O: MaybeObserver<Item, Err>,
  Sch: Scheduler,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.try_set(subscription);
  }

  fn on_success(self, value: Item) { self.schedule(Notification::Success(value)) }

  fn on_complete(self) { self.schedule(Notification::Complete) }

  fn on_error(self, err: Err) {
    if self.delay_error {
      self.schedule(Notification::Error(err));
    } else if let Some(observer) = self.state.downstream.take() {
      self.state.task.unsubscribe();
      observer.on_error(err);
    }
  }
}
