//! Runs the upstream disposal on a scheduler instead of the disposing
//! thread.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use crate::{
  cell::OnceSlot,
  maybe::MaybeSource,
  observer::MaybeObserver,
  scheduler::Scheduler,
  subscription::{BoxedSubscription, Subscription, SubscriptionCell},
};

pub struct UnsubscribeOn<S, Sch> {
  source: S,
  scheduler: Sch,
}

impl<S, Sch> UnsubscribeOn<S, Sch> {
  pub(crate) fn new(source: S, scheduler: Sch) -> Self { Self { source, scheduler } }
}

impl<S, Sch> MaybeSource for UnsubscribeOn<S, Sch>
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
    let state = Arc::new(UnsubscribeOnState {
      downstream: OnceSlot::empty(),
      upstream: Arc::new(SubscriptionCell::new()),
      disposed: AtomicBool::new(false),
      scheduler: self.scheduler.clone(),
    });
    observer.on_subscribe(state.clone());
    if state.downstream.put(observer).is_err() {
      return;
    }
    self.source.actual_subscribe(UnsubscribeOnObserver { state });
  }
}

struct UnsubscribeOnState<O, Sch> {
  downstream: OnceSlot<O>,
  upstream: Arc<SubscriptionCell>,
  disposed: AtomicBool,
  scheduler: Sch,
}

impl<O: Send, Sch: Scheduler> Subscription for UnsubscribeOnState<O, Sch> {
  fn unsubscribe(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    drop(self.downstream.take());
    let upstream = self.upstream.clone();
    self.scheduler.schedule(Box::new(move || upstream.unsubscribe()), None);
  }

  fn is_closed(&self) -> bool {
    self.disposed.load(Ordering::Acquire) || self.downstream.is_closed()
  }
}

pub struct UnsubscribeOnObserver<O, Sch> {
  state: Arc<UnsubscribeOnState<O, Sch>>,
}

impl<Item, Err, O, Sch> MaybeObserver<Item, Err> for UnsubscribeOnObserver<O, Sch>
where
  O: MaybeObserver<Item, Err>,
  Sch: Scheduler,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.state.upstream.try_set(subscription);
  }

  fn on_success(self, value: Item) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_success(value);
    }
  }

  fn on_complete(self) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_complete();
    }
  }

  fn on_error(self, err: Err) {
    if let Some(observer) = self.state.downstream.take() {
      observer.on_error(err);
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, test_util::TestObserver};

  #[rxsingle_macro::test]
  fn upstream_disposal_waits_for_the_scheduler() {
    TestScheduler::init();
    let subject = MaybeSubject::<i32, &str>::new();
    let spy = TestObserver::<i32, &str>::new();
    subject.clone().unsubscribe_on(TestScheduler).subscribe_with(spy.clone());

    spy.dispose();
    assert!(subject.has_observers());
    TestScheduler::flush();
    assert!(!subject.has_observers());

    subject.on_success(1);
    assert!(spy.is_empty());
  }
}
