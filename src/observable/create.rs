use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use crate::{
  observable::ObservableSource,
  observer::{BoxedObserver, Observer},
  subscription::{Subscription, SubscriptionCell},
};

struct EmitterCore<Item, Err> {
  downstream: Mutex<Option<BoxedObserver<Item, Err>>>,
  done: AtomicBool,
  hook: SubscriptionCell,
}

impl<Item, Err> EmitterCore<Item, Err> {
  fn finish(&self, deliver: impl FnOnce(BoxedObserver<Item, Err>)) {
    if self.done.swap(true, Ordering::AcqRel) {
      return;
    }
    let observer = self.downstream.lock().unwrap().take();
    if let Some(observer) = observer {
      deliver(observer);
    }
    self.hook.unsubscribe();
  }
}

impl<Item: Send, Err: Send> Subscription for EmitterCore<Item, Err> {
  fn unsubscribe(&self) {
    self.done.store(true, Ordering::Release);
    let observer = self.downstream.lock().unwrap().take();
    drop(observer);
    self.hook.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.done.load(Ordering::Acquire) }
}

/// Emitter handed to `observable::create`.
///
/// Calls must not overlap: an item emitted while another `on_next` is still
/// running on a different thread is dropped. Disposing from inside an
/// observer callback is fine.
pub struct ObservableEmitter<Item, Err>(Arc<EmitterCore<Item, Err>>);

impl<Item, Err> Clone for ObservableEmitter<Item, Err> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Item: Send + 'static, Err: Send + 'static> ObservableEmitter<Item, Err> {
  pub fn on_next(&self, value: Item) {
    let observer = self.0.downstream.lock().unwrap().take();
    let Some(mut observer) = observer else { return };
    // The observer is out of the lock, so a dispose from inside `on_next`
    // does not deadlock; it only flips `done`.
    observer.on_next(value);
    let mut slot = self.0.downstream.lock().unwrap();
    if !self.0.done.load(Ordering::Acquire) {
      *slot = Some(observer);
    }
  }

  pub fn on_complete(&self) { self.0.finish(|observer| observer.on_complete()) }

  pub fn on_error(&self, err: Err) { self.0.finish(|observer| observer.on_error(err)) }

  /// Registers the cancel action that runs on the terminal signal or on
  /// dispose.
  pub fn set_subscription(&self, subscription: impl Subscription + 'static) {
    self.0.hook.try_set(Arc::new(subscription));
  }

  pub fn is_disposed(&self) -> bool { self.0.done.load(Ordering::Acquire) }
}

/// Runs `f` with a fresh [`ObservableEmitter`] on every subscription.
pub struct Create<F, Item, Err> {
  f: Arc<F>,
  _p: PhantomData<fn() -> (Item, Err)>,
}

impl<F, Item, Err> Create<F, Item, Err> {
  pub(crate) fn new(f: F) -> Self { Self { f: Arc::new(f), _p: PhantomData } }
}

impl<F, Item, Err> Clone for Create<F, Item, Err> {
  fn clone(&self) -> Self { Self { f: self.f.clone(), _p: PhantomData } }
}

impl<F, Item, Err> ObservableSource for Create<F, Item, Err>
where
  F: Fn(ObservableEmitter<Item, Err>) + Send + Sync + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: Observer<Self::Item, Self::Err>,
  {
    let core = Arc::new(EmitterCore {
      downstream: Mutex::new(None),
      done: AtomicBool::new(false),
      hook: SubscriptionCell::new(),
    });
    observer.on_subscribe(core.clone());
    {
      let mut slot = core.downstream.lock().unwrap();
      if core.is_closed() {
        return;
      }
      *slot = Some(Box::new(observer));
    }
    (self.f)(ObservableEmitter(core));
  }
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

  #[rxsingle_macro::test]
  fn emits_until_the_terminal_call() {
    let spy = TestObserver::<i32, &str>::new();
    observable::create(|emitter| {
      emitter.on_next(1);
      emitter.on_next(2);
      emitter.on_error("boom");
      emitter.on_next(3);
      emitter.on_complete();
    })
    .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Next(1), Event::Next(2), Event::Error("boom")]);
  }

  #[rxsingle_macro::test]
  fn take_disposes_from_inside_on_next() {
    let cancelled = Arc::new(AtomicUsize::new(0));
    let c_cancelled = cancelled.clone();
    let spy = TestObserver::<i32, ()>::new();
    observable::create(move |emitter| {
      let c_cancelled = c_cancelled.clone();
      emitter.set_subscription(FnSubscription::new(move || {
        c_cancelled.fetch_add(1, Ordering::SeqCst);
      }));
      for v in 0..10 {
        if emitter.is_disposed() {
          break;
        }
        emitter.on_next(v);
      }
      emitter.on_complete();
    })
    .take(2)
    .subscribe_with(spy.clone());
    assert_eq!(spy.events(), vec![Event::Next(0), Event::Next(1), Event::Complete]);
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
  }
}
