//! Shares one upstream run between every subscriber and replays its outcome.
//!
//! The first subscriber starts a run: a [`TerminalCore`] that the upstream
//! feeds. Later subscribers join the same run and get the outcome replayed
//! once it is known. A run is dropped and the next subscriber starts a fresh
//! one when
//!
//! - the run failed, or
//! - every observer disposed before it terminated, which also disposes the
//!   upstream.
//!
//! A successful or empty outcome stays cached for good. Once settled it is
//! replayed straight from a set-once cell, so steady-state subscribers never
//! touch the run lock.

use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::{
  maybe::MaybeSource,
  notification::Notification,
  observer::{BoxedMaybeObserver, MaybeObserver},
  subject::terminal::{TerminalCore, Ticket},
  subscription::{BooleanSubscription, BoxedSubscription, Subscription},
};

type Run<Item, Err> = Arc<TerminalCore<Item, Err>>;

/// `Some` for a cached value, `None` for a cached empty outcome.
type Settled<Item> = Arc<OnceCell<Option<Item>>>;

pub struct Cache<S: MaybeSource> {
  source: Arc<S>,
  settled: Settled<S::Item>,
  run: Arc<Mutex<Option<Run<S::Item, S::Err>>>>,
}

impl<S: MaybeSource> Clone for Cache<S> {
  fn clone(&self) -> Self {
    Self { source: self.source.clone(), settled: self.settled.clone(), run: self.run.clone() }
  }
}

impl<S: MaybeSource> Cache<S> {
  pub(crate) fn new(source: S) -> Self {
    Self {
      source: Arc::new(source),
      settled: Arc::new(OnceCell::new()),
      run: Arc::new(Mutex::new(None)),
    }
  }

  /// The run to join, and whether the caller has to connect it.
  fn current_run(&self) -> (Run<S::Item, S::Err>, bool) {
    let mut slot = self.run.lock().unwrap();
    if let Some(run) = slot.as_ref() {
      if !run.is_abandoned() && !run.has_failed() {
        return (run.clone(), false);
      }
      debug!(failed = run.has_failed(), "cache run reset");
    }
    let run = Arc::new(TerminalCore::abandoning());
    *slot = Some(run.clone());
    (run, true)
  }
}

impl<S> MaybeSource for Cache<S>
where
  S: MaybeSource,
  S::Item: Clone + Sync,
  S::Err: Clone,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, mut observer: O)
  where
    O: MaybeObserver<Self::Item, Self::Err>,
  {
    if let Some(outcome) = self.settled.get() {
      let subscription = Arc::new(BooleanSubscription::new());
      observer.on_subscribe(subscription.clone());
      if !subscription.is_closed() {
        match outcome.clone() {
          Some(value) => observer.on_success(value),
          None => observer.on_complete(),
        }
      }
      return;
    }
    let ticket = Arc::new(Ticket::new());
    observer.on_subscribe(ticket.clone());
    let mut observer: BoxedMaybeObserver<S::Item, S::Err> = Box::new(observer);
    loop {
      let (run, connect) = self.current_run();
      let joined = run.join(&ticket, observer);
      // A subscriber that left before joining may have abandoned the run.
      if connect && !run.is_abandoned() {
        debug!("cache connecting upstream");
        let settled = self.settled.clone();
        self.source.actual_subscribe(CacheObserver { run, settled });
      }
      match joined {
        Ok(()) => return,
        // The run was abandoned between lookup and join; try the next one.
        Err(back) => observer = back,
      }
    }
  }
}

pub struct CacheObserver<Item, Err> {
  run: Run<Item, Err>,
  settled: Settled<Item>,
}

impl<Item, Err> MaybeObserver<Item, Err> for CacheObserver<Item, Err>
where
  Item: Clone + Send + Sync + 'static,
  Err: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.run.connection.try_set(subscription);
  }

  fn on_success(self, value: Item) {
    let _ = self.settled.set(Some(value.clone()));
    self.run.terminate(Notification::Success(value));
  }

  fn on_complete(self) {
    let _ = self.settled.set(None);
    self.run.terminate(Notification::Complete);
  }

  fn on_error(self, err: Err) { self.run.terminate(Notification::Error(err)); }
}
