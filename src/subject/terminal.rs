//! Shared core of the terminal subjects and of `cache`.
//!
//! Holds the current observers and the first terminal outcome. Observers that
//! join after the outcome is known get it replayed. Observers are never
//! called while the lock is held, so an observer may dispose or subscribe
//! again from inside its callback.
//!
//! Joining follows a two-step protocol so that a dispose racing with the
//! join can never leave an observer behind:
//!
//! 1. the membership `(core, id)` is written into the observer's [`Ticket`];
//! 2. under the core lock the ticket's `closed` flag is checked before the
//!    observer is pushed.
//!
//! Dispose sets `closed` first and reads the membership second, so either the
//! join sees `closed` or the dispose sees the membership and removes it.

use std::sync::{
  atomic::{AtomicBool, AtomicU64, Ordering},
  Arc, Mutex,
};

use smallvec::SmallVec;

use crate::{
  notification::Notification,
  observer::{BoxedMaybeObserver, MaybeObserver},
  subscription::{Subscription, SubscriptionCell},
};

type Observers<Item, Err> = SmallVec<[(u64, BoxedMaybeObserver<Item, Err>); 2]>;

struct CoreState<Item, Err> {
  observers: Observers<Item, Err>,
  outcome: Option<Notification<Item, Err>>,
  abandoned: bool,
}

pub(crate) struct TerminalCore<Item, Err> {
  state: Mutex<CoreState<Item, Err>>,
  next_id: AtomicU64,
  /// Cancelled when the last observer leaves before termination, if the core
  /// was built with `abandon_when_empty`.
  pub(crate) connection: SubscriptionCell,
  abandon_when_empty: bool,
}

impl<Item, Err> TerminalCore<Item, Err> {
  /// A core that outlives its observers, as subjects do.
  pub(crate) fn new() -> Self { Self::with_abandon(false) }

  /// A core that gives up once every observer left early, as a cache run
  /// does.
  pub(crate) fn abandoning() -> Self { Self::with_abandon(true) }

  fn with_abandon(abandon_when_empty: bool) -> Self {
    Self {
      state: Mutex::new(CoreState { observers: SmallVec::new(), outcome: None, abandoned: false }),
      next_id: AtomicU64::new(0),
      connection: SubscriptionCell::new(),
      abandon_when_empty,
    }
  }

  pub(crate) fn has_observers(&self) -> bool { !self.state.lock().unwrap().observers.is_empty() }

  pub(crate) fn is_terminated(&self) -> bool { self.state.lock().unwrap().outcome.is_some() }

  /// Whether every observer left before an outcome was recorded.
  pub(crate) fn is_abandoned(&self) -> bool { self.state.lock().unwrap().abandoned }

  /// Whether the core terminated with an error.
  pub(crate) fn has_failed(&self) -> bool {
    matches!(self.state.lock().unwrap().outcome, Some(Notification::Error(_)))
  }

  fn leave(&self, id: u64) {
    let (removed, abandon) = {
      let mut state = self.state.lock().unwrap();
      let removed = state
        .observers
        .iter()
        .position(|(member, _)| *member == id)
        .map(|index| state.observers.remove(index));
      let abandon = removed.is_some()
        && self.abandon_when_empty
        && state.observers.is_empty()
        && state.outcome.is_none();
      if abandon {
        state.abandoned = true;
      }
      (removed, abandon)
    };
    drop(removed);
    if abandon {
      self.connection.unsubscribe();
    }
  }
}

impl<Item, Err> TerminalCore<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  /// Adds `observer`, or replays the outcome if there is one already.
  ///
  /// Gives the observer back when the core was abandoned.
  pub(crate) fn join(
    self: &Arc<Self>, ticket: &Ticket<Item, Err>, observer: BoxedMaybeObserver<Item, Err>,
  ) -> Result<(), BoxedMaybeObserver<Item, Err>> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    *ticket.member.lock().unwrap() = Some((self.clone(), id));

    let mut state = self.state.lock().unwrap();
    if ticket.closed.load(Ordering::SeqCst) {
      // The observer left before joining; an abandoning core with nobody
      // else on it has no one left to serve.
      let abandon = self.abandon_when_empty
        && !state.abandoned
        && state.observers.is_empty()
        && state.outcome.is_none();
      if abandon {
        state.abandoned = true;
      }
      drop(state);
      drop(observer);
      if abandon {
        self.connection.unsubscribe();
      }
      return Ok(());
    }
    if state.abandoned {
      drop(state);
      *ticket.member.lock().unwrap() = None;
      return Err(observer);
    }
    match state.outcome.clone() {
      Some(outcome) => {
        drop(state);
        outcome.deliver(observer);
      }
      None => state.observers.push((id, observer)),
    }
    Ok(())
  }

  /// Records the first outcome and delivers it to every current observer.
  ///
  /// Returns `false` if an outcome was already recorded.
  pub(crate) fn terminate(&self, outcome: Notification<Item, Err>) -> bool {
    let observers = {
      let mut state = self.state.lock().unwrap();
      if state.outcome.is_some() {
        return false;
      }
      state.outcome = Some(outcome.clone());
      std::mem::take(&mut state.observers)
    };
    for (_, observer) in observers {
      outcome.clone().deliver(observer);
    }
    true
  }
}

// ==================== Ticket ====================

/// The subscription an observer of a terminal core receives.
pub(crate) struct Ticket<Item, Err> {
  closed: AtomicBool,
  member: Mutex<Option<(Arc<TerminalCore<Item, Err>>, u64)>>,
}

impl<Item, Err> Ticket<Item, Err> {
  pub(crate) fn new() -> Self { Self { closed: AtomicBool::new(false), member: Mutex::new(None) } }
}

impl<Item: Send, Err: Send> Subscription for Ticket<Item, Err> {
  fn unsubscribe(&self) {
    if self.closed.swap(true, Ordering::SeqCst) {
      return;
    }
    let member = self.member.lock().unwrap().take();
    if let Some((core, id)) = member {
      core.leave(id);
    }
  }

  fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }
}

/// Subscribes `observer` to a core that is never abandoned: hands it a
/// [`Ticket`] first, then joins.
pub(crate) fn subscribe_core<Item, Err, O>(core: &Arc<TerminalCore<Item, Err>>, mut observer: O)
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
  O: MaybeObserver<Item, Err>,
{
  let ticket = Arc::new(Ticket::new());
  observer.on_subscribe(ticket.clone());
  // A plain core is never abandoned, so the observer always comes back `Ok`.
  let _ = core.join(&ticket, Box::new(observer));
}
