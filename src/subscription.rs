//! Subscriptions: the cancellation handles handed to observers.
//!
//! Every handle here is idempotent and thread-safe. `unsubscribe` may be
//! called any number of times from any thread; the underlying cancel action
//! runs at most once.

use std::{
  fmt,
  ptr,
  sync::{
    atomic::{AtomicBool, AtomicPtr, Ordering},
    Arc,
  },
};

use once_cell::sync::Lazy;
use tracing::warn;

use crate::cell::OnceSlot;

// ==================== Subscription Trait ====================

/// A handle that cancels the work behind a subscription.
pub trait Subscription: Send + Sync {
  /// Cancels the subscription. Calling it again has no effect.
  fn unsubscribe(&self);

  /// Whether this handle has been cancelled or has nothing left to cancel.
  fn is_closed(&self) -> bool;
}

/// Type-erased, shareable subscription.
pub type BoxedSubscription = Arc<dyn Subscription>;

impl<T: Subscription + ?Sized> Subscription for Arc<T> {
  #[inline]
  fn unsubscribe(&self) { (**self).unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

impl<T: Subscription + ?Sized> Subscription for Box<T> {
  #[inline]
  fn unsubscribe(&self) { (**self).unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

/// A handle with nothing to cancel, already closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disposed;

impl Subscription for Disposed {
  fn unsubscribe(&self) {}

  fn is_closed(&self) -> bool { true }
}

static DISPOSED: Lazy<BoxedSubscription> = Lazy::new(|| Arc::new(Disposed));

/// The shared, already-closed subscription handed out by sources that finish
/// synchronously.
pub fn disposed() -> BoxedSubscription { DISPOSED.clone() }

/// A live handle that only records whether it was cancelled.
#[derive(Debug, Default)]
pub struct BooleanSubscription(AtomicBool);

impl BooleanSubscription {
  pub fn new() -> Self { Self::default() }
}

impl Subscription for BooleanSubscription {
  fn unsubscribe(&self) { self.0.store(true, Ordering::Release); }

  fn is_closed(&self) -> bool { self.0.load(Ordering::Acquire) }
}

// ==================== FnSubscription ====================

/// Runs a cancel action at most once.
///
/// ```rust
/// use std::sync::{
///   atomic::{AtomicUsize, Ordering},
///   Arc,
/// };
///
/// use rxsingle::prelude::*;
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let c_runs = runs.clone();
/// let sub = FnSubscription::new(move || {
///   c_runs.fetch_add(1, Ordering::SeqCst);
/// });
/// sub.unsubscribe();
/// sub.unsubscribe();
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
pub struct FnSubscription<F> {
  action: OnceSlot<F>,
}

impl<F> FnSubscription<F>
where
  F: FnOnce() + Send,
{
  pub fn new(action: F) -> Self { Self { action: OnceSlot::new(action) } }
}

impl<F> Subscription for FnSubscription<F>
where
  F: FnOnce() + Send,
{
  fn unsubscribe(&self) {
    if let Some(action) = self.action.take() {
      action();
    }
  }

  fn is_closed(&self) -> bool { self.action.is_closed() }
}

// ==================== SubscriptionCell ====================

// The address of this static is the "disposed" tag. It is never dereferenced.
static DISPOSED_TAG: u8 = 0;

#[inline]
fn disposed_tag() -> *mut BoxedSubscription {
  &DISPOSED_TAG as *const u8 as *mut BoxedSubscription
}

/// Atomic single-assignment holder for an upstream subscription.
///
/// The slot is a tagged pointer: null means unset, the address of a private
/// static means disposed, anything else is a boxed handle owned by the cell.
/// Every transition is a compare-and-swap and the only thread that ever
/// dereferences a handle pointer is the one that swapped it out.
pub struct SubscriptionCell {
  slot: AtomicPtr<BoxedSubscription>,
}

impl SubscriptionCell {
  pub const fn new() -> Self { Self { slot: AtomicPtr::new(ptr::null_mut()) } }

  /// Stores `subscription` if nothing was stored before.
  ///
  /// When the cell is already disposed the incoming handle is cancelled on
  /// the spot. A second assignment to a live cell is a protocol violation: it
  /// is logged and the incoming handle is cancelled too.
  pub fn try_set(&self, subscription: BoxedSubscription) -> bool {
    let raw = Box::into_raw(Box::new(subscription));
    match self
      .slot
      .compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
    {
      Ok(_) => true,
      Err(current) => {
        // SAFETY: `raw` was never published.
        let rejected = unsafe { Box::from_raw(raw) };
        if current != disposed_tag() {
          warn!("subscription already set, cancelling the newcomer");
        }
        rejected.unsubscribe();
        false
      }
    }
  }

  /// Swaps in `subscription`, dropping (not cancelling) the previous one.
  ///
  /// Used by operators that move from one inner source to the next. Fails,
  /// cancelling the newcomer, once the cell is disposed.
  pub fn replace(&self, subscription: BoxedSubscription) -> bool {
    let raw = Box::into_raw(Box::new(subscription));
    let mut current = self.slot.load(Ordering::Acquire);
    loop {
      if current == disposed_tag() {
        // SAFETY: `raw` was never published.
        unsafe { Box::from_raw(raw) }.unsubscribe();
        return false;
      }
      match self.slot.compare_exchange_weak(current, raw, Ordering::AcqRel, Ordering::Acquire) {
        Ok(previous) => {
          if !previous.is_null() {
            // SAFETY: we swapped `previous` out, so we own it now.
            drop(unsafe { Box::from_raw(previous) });
          }
          return true;
        }
        Err(actual) => current = actual,
      }
    }
  }

  /// Moves to the disposed state *without* cancelling the held handle.
  ///
  /// Used after a terminal signal to drop the upstream reference.
  pub fn detach(&self) {
    let previous = self.slot.swap(disposed_tag(), Ordering::AcqRel);
    if !previous.is_null() && previous != disposed_tag() {
      // SAFETY: we swapped `previous` out, so we own it now.
      drop(unsafe { Box::from_raw(previous) });
    }
  }
}

impl Subscription for SubscriptionCell {
  fn unsubscribe(&self) {
    let previous = self.slot.swap(disposed_tag(), Ordering::AcqRel);
    if !previous.is_null() && previous != disposed_tag() {
      // SAFETY: we swapped `previous` out, so we own it now. The tag is
      // already in place, so a re-entrant unsubscribe from inside the cancel
      // action finds nothing to do.
      unsafe { Box::from_raw(previous) }.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.slot.load(Ordering::Acquire) == disposed_tag() }
}

impl Default for SubscriptionCell {
  fn default() -> Self { Self::new() }
}

impl Drop for SubscriptionCell {
  fn drop(&mut self) {
    let current = *self.slot.get_mut();
    if !current.is_null() && current != disposed_tag() {
      // SAFETY: `&mut self` means nobody else can observe the pointer.
      drop(unsafe { Box::from_raw(current) });
    }
  }
}

impl fmt::Debug for SubscriptionCell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let current = self.slot.load(Ordering::Acquire);
    let state = if current.is_null() {
      "unset"
    } else if current == disposed_tag() {
      "disposed"
    } else {
      "set"
    };
    f.debug_struct("SubscriptionCell").field("state", &state).finish()
  }
}

// ==================== SubscriptionList ====================

/// A fixed number of cells cancelled together, one per inner source.
///
/// Multi-source operators (`amb`, `zip`, `concat_eager`) know how many
/// sources they have at subscribe time, so no growable list is needed.
#[derive(Debug)]
pub struct SubscriptionList {
  cells: Box<[SubscriptionCell]>,
}

impl SubscriptionList {
  pub fn new(len: usize) -> Self {
    Self { cells: (0..len).map(|_| SubscriptionCell::new()).collect() }
  }

  pub fn get(&self, index: usize) -> &SubscriptionCell { &self.cells[index] }

  pub fn len(&self) -> usize { self.cells.len() }

  pub fn is_empty(&self) -> bool { self.cells.is_empty() }

  /// Cancels every cell except `keep`.
  pub fn unsubscribe_except(&self, keep: usize) {
    for (i, cell) in self.cells.iter().enumerate() {
      if i != keep {
        cell.unsubscribe();
      }
    }
  }
}

impl Subscription for SubscriptionList {
  fn unsubscribe(&self) {
    for cell in self.cells.iter() {
      cell.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.cells.iter().all(SubscriptionCell::is_closed) }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{atomic::AtomicUsize, Barrier},
    thread,
  };

  use super::*;

  fn counting() -> (BoxedSubscription, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let c_runs = runs.clone();
    let sub = FnSubscription::new(move || {
      c_runs.fetch_add(1, Ordering::SeqCst);
    });
    (Arc::new(sub), runs)
  }

  #[rxsingle_macro::test]
  fn dispose_runs_cancel_once() {
    let cell = SubscriptionCell::new();
    let (sub, runs) = counting();
    assert!(cell.try_set(sub));
    cell.unsubscribe();
    cell.unsubscribe();
    assert!(cell.is_closed());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[rxsingle_macro::test]
  fn set_after_dispose_cancels_newcomer() {
    let cell = SubscriptionCell::new();
    cell.unsubscribe();
    let (sub, runs) = counting();
    assert!(!cell.try_set(sub));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[rxsingle_macro::test]
  fn second_set_is_rejected() {
    let cell = SubscriptionCell::new();
    let (first, first_runs) = counting();
    let (second, second_runs) = counting();
    assert!(cell.try_set(first));
    assert!(!cell.try_set(second));
    assert_eq!(second_runs.load(Ordering::SeqCst), 1);
    assert_eq!(first_runs.load(Ordering::SeqCst), 0);
  }

  #[rxsingle_macro::test]
  fn replace_drops_without_cancelling() {
    let cell = SubscriptionCell::new();
    let (first, first_runs) = counting();
    let (second, second_runs) = counting();
    assert!(cell.replace(first));
    assert!(cell.replace(second));
    assert_eq!(first_runs.load(Ordering::SeqCst), 0);
    cell.unsubscribe();
    assert_eq!(second_runs.load(Ordering::SeqCst), 1);
  }

  #[rxsingle_macro::test]
  fn detach_never_cancels() {
    let cell = SubscriptionCell::new();
    let (sub, runs) = counting();
    cell.try_set(sub);
    cell.detach();
    cell.unsubscribe();
    assert!(cell.is_closed());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
  }

  #[rxsingle_macro::test]
  fn concurrent_set_and_dispose_cancel_at_most_once() {
    for _ in 0..200 {
      let cell = Arc::new(SubscriptionCell::new());
      let (sub, runs) = counting();
      let barrier = Arc::new(Barrier::new(3));
      let setter = {
        let (cell, barrier) = (cell.clone(), barrier.clone());
        thread::spawn(move || {
          barrier.wait();
          cell.try_set(sub);
        })
      };
      let disposers: Vec<_> = (0..2)
        .map(|_| {
          let (cell, barrier) = (cell.clone(), barrier.clone());
          thread::spawn(move || {
            barrier.wait();
            cell.unsubscribe();
          })
        })
        .collect();
      setter.join().unwrap();
      for d in disposers {
        d.join().unwrap();
      }
      assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
  }

  #[rxsingle_macro::test]
  fn list_cancels_all_but_winner() {
    let list = SubscriptionList::new(3);
    let subs: Vec<_> = (0..3).map(|_| counting()).collect();
    for (i, (sub, _)) in subs.iter().enumerate() {
      list.get(i).try_set(sub.clone());
    }
    list.unsubscribe_except(1);
    let runs: Vec<_> = subs.iter().map(|(_, r)| r.load(Ordering::SeqCst)).collect();
    assert_eq!(runs, vec![1, 0, 1]);
  }
}
