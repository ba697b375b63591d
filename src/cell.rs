//! Lock-free single-use cells.
//!
//! [`OnceSlot`] is the building block every racing operator uses to hand the
//! downstream observer (or a captured value) to exactly one winner. It is a
//! tiny state machine on an `AtomicU8`:
//!
//! ```text
//!   EMPTY --put--> WRITING --> FULL --take--> TAKEN
//!     \_____________________take______________/^
//! ```
//!
//! Taking an `EMPTY` slot closes it, so a late `put` hands the value back
//! instead of storing it. That is how a dispose that runs before the observer
//! is installed still wins.

use std::{
  cell::UnsafeCell,
  fmt,
  hint,
  sync::atomic::{AtomicU8, Ordering},
};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const FULL: u8 = 2;
const TAKEN: u8 = 3;

/// A cell that can be filled at most once and emptied at most once.
pub struct OnceSlot<T> {
  state: AtomicU8,
  value: UnsafeCell<Option<T>>,
}

// SAFETY: the value is only touched by the single thread that wins the
// `EMPTY -> WRITING` transition (writer) or the `FULL -> TAKEN` transition
// (reader); the state machine never lets both happen concurrently.
unsafe impl<T: Send> Send for OnceSlot<T> {}
unsafe impl<T: Send> Sync for OnceSlot<T> {}

impl<T> OnceSlot<T> {
  /// An unfilled slot.
  pub const fn empty() -> Self {
    Self { state: AtomicU8::new(EMPTY), value: UnsafeCell::new(None) }
  }

  /// A slot that already holds `value`.
  pub fn new(value: T) -> Self {
    Self { state: AtomicU8::new(FULL), value: UnsafeCell::new(Some(value)) }
  }

  /// Stores `value` if the slot was never filled nor closed.
  ///
  /// Gives the value back when the slot is not empty anymore.
  pub fn put(&self, value: T) -> Result<(), T> {
    match self.state.compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Acquire) {
      Ok(_) => {
        // SAFETY: we own the WRITING state, nobody else reads or writes.
        unsafe { *self.value.get() = Some(value) };
        self.state.store(FULL, Ordering::Release);
        Ok(())
      }
      Err(_) => Err(value),
    }
  }

  /// Takes the value out, closing the slot.
  ///
  /// Only the first caller across all threads can observe `Some`. Taking an
  /// empty slot closes it as well.
  pub fn take(&self) -> Option<T> {
    loop {
      match self.state.load(Ordering::Acquire) {
        FULL => {
          if self
            .state
            .compare_exchange(FULL, TAKEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
          {
            // SAFETY: we won FULL -> TAKEN, the writer has finished and no
            // other taker can get here.
            return unsafe { (*self.value.get()).take() };
          }
        }
        EMPTY => {
          if self
            .state
            .compare_exchange(EMPTY, TAKEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
          {
            return None;
          }
        }
        WRITING => hint::spin_loop(),
        _ => return None,
      }
    }
  }

  /// Takes the value only if it has been filled; an empty slot stays open.
  pub fn take_ready(&self) -> Option<T> {
    match self.state.compare_exchange(FULL, TAKEN, Ordering::AcqRel, Ordering::Acquire) {
      // SAFETY: same reasoning as `take`.
      Ok(_) => unsafe { (*self.value.get()).take() },
      Err(_) => None,
    }
  }

  /// Whether a value is sitting in the slot.
  pub fn is_ready(&self) -> bool { self.state.load(Ordering::Acquire) == FULL }

  /// Whether the slot has been taken or closed.
  pub fn is_closed(&self) -> bool { self.state.load(Ordering::Acquire) == TAKEN }
}

impl<T> Default for OnceSlot<T> {
  fn default() -> Self { Self::empty() }
}

impl<T> fmt::Debug for OnceSlot<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match self.state.load(Ordering::Acquire) {
      EMPTY => "empty",
      WRITING => "writing",
      FULL => "full",
      _ => "taken",
    };
    f.debug_struct("OnceSlot").field("state", &state).finish()
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      Arc, Barrier,
    },
    thread,
  };

  use super::*;

  #[rxsingle_macro::test]
  fn take_once() {
    let slot = OnceSlot::new(5);
    assert!(slot.is_ready());
    assert_eq!(slot.take(), Some(5));
    assert_eq!(slot.take(), None);
    assert!(slot.is_closed());
  }

  #[rxsingle_macro::test]
  fn closing_an_empty_slot_rejects_later_put() {
    let slot = OnceSlot::empty();
    assert_eq!(slot.take(), None);
    assert_eq!(slot.put(1), Err(1));
  }

  #[rxsingle_macro::test]
  fn take_ready_leaves_empty_slot_open() {
    let slot = OnceSlot::empty();
    assert_eq!(slot.take_ready(), None);
    assert!(slot.put("v").is_ok());
    assert_eq!(slot.take_ready(), Some("v"));
  }

  #[rxsingle_macro::test]
  fn only_one_thread_wins() {
    let slot = Arc::new(OnceSlot::new(()));
    let wins = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let (slot, wins, barrier) = (slot.clone(), wins.clone(), barrier.clone());
        thread::spawn(move || {
          barrier.wait();
          if slot.take().is_some() {
            wins.fetch_add(1, Ordering::SeqCst);
          }
        })
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }
    assert_eq!(wins.load(Ordering::SeqCst), 1);
  }
}
