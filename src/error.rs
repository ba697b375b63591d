//! Error kinds the operators create on their own.
//!
//! Sources carry their own `Err` type. Operators that need to *manufacture* an
//! error (a timeout, an aggregate of delayed errors, a missing value) ask for
//! `Err: From<...>` of one of the types below, and only on the method that
//! builds them.

use std::fmt;

use smallvec::SmallVec;
use thiserror::Error;

use crate::scheduler::Duration;

/// No terminal signal arrived within the configured bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no terminal signal within {bound:?}")]
pub struct TimeoutError {
  /// The bound that elapsed.
  pub bound: Duration,
}

/// A value was required but the source completed empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("the source completed without a value")]
pub struct NoSuchElementError;

/// Several errors collected by a `delay_errors` operator.
///
/// The errors are kept in the order their sources terminated. An operator
/// with a single collected error reports that error as-is and never wraps it.
#[derive(Clone, PartialEq, Eq)]
pub struct CompositeError<E> {
  errors: SmallVec<[E; 2]>,
}

impl<E> CompositeError<E> {
  pub fn new(errors: impl IntoIterator<Item = E>) -> Self {
    Self { errors: errors.into_iter().collect() }
  }

  pub fn errors(&self) -> &[E] { &self.errors }

  pub fn into_errors(self) -> Vec<E> { self.errors.into_vec() }

  pub fn len(&self) -> usize { self.errors.len() }

  pub fn is_empty(&self) -> bool { self.errors.is_empty() }
}

impl<E: fmt::Debug> fmt::Debug for CompositeError<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.errors.iter()).finish()
  }
}

impl<E: fmt::Debug> fmt::Display for CompositeError<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} errors occurred: ", self.errors.len())?;
    for (i, err) in self.errors.iter().enumerate() {
      if i > 0 {
        f.write_str("; ")?;
      }
      write!(f, "{err:?}")?;
    }
    Ok(())
  }
}

impl<E: fmt::Debug> std::error::Error for CompositeError<E> {}

/// Folds the errors collected in delay-errors mode into the one terminal
/// error: `None` when there were none, the error itself when there was one,
/// and the `combine`d aggregate otherwise.
pub(crate) fn fold_errors<E>(
  mut errors: Vec<E>, combine: fn(CompositeError<E>) -> E,
) -> Option<E> {
  match errors.len() {
    0 => None,
    1 => errors.pop(),
    _ => Some(combine(CompositeError::new(errors))),
  }
}
