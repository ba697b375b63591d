//! Operator implementations, one file per operator.
//!
//! Single-shot operators are written once against [`MaybeSource`]; Single and
//! Completable reach them through the adapters in [`crate::adapter`].
//! Multi-value operators (`stream`, `take`, `ignore_elements`, `order_by`)
//! work on [`ObservableSource`].
//!
//! [`MaybeSource`]: crate::maybe::MaybeSource
//! [`ObservableSource`]: crate::observable::ObservableSource

pub mod amb;
pub(crate) mod blocking;
pub mod box_it;
pub mod cache;
pub mod concat;
pub mod concat_eager;
pub mod delay;
pub mod flat_map;
pub mod ignore_elements;
pub mod map;
mod merge_heap;
pub mod observe_on;
pub mod on_error;
pub mod on_terminate_detach;
pub mod order_by;
pub mod repeat;
pub mod retry;
pub mod stream;
pub mod subscribe_on;
pub mod take;
pub mod take_until;
pub mod timeout;
pub mod to_observable;
pub mod unsubscribe_on;
pub mod zip;
