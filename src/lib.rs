//! # rxsingle: single-shot reactive contracts for Rust
//!
//! Three asynchronous contracts, each delivering at most one terminal signal:
//!
//! | Contract | Signals |
//! |----------|---------|
//! | [`single`] | exactly one of `on_success(value)` / `on_error(err)` |
//! | [`maybe`] | one of `on_success(value)` / `on_complete()` / `on_error(err)` |
//! | [`completable`] | one of `on_complete()` / `on_error(err)` |
//!
//! An unbounded [`observable`] contract sits next to them for conversions,
//! repetition and the stable `order_by` engine.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxsingle::prelude::*;
//!
//! let value = single::just::<_, ()>(20)
//!   .flat_map(|a| single::just(a + 22))
//!   .map(|v| v.to_string())
//!   .blocking_get();
//! assert_eq!(value, Ok("42".to_string()));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SingleSource`] / [`MaybeSource`] / [`CompletableSource`] | The contracts |
//! | [`observer`] | Consumers; terminal methods take `self` |
//! | [`Subscription`] | Idempotent, thread-safe cancellation handle |
//! | [`Scheduler`] | Where delayed and thread-hopping work runs |
//!
//! Every operator is safe to drive from several threads at once: a terminal
//! signal reaches the downstream at most once, and no signal follows a
//! dispose.
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): `ThreadPoolScheduler` on a `futures`
//!   thread pool.
//! - **`tokio-scheduler`**: `TokioScheduler` on a tokio runtime handle.
//!
//! [`SingleSource`]: single::SingleSource
//! [`MaybeSource`]: maybe::MaybeSource
//! [`CompletableSource`]: completable::CompletableSource
//! [`Subscription`]: subscription::Subscription
//! [`Scheduler`]: scheduler::Scheduler

pub mod adapter;
mod cell;
pub mod completable;
pub mod emitter;
pub mod error;
pub mod factory;
pub mod maybe;
pub mod notification;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod scheduler;
pub mod single;
pub mod subject;
pub mod subscription;

#[cfg(test)]
mod test_util;

pub use prelude::*;

#[cfg(doctest)]
mod readme {
  #![doc = include_str!("../README.md")]
}
