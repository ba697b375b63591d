//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Contract modules, so factories read as `single::just(..)`
pub use crate::{completable, maybe, observable, single};
// Core traits
pub use crate::{
  completable::{CompletableExt, CompletableSource},
  maybe::{MaybeExt, MaybeSource},
  observable::{ObservableExt, ObservableSource},
  single::{SingleExt, SingleSource},
};
// Observer traits
pub use crate::observer::{
  BoxedCompletableObserver, BoxedMaybeObserver, BoxedObserver, BoxedSingleObserver,
  CompletableObserver, MaybeObserver, Observer, SingleObserver,
};
// Boxed sources
pub use crate::ops::box_it::{BoxedCompletable, BoxedMaybe, BoxedObservable, BoxedSingle};
// Emitters
pub use crate::{
  emitter::{CompletableEmitter, MaybeEmitter, SingleEmitter},
  observable::ObservableEmitter,
};
// Errors and retry
pub use crate::{
  error::{CompositeError, NoSuchElementError, TimeoutError},
  notification::Notification,
  ops::{
    order_by::OrderBy,
    retry::{RetryConfig, RetryPolicy},
    timeout::TimeoutFailure,
  },
};
// Schedulers
pub use crate::scheduler::{
  Duration, Instant, NewThreadScheduler, Scheduler, Task, TaskHandle, TestScheduler,
};
#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
// Subjects
pub use crate::subject::{CompletableSubject, MaybeSubject, PublishSubject, SingleSubject};
// Subscription
pub use crate::subscription::{
  disposed, BooleanSubscription, BoxedSubscription, FnSubscription, Subscription,
  SubscriptionCell, SubscriptionList,
};
