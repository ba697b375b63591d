use crate::{
  completable::CompletableSource,
  observable::ObservableSource,
  observer::{CompletableObserver, Observer},
  subscription::BoxedSubscription,
};

/// Drops every item of a stream and keeps its terminal signal.
#[derive(Clone)]
pub struct IgnoreElements<S>(S);

impl<S> IgnoreElements<S> {
  pub(crate) fn new(source: S) -> Self { Self(source) }
}

impl<S: ObservableSource> CompletableSource for IgnoreElements<S> {
  type Err = S::Err;

  fn actual_subscribe<O>(&self, observer: O)
  where
    O: CompletableObserver<Self::Err>,
  {
    self.0.actual_subscribe(IgnoreElementsObserver(observer))
  }
}

pub struct IgnoreElementsObserver<O>(O);

impl<Item, Err, O: CompletableObserver<Err>> Observer<Item, Err> for IgnoreElementsObserver<O> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) { self.0.on_subscribe(subscription) }

  fn on_next(&mut self, _: Item) {}

  fn on_complete(self) { self.0.on_complete() }

  fn on_error(self, err: Err) { self.0.on_error(err) }
}
