//! Binary min-heap driven by a fallible comparator.
//!
//! `std::collections::BinaryHeap` needs a total, infallible `Ord`; the
//! ordering engine compares with user callbacks that may fail, so it keeps
//! its own heap. Entries are `(insertion_index, value)` and ties on the
//! comparator fall back to the index, which makes the pop order stable.

use std::cmp::Ordering;

pub(crate) struct MergeHeap<T> {
  entries: Vec<(u64, T)>,
}

impl<T> MergeHeap<T> {
  /// Builds the heap bottom-up in O(n).
  pub(crate) fn heapify<C, Err>(entries: Vec<(u64, T)>, compare: &C) -> Result<Self, Err>
  where
    C: Fn(&T, &T) -> Result<Ordering, Err> + ?Sized,
  {
    let mut heap = Self { entries };
    for i in (0..heap.entries.len() / 2).rev() {
      heap.sift_down(i, compare)?;
    }
    Ok(heap)
  }

  /// Removes the minimum. The heap is restored before returning, so a
  /// comparator failure surfaces here rather than on the next pop.
  pub(crate) fn pop<C, Err>(&mut self, compare: &C) -> Result<Option<T>, Err>
  where
    C: Fn(&T, &T) -> Result<Ordering, Err> + ?Sized,
  {
    if self.entries.is_empty() {
      return Ok(None);
    }
    let last = self.entries.len() - 1;
    self.entries.swap(0, last);
    let min = self.entries.pop().map(|(_, value)| value);
    if !self.entries.is_empty() {
      self.sift_down(0, compare)?;
    }
    Ok(min)
  }

  pub(crate) fn len(&self) -> usize { self.entries.len() }

  fn less<C, Err>(a: &(u64, T), b: &(u64, T), compare: &C) -> Result<bool, Err>
  where
    C: Fn(&T, &T) -> Result<Ordering, Err> + ?Sized,
  {
    Ok(match compare(&a.1, &b.1)? {
      Ordering::Equal => a.0 < b.0,
      ord => ord == Ordering::Less,
    })
  }

  fn sift_down<C, Err>(&mut self, mut i: usize, compare: &C) -> Result<(), Err>
  where
    C: Fn(&T, &T) -> Result<Ordering, Err> + ?Sized,
  {
    let len = self.entries.len();
    loop {
      let left = 2 * i + 1;
      if left >= len {
        return Ok(());
      }
      let right = left + 1;
      let mut smallest = i;
      if Self::less(&self.entries[left], &self.entries[smallest], compare)? {
        smallest = left;
      }
      if right < len && Self::less(&self.entries[right], &self.entries[smallest], compare)? {
        smallest = right;
      }
      if smallest == i {
        return Ok(());
      }
      self.entries.swap(i, smallest);
      i = smallest;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn natural(a: &i32, b: &i32) -> Result<Ordering, ()> { Ok(a.cmp(b)) }

  fn drain(mut heap: MergeHeap<i32>) -> Vec<i32> {
    let mut out = Vec::new();
    while let Ok(Some(v)) = heap.pop(&natural) {
      out.push(v);
    }
    out
  }

  #[rxsingle_macro::test]
  fn pops_in_ascending_order() {
    let input = vec![5, 3, 9, 1, 1, 7, 0, 4];
    let entries = input.into_iter().enumerate().map(|(i, v)| (i as u64, v)).collect();
    let heap = MergeHeap::heapify(entries, &natural).unwrap();
    assert_eq!(heap.len(), 8);
    assert_eq!(drain(heap), vec![0, 1, 1, 3, 4, 5, 7, 9]);
  }

  #[rxsingle_macro::test]
  fn ties_pop_by_insertion_index() {
    let by_tens = |a: &(i32, char), b: &(i32, char)| -> Result<Ordering, ()> {
      Ok((a.0 / 10).cmp(&(b.0 / 10)))
    };
    let input = vec![(15, 'a'), (3, 'b'), (11, 'c'), (7, 'd'), (19, 'e')];
    let entries = input.into_iter().enumerate().map(|(i, v)| (i as u64, v)).collect();
    let mut heap = MergeHeap::heapify(entries, &by_tens).unwrap();
    let mut out = Vec::new();
    while let Ok(Some((_, tag))) = heap.pop(&by_tens) {
      out.push(tag);
    }
    assert_eq!(out, vec!['b', 'd', 'a', 'c', 'e']);
  }

  #[rxsingle_macro::test]
  fn heapify_reports_the_comparator_error() {
    let failing = |_: &i32, _: &i32| -> Result<Ordering, &str> { Err("cmp") };
    let entries = vec![(0, 2), (1, 1)];
    assert_eq!(MergeHeap::heapify(entries, &failing).err(), Some("cmp"));
  }

  #[rxsingle_macro::test]
  fn empty_heap_pops_nothing() {
    let mut heap = MergeHeap::heapify(Vec::new(), &natural).unwrap();
    assert_eq!(heap.pop(&natural), Ok(None));
  }
}
