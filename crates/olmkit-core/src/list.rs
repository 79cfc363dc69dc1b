//! Fixed-capacity list with newest-first ordering
//!
//! Receiver chains, skipped message keys and one-time keys all live in
//! lists whose capacity bounds how much state an attacker can make us keep.
//! New entries go to the front; when the list is full the entry at the back
//! (the oldest) is evicted.

use std::collections::{VecDeque, vec_deque};

use olmkit_proto::{Pickle, PickleError, PickleReader, PickleWriter, Unpickle};

/// Ordered list holding at most `N` entries, newest first.
///
/// # Invariants
///
/// - `len() <= N` at all times
/// - Index 0 is the most recently inserted entry still present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedList<T, const N: usize> {
    items: VecDeque<T>,
}

impl<T, const N: usize> BoundedList<T, N> {
    /// Maximum number of entries
    pub const CAPACITY: usize = N;

    /// Empty list.
    pub fn new() -> Self {
        Self { items: VecDeque::with_capacity(N) }
    }

    /// Insert at the front, returning the evicted oldest entry if the list
    /// was full.
    pub fn insert_front(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == N { self.items.pop_back() } else { None };
        self.items.push_front(item);
        evicted
    }

    /// Remove and return the entry at `index`.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.items.remove(index)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Newest entry.
    pub fn first(&self) -> Option<&T> {
        self.items.front()
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Mutable entry at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Index of the first entry matching `predicate`.
    pub fn position(&self, predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.iter().position(predicate)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entries from newest to oldest.
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    /// Mutable entries from newest to oldest.
    pub fn iter_mut(&mut self) -> vec_deque::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

impl<T, const N: usize> Default for BoundedList<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a BoundedList<T, N> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// `u32` count followed by the entries, newest first.
impl<T: Pickle, const N: usize> Pickle for BoundedList<T, N> {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_list(self.items.iter());
    }
}

impl<T: Unpickle, const N: usize> Unpickle for BoundedList<T, N> {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        let items = reader.read_list(N)?;
        Ok(Self { items: items.into() })
    }
}
