//! A one-to-one map with lookup in both directions.

use std::collections::HashMap;
use std::collections::hash_map::Iter;
use std::hash::Hash;

use crate::RelationError;

/// A bijection between `L` and `R`.
///
/// Each left value maps to exactly one right value and vice versa.
/// Inserting a pair that would break this fails instead of overwriting.
#[derive(Debug, Clone)]
pub struct BiMap<L, R> {
    forward: HashMap<L, R>,
    reverse: HashMap<R, L>,
}

impl<L, R> Default for BiMap<L, R> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }
}

impl<L, R> BiMap<L, R>
where
    L: Copy + Eq + Hash,
    R: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the pair `left <-> right`.
    ///
    /// # Errors
    /// [`RelationError::DuplicateElement`] if either side is already mapped.
    pub fn insert(&mut self, left: L, right: R) -> Result<(), RelationError> {
        if self.forward.contains_key(&left) || self.reverse.contains_key(&right) {
            return Err(RelationError::DuplicateElement);
        }
        self.forward.insert(left, right);
        self.reverse.insert(right, left);
        Ok(())
    }

    pub fn get(&self, left: &L) -> Option<R> {
        self.forward.get(left).copied()
    }

    pub fn get_reverse(&self, right: &R) -> Option<L> {
        self.reverse.get(right).copied()
    }

    /// Removes the pair containing `left`, returning its right side.
    pub fn remove(&mut self, left: &L) -> Option<R> {
        let right = self.forward.remove(left)?;
        self.reverse.remove(&right);
        Some(right)
    }

    /// Removes the pair containing `right`, returning its left side.
    pub fn remove_reverse(&mut self, right: &R) -> Option<L> {
        let left = self.reverse.remove(right)?;
        self.forward.remove(&left);
        Some(left)
    }

    pub fn contains_left(&self, left: &L) -> bool {
        self.forward.contains_key(left)
    }

    pub fn contains_right(&self, right: &R) -> bool {
        self.reverse.contains_key(right)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Iterates over `(left, right)` pairs in arbitrary order.
    pub fn iter(&self) -> Iter<'_, L, R> {
        self.forward.iter()
    }
}
