//! Sortition sum tree: weighted index with O(log n) update and select
//!
//! # Layout
//!
//! A complete K-ary tree packed into one array. Node 0 is the root, the
//! children of node `i` are `K*i+1 ..= K*i+K`, the parent of `i` is `(i-1)/K`.
//! Every internal node holds the sum of its children, so the root holds the
//! total weight.
//!
//! ```text
//!                 [0] = 7
//!               /        \
//!         [1] = 5        [2] = 2 (b)
//!         /     \
//!   [3] = 4 (c) [4] = 1 (a)
//! ```
//!
//! Appending a leaf that would be the first child of an existing leaf turns
//! that leaf into a sum node: its key and weight move one slot further, next
//! to the new leaf. Leaves released by `set(key, 0)` go on a LIFO stack and
//! are reused before the array grows.
//!
//! # Selection
//!
//! `select(v)` walks down from the root. At each node it scans children left
//! to right, subtracting each child's weight until `v` falls inside one.
//! Ranges are half-open: a value equal to the sum of the preceding weights
//! belongs to the next key.

use crate::types::{Amount, LedgerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Range;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize",
    deserialize = "K: Deserialize<'de> + Eq + Hash"
))]
pub struct SortitionTree<K> {
    /// Branching factor (K)
    k: usize,
    /// Node values, root first
    nodes: Vec<Amount>,
    /// Vacated leaf slots, reused LIFO
    free: Vec<usize>,
    /// Leaf occupant per node (None for sum nodes and free slots)
    keys: Vec<Option<K>>,
    key_to_node: HashMap<K, usize>,
}

impl<K: Clone + Eq + Hash> SortitionTree<K> {
    pub fn new(k: usize) -> Result<Self, LedgerError> {
        if k < 2 {
            return Err(LedgerError::InvalidBranchingFactor(k));
        }
        Ok(Self {
            k,
            nodes: vec![0],
            free: Vec::new(),
            keys: vec![None],
            key_to_node: HashMap::new(),
        })
    }

    pub fn branching_factor(&self) -> usize {
        self.k
    }

    /// Total weight (root value)
    #[inline]
    pub fn total(&self) -> Amount {
        self.nodes[0]
    }

    /// Weight of `key`, 0 if absent
    pub fn stake_of(&self, key: &K) -> Amount {
        self.key_to_node
            .get(key)
            .map(|&index| self.nodes[index])
            .unwrap_or(0)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.key_to_node.contains_key(key)
    }

    /// Number of keys with positive weight
    pub fn len(&self) -> usize {
        self.key_to_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_node.is_empty()
    }

    /// Allocated nodes, including sum nodes and free slots
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, Amount)> + '_ {
        self.key_to_node
            .iter()
            .map(move |(key, &index)| (key, self.nodes[index]))
    }

    /// Insert, update or (with `weight == 0`) remove `key`
    ///
    /// Fails only with `Overflow`, in which case nothing changes.
    pub fn set(&mut self, key: K, weight: Amount) -> Result<(), LedgerError> {
        match self.key_to_node.get(&key).copied() {
            None => {
                if weight == 0 {
                    return Ok(());
                }
                self.nodes[0].checked_add(weight).ok_or(LedgerError::Overflow)?;

                let index = self.allocate_leaf();
                self.nodes[index] = weight;
                self.keys[index] = Some(key.clone());
                self.key_to_node.insert(key, index);
                self.propagate_add(index, weight);
            }
            Some(index) => {
                let old = self.nodes[index];
                if weight == 0 {
                    self.nodes[index] = 0;
                    self.keys[index] = None;
                    self.key_to_node.remove(&key);
                    self.free.push(index);
                    self.propagate_sub(index, old);
                } else if weight > old {
                    let delta = weight - old;
                    self.nodes[0].checked_add(delta).ok_or(LedgerError::Overflow)?;
                    self.nodes[index] = weight;
                    self.propagate_add(index, delta);
                } else if weight < old {
                    self.nodes[index] = weight;
                    self.propagate_sub(index, old - weight);
                }
            }
        }
        Ok(())
    }

    /// Key whose cumulative range `[before, before + weight)` contains `value`
    pub fn select(&self, value: Amount) -> Result<&K, LedgerError> {
        let total = self.total();
        if value >= total {
            return Err(LedgerError::DrawOutOfRange { value, total });
        }

        let mut index = 0usize;
        let mut remaining = value;

        while self.first_child(index) < self.nodes.len() {
            let first = self.first_child(index);
            let last = (first + self.k).min(self.nodes.len());
            let mut next = None;

            for child in first..last {
                let weight = self.nodes[child];
                if remaining >= weight {
                    remaining -= weight;
                } else {
                    next = Some(child);
                    break;
                }
            }

            index = next.ok_or(LedgerError::DrawOutOfRange { value, total })?;
        }

        self.keys[index]
            .as_ref()
            .ok_or(LedgerError::DrawOutOfRange { value, total })
    }

    /// Half-open cumulative range owned by `key`, None if absent
    pub fn range_of(&self, key: &K) -> Option<Range<Amount>> {
        let leaf = *self.key_to_node.get(key)?;
        let mut offset: Amount = 0;
        let mut index = leaf;

        while index != 0 {
            let parent = (index - 1) / self.k;
            let first = self.first_child(parent);
            offset += self.nodes[first..index].iter().sum::<Amount>();
            index = parent;
        }

        Some(offset..offset + self.nodes[leaf])
    }

    #[inline]
    fn first_child(&self, index: usize) -> usize {
        self.k * index + 1
    }

    fn allocate_leaf(&mut self) -> usize {
        if let Some(index) = self.free.pop() {
            return index;
        }

        let index = self.nodes.len();
        self.nodes.push(0);
        self.keys.push(None);

        // First child of a leaf: the leaf becomes a sum node and its
        // occupant moves to the sibling slot right after `index`.
        if index != 1 && (index - 1) % self.k == 0 {
            let parent = (index - 1) / self.k;
            let moved = index + 1;
            self.nodes.push(self.nodes[parent]);
            let occupant = self.keys[parent].take();
            if let Some(key) = &occupant {
                self.key_to_node.insert(key.clone(), moved);
            }
            self.keys.push(occupant);
        }

        index
    }

    fn propagate_add(&mut self, mut index: usize, delta: Amount) {
        while index != 0 {
            index = (index - 1) / self.k;
            self.nodes[index] += delta;
        }
    }

    fn propagate_sub(&mut self, mut index: usize, delta: Amount) {
        while index != 0 {
            index = (index - 1) / self.k;
            self.nodes[index] -= delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary() -> SortitionTree<&'static str> {
        SortitionTree::new(2).unwrap()
    }

    #[test]
    fn test_rejects_unary_tree() {
        assert_eq!(
            SortitionTree::<u32>::new(1).unwrap_err(),
            LedgerError::InvalidBranchingFactor(1)
        );
    }

    #[test]
    fn test_third_leaf_splits_first() {
        let mut tree = binary();
        tree.set("a", 1).unwrap();
        tree.set("b", 2).unwrap();
        tree.set("c", 4).unwrap();

        // c took slot 3, a moved to slot 4 under node 1
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.total(), 7);
        assert_eq!(tree.range_of(&"c"), Some(0..4));
        assert_eq!(tree.range_of(&"a"), Some(4..5));
        assert_eq!(tree.range_of(&"b"), Some(5..7));

        assert_eq!(*tree.select(0).unwrap(), "c");
        assert_eq!(*tree.select(3).unwrap(), "c");
        assert_eq!(*tree.select(4).unwrap(), "a");
        assert_eq!(*tree.select(5).unwrap(), "b");
        assert_eq!(*tree.select(6).unwrap(), "b");
    }

    #[test]
    fn test_released_slot_is_reused() {
        let mut tree = binary();
        tree.set("a", 1).unwrap();
        tree.set("b", 2).unwrap();
        tree.set("c", 4).unwrap();

        tree.set("a", 0).unwrap();
        assert!(!tree.contains(&"a"));
        assert_eq!(tree.total(), 6);

        tree.set("d", 3).unwrap();
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.range_of(&"d"), Some(4..7));
        assert_eq!(tree.range_of(&"b"), Some(7..9));
    }

    #[test]
    fn test_update_propagates_delta() {
        let mut tree = binary();
        tree.set("a", 10).unwrap();
        tree.set("a", 3).unwrap();
        assert_eq!(tree.total(), 3);
        tree.set("a", 30).unwrap();
        assert_eq!(tree.total(), 30);
        assert_eq!(tree.stake_of(&"a"), 30);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_zero_weight_for_absent_key_is_noop() {
        let mut tree = binary();
        tree.set("ghost", 0).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_overflow_leaves_tree_untouched() {
        let mut tree = binary();
        tree.set("a", Amount::MAX - 1).unwrap();
        assert_eq!(tree.set("b", 2), Err(LedgerError::Overflow));
        assert_eq!(tree.set("a", Amount::MAX), Ok(()));
        assert_eq!(tree.set("a", 5), Ok(()));
        assert!(!tree.contains(&"b"));
        assert_eq!(tree.total(), 5);
    }

    #[test]
    fn test_select_out_of_range() {
        let mut tree = binary();
        assert_eq!(
            tree.select(0).unwrap_err(),
            LedgerError::DrawOutOfRange { value: 0, total: 0 }
        );
        tree.set("a", 5).unwrap();
        assert!(tree.select(5).is_err());
    }

    #[test]
    fn test_wide_tree_keeps_insertion_order() {
        let mut tree: SortitionTree<u32> = SortitionTree::new(10).unwrap();
        for key in 0..10u32 {
            tree.set(key, 10).unwrap();
        }
        for key in 0..10u32 {
            let start = key as Amount * 10;
            assert_eq!(tree.range_of(&key), Some(start..start + 10));
        }
    }
}
