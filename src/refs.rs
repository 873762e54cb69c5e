//! Append-only store backing mutable reference cells.

use crate::ast::{RefIndex, Value};

/// Slots allocated by `ref`. Indices are handed out in increasing order and never reused.
#[derive(Clone, Default, PartialEq)]
pub struct RefStore {
    slots: Vec<Value>,
}

impl RefStore {
    pub fn new() -> Self {
        RefStore { slots: Vec::new() }
    }

    /// Store `value` in the next unused slot and return its index
    pub fn insert(&mut self, value: Value) -> RefIndex {
        self.slots.push(value);
        self.slots.len() - 1
    }

    pub fn get(&self, ix: RefIndex) -> Option<&Value> {
        self.slots.get(ix)
    }

    /// Overwrite an allocated slot, returning the previous value.
    /// `None` means `ix` was never allocated and nothing was written.
    pub fn set(&mut self, ix: RefIndex, value: Value) -> Option<Value> {
        self.slots
            .get_mut(ix)
            .map(|slot| std::mem::replace(slot, value))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Allocated slots in index order
    pub fn iter(&self) -> impl Iterator<Item = (RefIndex, &Value)> {
        self.slots.iter().enumerate()
    }
}

impl FromIterator<Value> for RefStore {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        RefStore {
            slots: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::val;

    #[test]
    fn test_indices_are_monotonic() {
        let mut store = RefStore::new();
        let a = store.insert(val(1));
        let b = store.insert(val(2));
        assert!(b > a);

        assert_eq!(store.set(a, val(10)), Some(val(1)));
        let c = store.insert(val(3));
        assert!(c > b);
        assert_eq!(store.get(a), Some(&val(10)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_unallocated_slots() {
        let mut store = RefStore::new();
        assert_eq!(store.get(0), None);
        assert_eq!(store.set(0, val(1)), None);
        assert!(store.is_empty());
    }
}
