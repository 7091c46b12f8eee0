use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Bijection between external ids and dense positions `0..len`.
///
/// Positions follow insertion order. Serialized as the plain id list; the
/// reverse lookup is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    from = "Vec<Id>",
    into = "Vec<Id>",
    bound(
        serialize = "Id: Serialize + Clone",
        deserialize = "Id: Deserialize<'de> + Eq + Hash + Copy"
    )
)]
pub struct IdIndex<Id> {
    ids: Vec<Id>,
    positions: HashMap<Id, usize>,
}

impl<Id: Eq + Hash + Copy> IdIndex<Id> {
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Position of `id`, assigning the next free one on first sight.
    pub fn get_or_insert(&mut self, id: Id) -> usize {
        if let Some(&pos) = self.positions.get(&id) {
            return pos;
        }
        let pos = self.ids.len();
        self.ids.push(id);
        self.positions.insert(id, pos);
        pos
    }

    pub fn position(&self, id: &Id) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id_at(&self, pos: usize) -> Option<Id> {
        self.ids.get(pos).copied()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.positions.contains_key(id)
    }

    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<Id: Eq + Hash + Copy> Default for IdIndex<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Eq + Hash + Copy> PartialEq for IdIndex<Id> {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl<Id: Eq + Hash + Copy> From<Vec<Id>> for IdIndex<Id> {
    fn from(ids: Vec<Id>) -> Self {
        let mut index = IdIndex::new();
        for id in ids {
            index.get_or_insert(id);
        }
        index
    }
}

impl<Id> From<IdIndex<Id>> for Vec<Id> {
    fn from(index: IdIndex<Id>) -> Self {
        index.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_appearance_order() {
        let mut index = IdIndex::new();
        assert_eq!(index.get_or_insert(42i64), 0);
        assert_eq!(index.get_or_insert(7), 1);
        assert_eq!(index.get_or_insert(42), 0);
        assert_eq!(index.ids(), &[42, 7]);
        assert_eq!(index.position(&7), Some(1));
        assert_eq!(index.id_at(1), Some(7));
        assert_eq!(index.position(&99), None);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_lookup() {
        let index: IdIndex<i64> = vec![5, 3, 9].into();
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, "[5,3,9]");
        let back: IdIndex<i64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
        assert_eq!(back.position(&9), Some(2));
    }
}
