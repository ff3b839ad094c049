//! Id-keyed, insertion-ordered hazard collection.
//!
//! A `HazardSet` never holds two records with the same id. Inserting an id
//! that is already present replaces the stored record.

use std::collections::{HashMap, VecDeque};

use super::hazard::{HazardId, HazardRecord};

#[derive(Debug, Clone, Default)]
pub struct HazardSet {
    order: VecDeque<HazardId>,
    records: HashMap<HazardId, HazardRecord>,
}

impl HazardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from records in order. A repeated id keeps the position of
    /// its first occurrence and the value of its last.
    pub fn from_records(records: impl IntoIterator<Item = HazardRecord>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.push_back(record);
        }
        set
    }

    /// Insert at the end, or replace in place if the id exists.
    pub fn push_back(&mut self, record: HazardRecord) {
        if !self.records.contains_key(&record.id) {
            self.order.push_back(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
    }

    /// Insert at the front, moving an existing record with the same id.
    pub fn push_front(&mut self, record: HazardRecord) {
        if self.records.contains_key(&record.id) {
            self.order.retain(|id| id != &record.id);
        }
        self.order.push_front(record.id.clone());
        self.records.insert(record.id.clone(), record);
    }

    pub fn remove(&mut self, id: &HazardId) -> Option<HazardRecord> {
        let removed = self.records.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn get(&self, id: &HazardId) -> Option<&HazardRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &HazardId) -> Option<&mut HazardRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &HazardId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &HazardRecord> + '_ {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Owned copy of the records in order.
    pub fn to_vec(&self) -> Vec<HazardRecord> {
        self.iter().cloned().collect()
    }
}

impl FromIterator<HazardRecord> for HazardSet {
    fn from_iter<I: IntoIterator<Item = HazardRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::models::{HazardType, Severity};
    use chrono::Utc;

    fn hazard(id: &str) -> HazardRecord {
        HazardRecord::new(
            id,
            HazardType::Pothole,
            Coordinate::new(0.0, 0.0),
            Severity::Low,
            Utc::now(),
        )
    }

    fn ids(set: &HazardSet) -> Vec<String> {
        set.iter().map(|h| h.id.to_string()).collect()
    }

    #[test]
    fn test_from_records_keeps_order() {
        let set = HazardSet::from_records(vec![hazard("a"), hazard("b"), hazard("c")]);
        assert_eq!(ids(&set), vec!["a", "b", "c"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_duplicate_id_replaces_in_place() {
        let updated = hazard("a").with_description("second");
        let set = HazardSet::from_records(vec![hazard("a"), hazard("b"), updated]);
        assert_eq!(ids(&set), vec!["a", "b"]);
        let a = set.get(&HazardId::from("a")).expect("a present");
        assert_eq!(a.description.as_deref(), Some("second"));
    }

    #[test]
    fn test_push_front_moves_existing() {
        let mut set = HazardSet::from_records(vec![hazard("a"), hazard("b"), hazard("c")]);
        set.push_front(hazard("c").with_description("local"));
        assert_eq!(ids(&set), vec!["c", "a", "b"]);
        assert_eq!(set.len(), 3);

        set.push_front(hazard("d"));
        assert_eq!(ids(&set), vec!["d", "c", "a", "b"]);
    }

    #[test]
    fn test_remove() {
        let mut set = HazardSet::from_records(vec![hazard("a"), hazard("b")]);
        assert!(set.remove(&HazardId::from("a")).is_some());
        assert!(set.remove(&HazardId::from("a")).is_none());
        assert_eq!(ids(&set), vec!["b"]);
        assert!(!set.contains(&HazardId::from("a")));
    }

    #[test]
    fn test_clear() {
        let mut set: HazardSet = vec![hazard("a"), hazard("b")].into_iter().collect();
        set.clear();
        assert!(set.is_empty());
        assert!(set.to_vec().is_empty());
    }
}
