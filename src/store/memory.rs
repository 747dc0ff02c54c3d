//! Process-local match storage

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::StoreError;
use crate::game::{MatchSnapshot, Phase};

#[derive(Clone, Default)]
pub struct MemoryStore {
    matches: Arc<DashMap<Uuid, MatchSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        match self.matches.entry(snapshot.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(snapshot.id)),
            Entry::Vacant(slot) => {
                slot.insert(snapshot.clone());
                Ok(())
            }
        }
    }

    pub fn save(&self, snapshot: &MatchSnapshot) {
        self.matches.insert(snapshot.id, snapshot.clone());
    }

    pub fn load(&self, id: &Uuid) -> Option<MatchSnapshot> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn list_waiting(&self) -> Vec<MatchSnapshot> {
        let mut waiting = self.collect(|m| m.phase == Phase::Waiting);
        waiting.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        waiting
    }

    pub fn list_unfinished(&self) -> Vec<MatchSnapshot> {
        self.collect(|m| !m.is_finished())
    }

    fn collect(&self, keep: impl Fn(&MatchSnapshot) -> bool) -> Vec<MatchSnapshot> {
        self.matches
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}
