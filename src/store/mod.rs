//! Match persistence - in-memory for local play, Supabase in deployment

pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::{SupabaseClient, SupabaseError};

use uuid::Uuid;

use crate::game::MatchSnapshot;

/// Where match snapshots are kept. Chosen once at startup from config.
#[derive(Clone)]
pub enum MatchStore {
    Memory(MemoryStore),
    Supabase(supabase::SupabaseMatchStore),
}

impl MatchStore {
    pub fn memory() -> Self {
        MatchStore::Memory(MemoryStore::new())
    }

    pub fn supabase(client: SupabaseClient) -> Self {
        MatchStore::Supabase(supabase::SupabaseMatchStore::new(client))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            MatchStore::Memory(_) => "memory",
            MatchStore::Supabase(_) => "supabase",
        }
    }

    /// Insert a freshly created match
    pub async fn create(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        match self {
            MatchStore::Memory(store) => store.create(snapshot),
            MatchStore::Supabase(store) => store.create(snapshot).await,
        }
    }

    /// Overwrite the stored state of a match
    pub async fn save(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        match self {
            MatchStore::Memory(store) => {
                store.save(snapshot);
                Ok(())
            }
            MatchStore::Supabase(store) => store.save(snapshot).await,
        }
    }

    pub async fn load(&self, id: Uuid) -> Result<Option<MatchSnapshot>, StoreError> {
        match self {
            MatchStore::Memory(store) => Ok(store.load(&id)),
            MatchStore::Supabase(store) => store.load(id).await,
        }
    }

    /// Matches still waiting for a guest, newest first
    pub async fn list_waiting(&self) -> Result<Vec<MatchSnapshot>, StoreError> {
        match self {
            MatchStore::Memory(store) => Ok(store.list_waiting()),
            MatchStore::Supabase(store) => store.list_waiting().await,
        }
    }

    /// Every match that has not finished (startup resume)
    pub async fn list_unfinished(&self) -> Result<Vec<MatchSnapshot>, StoreError> {
        match self {
            MatchStore::Memory(store) => Ok(store.list_unfinished()),
            MatchStore::Supabase(store) => store.list_unfinished().await,
        }
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("match {0} already exists")]
    Duplicate(Uuid),

    #[error("stored match is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error(transparent)]
    Supabase(#[from] SupabaseError),
}
