//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::game::SessionRegistry;
use crate::store::{MatchStore, SupabaseClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: MatchStore,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Pick the persistence backend
        let store = match &config.supabase {
            Some(supabase) => MatchStore::supabase(SupabaseClient::new(
                &supabase.url,
                &supabase.service_role_key,
            )),
            None => MatchStore::memory(),
        };
        info!(backend = store.backend_name(), "Match store ready");

        // Initialize session registry
        let sessions = Arc::new(SessionRegistry::new(
            store.clone(),
            config.session_settings(),
        ));

        Self {
            config,
            store,
            sessions,
        }
    }
}
