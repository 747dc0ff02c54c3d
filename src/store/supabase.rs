//! Supabase REST API client using service_role key

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::StoreError;
use crate::game::{MatchSnapshot, MatchStatus, Phase, TimeControl};

const MATCHES_TABLE: &str = "matches";

/// Supabase client for server-side database operations
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, service_role_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let response = check_status(response).await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Make an authenticated GET request expecting a single row
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        let response = check_status(response).await?;
        response.json().await.map(Some).map_err(SupabaseError::Parse)
    }

    /// Make an authenticated POST request (insert), discarding the row
    pub async fn insert<T: Serialize>(&self, table: &str, data: &T) -> Result<(), SupabaseError> {
        let response = self
            .client
            .post(self.rest_url(table))
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(data)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Upsert (insert or update on conflict)
    pub async fn upsert<T: Serialize>(
        &self,
        table: &str,
        data: &T,
        on_conflict: &str,
    ) -> Result<(), SupabaseError> {
        let url = format!("{}?on_conflict={}", self.rest_url(table), on_conflict);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(data)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SupabaseError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(SupabaseError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Row in the matches table. The full snapshot lives in `state`; the
/// other columns exist for filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub name: String,
    pub host_id: String,
    pub guest_id: Option<String>,
    pub status: MatchStatus,
    pub phase: Phase,
    pub mode: TimeControl,
    pub state: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn from_snapshot(snapshot: &MatchSnapshot) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: snapshot.id,
            name: snapshot.name.clone(),
            host_id: snapshot.host_id.clone(),
            guest_id: snapshot.guest_id.clone(),
            status: snapshot.status,
            phase: snapshot.phase,
            mode: snapshot.mode,
            state: serde_json::to_value(snapshot)?,
            updated_at: Utc::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StateOnly {
    state: serde_json::Value,
}

impl StateOnly {
    fn into_snapshot(self) -> Result<MatchSnapshot, StoreError> {
        Ok(serde_json::from_value(self.state)?)
    }
}

/// Match persistence backed by the Supabase `matches` table
#[derive(Clone)]
pub struct SupabaseMatchStore {
    client: SupabaseClient,
}

impl SupabaseMatchStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        let record = MatchRecord::from_snapshot(snapshot)?;
        self.client.insert(MATCHES_TABLE, &record).await?;
        Ok(())
    }

    pub async fn save(&self, snapshot: &MatchSnapshot) -> Result<(), StoreError> {
        let record = MatchRecord::from_snapshot(snapshot)?;
        self.client.upsert(MATCHES_TABLE, &record, "id").await?;
        Ok(())
    }

    pub async fn load(&self, id: Uuid) -> Result<Option<MatchSnapshot>, StoreError> {
        let row: Option<StateOnly> = self
            .client
            .get_one(MATCHES_TABLE, &format!("id=eq.{}&select=state", id))
            .await?;
        row.map(StateOnly::into_snapshot).transpose()
    }

    pub async fn list_waiting(&self) -> Result<Vec<MatchSnapshot>, StoreError> {
        self.list("phase=eq.waiting&select=state&order=created_at.desc")
            .await
    }

    pub async fn list_unfinished(&self) -> Result<Vec<MatchSnapshot>, StoreError> {
        self.list("phase=neq.finished&select=state").await
    }

    async fn list(&self, query: &str) -> Result<Vec<MatchSnapshot>, StoreError> {
        let rows: Vec<StateOnly> = self.client.get(MATCHES_TABLE, query).await?;
        rows.into_iter().map(StateOnly::into_snapshot).collect()
    }
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}
