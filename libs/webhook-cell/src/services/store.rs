// libs/webhook-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::error::WebhookError;
use crate::models::{WebhookEvent, WebhookEventStatus};

const TABLE: &str = "webhook_events";

/// Durable log of provider deliveries. Rows are kept after processing for
/// audit and replay.
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    async fn insert(&self, event: &WebhookEvent) -> Result<(), WebhookError>;

    async fn get(&self, id: Uuid) -> Result<Option<WebhookEvent>, WebhookError>;

    async fn update(&self, event: &WebhookEvent) -> Result<(), WebhookError>;

    /// FAILED events that still have attempts left, oldest first.
    async fn list_retryable(&self, max_retries: u32) -> Result<Vec<WebhookEvent>, WebhookError>;

    /// Every FAILED event, oldest first.
    async fn list_failed(&self) -> Result<Vec<WebhookEvent>, WebhookError>;

    /// PENDING events written at or before `cutoff`, oldest first. These are
    /// deliveries whose run crashed or never started.
    async fn list_stalled(&self, cutoff: DateTime<Utc>) -> Result<Vec<WebhookEvent>, WebhookError>;
}

#[derive(Default)]
pub struct InMemoryWebhookEventStore {
    rows: RwLock<HashMap<Uuid, WebhookEvent>>,
}

impl InMemoryWebhookEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<WebhookEvent> {
        let mut rows: Vec<WebhookEvent> = self.rows.read().await.values().cloned().collect();
        rows.sort_by_key(|e| e.created_at);
        rows
    }

    async fn filtered<F>(&self, keep: F) -> Vec<WebhookEvent>
    where
        F: Fn(&WebhookEvent) -> bool,
    {
        let mut rows: Vec<WebhookEvent> = self.rows.read().await.values().filter(|e| keep(e)).cloned().collect();
        rows.sort_by_key(|e| e.created_at);
        rows
    }
}

#[async_trait]
impl WebhookEventStore for InMemoryWebhookEventStore {
    async fn insert(&self, event: &WebhookEvent) -> Result<(), WebhookError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&event.id) {
            return Err(WebhookError::Store(format!("webhook event {} already exists", event.id)));
        }
        rows.insert(event.id, event.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<WebhookEvent>, WebhookError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn update(&self, event: &WebhookEvent) -> Result<(), WebhookError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&event.id) {
            Some(row) => {
                *row = event.clone();
                Ok(())
            }
            None => Err(WebhookError::EventNotFound(event.id)),
        }
    }

    async fn list_retryable(&self, max_retries: u32) -> Result<Vec<WebhookEvent>, WebhookError> {
        Ok(self.filtered(|e| e.can_retry(max_retries)).await)
    }

    async fn list_failed(&self) -> Result<Vec<WebhookEvent>, WebhookError> {
        Ok(self.filtered(|e| e.status == WebhookEventStatus::Failed).await)
    }

    async fn list_stalled(&self, cutoff: DateTime<Utc>) -> Result<Vec<WebhookEvent>, WebhookError> {
        Ok(self
            .filtered(|e| e.status == WebhookEventStatus::Pending && e.created_at <= cutoff)
            .await)
    }
}

/// PostgREST-backed event log.
pub struct SupabaseWebhookEventStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseWebhookEventStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, query: &str) -> Result<Vec<WebhookEvent>, WebhookError> {
        self.supabase
            .select(TABLE, query)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))
    }
}

#[async_trait]
impl WebhookEventStore for SupabaseWebhookEventStore {
    async fn insert(&self, event: &WebhookEvent) -> Result<(), WebhookError> {
        let row = serde_json::to_value(event).map_err(|e| WebhookError::Store(e.to_string()))?;
        self.supabase
            .insert(TABLE, row)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<WebhookEvent>, WebhookError> {
        Ok(self
            .select(&format!("select=*&id=eq.{}&limit=1", id))
            .await?
            .into_iter()
            .next())
    }

    async fn update(&self, event: &WebhookEvent) -> Result<(), WebhookError> {
        let patch = serde_json::json!({
            "status": event.status,
            "error_message": event.error_message,
            "processed_at": event.processed_at,
            "retry_count": event.retry_count,
        });
        let updated: Vec<WebhookEvent> = self
            .supabase
            .update_returning(TABLE, &format!("id=eq.{}", event.id), patch)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;

        if updated.is_empty() {
            return Err(WebhookError::EventNotFound(event.id));
        }
        Ok(())
    }

    async fn list_retryable(&self, max_retries: u32) -> Result<Vec<WebhookEvent>, WebhookError> {
        self.select(&format!(
            "select=*&status=eq.FAILED&retry_count=lt.{}&order=created_at.asc",
            max_retries
        ))
        .await
    }

    async fn list_failed(&self) -> Result<Vec<WebhookEvent>, WebhookError> {
        self.select("select=*&status=eq.FAILED&order=created_at.asc").await
    }

    async fn list_stalled(&self, cutoff: DateTime<Utc>) -> Result<Vec<WebhookEvent>, WebhookError> {
        self.select(&format!(
            "select=*&status=eq.PENDING&created_at=lte.{}&order=created_at.asc",
            cutoff.to_rfc3339_opts(SecondsFormat::Millis, true)
        ))
        .await
    }
}
