// libs/appointment-cell/src/services/directory.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::AppointmentError;
use crate::services::collaborators::{Subscription, SubscriptionLookup, UserDirectory, UserProfile};

pub struct SupabaseUserDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseUserDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl UserDirectory for SupabaseUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError> {
        debug!("Looking up profile {}", id);
        let query = format!("select=id,email,full_name,role&id=eq.{}&limit=1", id);
        let rows: Vec<UserProfile> = self
            .supabase
            .select("profiles", &query)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionRow {
    user_id: Uuid,
    plan: String,
    #[serde(default)]
    call_duration_minutes: Option<i64>,
}

pub struct SupabaseSubscriptionLookup {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSubscriptionLookup {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl SubscriptionLookup for SupabaseSubscriptionLookup {
    async fn get_active_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>, AppointmentError> {
        let query = format!(
            "select=user_id,plan,call_duration_minutes&user_id=eq.{}&status=eq.active&order=created_at.desc&limit=1",
            user_id
        );
        let rows: Vec<SubscriptionRow> = self
            .supabase
            .select("subscriptions", &query)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().next().map(|row| Subscription {
            user_id: row.user_id,
            plan: row.plan,
            call_duration_minutes: row.call_duration_minutes,
        }))
    }
}
