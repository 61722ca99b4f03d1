// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{OwnedMutexGuard, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Appointment, AppointmentError};
use crate::services::locks::AppointmentLocks;

const TABLE: &str = "appointments";
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Persistence for appointment aggregates.
///
/// `update` is optimistic: it only succeeds while the stored version equals
/// the version the caller read, and returns the row with the bumped version.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Looks an appointment up by provider meeting id or meeting instance uuid.
    async fn find_by_meeting_ref(&self, meeting_ref: &str) -> Result<Option<Appointment>, AppointmentError>;

    async fn list_active_for_specialist(&self, specialist_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError>;
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    rows: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&appointment.id()) {
            return Err(AppointmentError::DatabaseError(format!(
                "appointment {} already exists",
                appointment.id()
            )));
        }
        let mut stored = appointment.clone();
        stored.set_version(1);
        rows.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_meeting_ref(&self, meeting_ref: &str) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|a| a.meeting_id() == Some(meeting_ref) || a.meeting_uuid() == Some(meeting_ref))
            .cloned())
    }

    async fn list_active_for_specialist(&self, specialist_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|a| a.specialist_id() == specialist_id && a.status().is_active())
            .cloned()
            .collect())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.write().await;
        let current = rows.get(&appointment.id()).ok_or(AppointmentError::NotFound)?;
        if current.version() != appointment.version() {
            return Err(AppointmentError::ConcurrentModification);
        }
        let mut stored = appointment.clone();
        stored.set_version(appointment.version() + 1);
        rows.insert(stored.id(), stored.clone());
        Ok(stored)
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

/// PostgREST-backed repository. Nested aggregate parts live in jsonb columns.
pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn to_row(appointment: &Appointment) -> Result<Value, AppointmentError> {
        serde_json::to_value(appointment)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to serialize appointment: {}", e)))
    }

    async fn select_one(&self, query: &str) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Appointment> = self
            .supabase
            .select(TABLE, query)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let mut stored = appointment.clone();
        stored.set_version(1);
        self.supabase
            .insert(TABLE, Self::to_row(&stored)?)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        self.select_one(&format!("select=*&id=eq.{}&limit=1", id)).await
    }

    async fn find_by_meeting_ref(&self, meeting_ref: &str) -> Result<Option<Appointment>, AppointmentError> {
        let quoted = urlencoding::encode(&format!("\"{}\"", meeting_ref.replace('"', ""))).into_owned();
        let query = format!(
            "select=*&or=(meeting_id.eq.{q},meeting_uuid.eq.{q})&limit=1",
            q = quoted
        );
        self.select_one(&query).await
    }

    async fn list_active_for_specialist(&self, specialist_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let query = format!(
            "select=*&specialist_id=eq.{}&status=in.(OPEN,ONGOING)&order=scheduled_start.asc",
            specialist_id
        );
        self.supabase
            .select(TABLE, &query)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let mut next = appointment.clone();
        next.set_version(appointment.version() + 1);

        let filter = format!("id=eq.{}&version=eq.{}", appointment.id(), appointment.version());
        let updated: Vec<Appointment> = self
            .supabase
            .update_returning(TABLE, &filter, Self::to_row(&next)?)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        match updated.into_iter().next() {
            Some(row) => Ok(row),
            None if self.get(appointment.id()).await?.is_some() => Err(AppointmentError::ConcurrentModification),
            None => Err(AppointmentError::NotFound),
        }
    }
}

// ==============================================================================
// STORE
// ==============================================================================

/// Single entry point for reading and mutating appointments.
///
/// Mutations run under the appointment's lock and re-read the current row
/// before applying, so concurrent handlers never overwrite each other.
#[derive(Clone)]
pub struct AppointmentStore {
    repository: Arc<dyn AppointmentRepository>,
    locks: AppointmentLocks,
}

impl AppointmentStore {
    pub fn new(repository: Arc<dyn AppointmentRepository>) -> Self {
        Self {
            repository,
            locks: AppointmentLocks::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryAppointmentRepository::new()))
    }

    pub async fn lock(&self, key: Uuid) -> OwnedMutexGuard<()> {
        self.locks.acquire(key).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.repository.get(id).await?.ok_or(AppointmentError::NotFound)
    }

    pub async fn find_by_meeting_ref(&self, meeting_ref: &str) -> Result<Option<Appointment>, AppointmentError> {
        self.repository.find_by_meeting_ref(meeting_ref).await
    }

    pub async fn list_active_for_specialist(&self, specialist_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.repository.list_active_for_specialist(specialist_id).await
    }

    pub async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        self.repository.insert(appointment).await
    }

    /// Persists an aggregate the caller read while holding its lock.
    pub async fn save(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        self.repository.update(appointment).await
    }

    /// Locks the appointment, then reads, applies and writes it back.
    pub async fn modify<T, F>(&self, id: Uuid, apply: F) -> Result<(Appointment, T), AppointmentError>
    where
        F: FnMut(&mut Appointment) -> Result<T, AppointmentError> + Send,
        T: Send,
    {
        let _guard = self.locks.acquire(id).await;
        self.modify_locked(id, apply).await
    }

    /// Like [`modify`](Self::modify) for callers already holding the lock.
    /// Version conflicts from other instances are retried on a fresh read.
    pub async fn modify_locked<T, F>(&self, id: Uuid, mut apply: F) -> Result<(Appointment, T), AppointmentError>
    where
        F: FnMut(&mut Appointment) -> Result<T, AppointmentError> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut appointment = self.get(id).await?;
            let output = apply(&mut appointment)?;

            match self.repository.update(&appointment).await {
                Ok(saved) => {
                    debug!("Appointment {} saved at version {}", id, saved.version());
                    return Ok((saved, output));
                }
                Err(AppointmentError::ConcurrentModification) if attempt < MAX_WRITE_ATTEMPTS => {
                    warn!("Version conflict on appointment {} (attempt {}), re-reading", id, attempt);
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppointmentError::ConcurrentModification)
    }
}
