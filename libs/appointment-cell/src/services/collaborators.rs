// libs/appointment-cell/src/services/collaborators.rs
//! Interfaces to systems this cell calls but does not own, with in-memory
//! implementations for local runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::{AppointmentError, AppointmentStatus, SettlementType};

// ==============================================================================
// ESCROW LEDGER
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementReceipt {
    pub batch_id: String,
}

/// Releases held funds. The ledger moves the money; this cell only asks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EscrowLedger: Send + Sync {
    async fn settle_appointment_funds(
        &self,
        appointment_id: Uuid,
        settlement_type: SettlementType,
    ) -> Result<SettlementReceipt, AppointmentError>;
}

/// Records settlements instead of moving funds.
#[derive(Default)]
pub struct InMemoryEscrowLedger {
    settlements: RwLock<Vec<(Uuid, SettlementType)>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryEscrowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail as if the ledger were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn settlements(&self) -> Vec<(Uuid, SettlementType)> {
        self.settlements.read().await.clone()
    }
}

#[async_trait]
impl EscrowLedger for InMemoryEscrowLedger {
    async fn settle_appointment_funds(
        &self,
        appointment_id: Uuid,
        settlement_type: SettlementType,
    ) -> Result<SettlementReceipt, AppointmentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppointmentError::ExternalServiceError("ledger unavailable".to_string()));
        }

        self.settlements.write().await.push((appointment_id, settlement_type));
        info!("Recorded {} settlement for appointment {}", settlement_type.as_str(), appointment_id);
        Ok(SettlementReceipt {
            batch_id: format!("local-batch-{}", call),
        })
    }
}

// ==============================================================================
// USER DIRECTORY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError>;
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, profile: UserProfile) {
        self.profiles.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }
}

// ==============================================================================
// SUBSCRIPTIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub user_id: Uuid,
    pub plan: String,
    /// Maximum call length the plan grants, overriding the booked duration.
    pub call_duration_minutes: Option<i64>,
}

#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    async fn get_active_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>, AppointmentError>;
}

#[derive(Default)]
pub struct InMemorySubscriptionLookup {
    subscriptions: RwLock<HashMap<Uuid, Subscription>>,
}

impl InMemorySubscriptionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, subscription: Subscription) {
        self.subscriptions.write().await.insert(subscription.user_id, subscription);
    }
}

#[async_trait]
impl SubscriptionLookup for InMemorySubscriptionLookup {
    async fn get_active_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>, AppointmentError> {
        Ok(self.subscriptions.read().await.get(&user_id).cloned())
    }
}

// ==============================================================================
// DEFERRED JOBS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeferredJob {
    AppointmentReminder {
        appointment_id: Uuid,
        scheduled_start: DateTime<Utc>,
    },
    SessionFollowUp {
        appointment_id: Uuid,
        status: AppointmentStatus,
    },
}

impl DeferredJob {
    pub fn appointment_id(&self) -> Uuid {
        match self {
            DeferredJob::AppointmentReminder { appointment_id, .. }
            | DeferredJob::SessionFollowUp { appointment_id, .. } => *appointment_id,
        }
    }
}

/// Fire-and-forget "run this after a delay".
pub trait JobScheduler: Send + Sync {
    fn schedule(&self, job: DeferredJob, delay: Duration);
}
