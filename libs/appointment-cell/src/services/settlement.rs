// libs/appointment-cell/src/services/settlement.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::models::{Appointment, EscrowStatus, SettlementType};
use crate::services::collaborators::EscrowLedger;

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    Settled { batch_id: String },
    AlreadySettled,
    NotHeld,
    /// No settlement applies to this outcome under the current policy.
    Skipped,
    /// The ledger call failed; escrow stays held for the reconciliation sweep.
    Failed { reason: String },
}

/// Asks the ledger to release held funds once a meeting has finished.
///
/// The caller holds the appointment lock and persists the aggregate after
/// this returns, so the escrow change is written together with the final
/// status. Escrow status is checked before calling out: an already settled
/// appointment never reaches the ledger again.
pub struct SettlementTrigger {
    ledger: Arc<dyn EscrowLedger>,
    settle_no_shows: bool,
}

impl SettlementTrigger {
    pub fn new(ledger: Arc<dyn EscrowLedger>, settle_no_shows: bool) -> Self {
        Self { ledger, settle_no_shows }
    }

    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id()))]
    pub async fn settle(&self, appointment: &mut Appointment) -> SettlementOutcome {
        match appointment.escrow().status {
            EscrowStatus::Settled => return SettlementOutcome::AlreadySettled,
            EscrowStatus::None => return SettlementOutcome::NotHeld,
            EscrowStatus::Held => {}
        }

        let Some(settlement_type) = SettlementType::for_status(appointment.status()) else {
            return SettlementOutcome::Skipped;
        };

        if settlement_type == SettlementType::NoShow && !self.settle_no_shows {
            info!("Leaving escrow held for missed appointment {}", appointment.id());
            return SettlementOutcome::Skipped;
        }

        match self
            .ledger
            .settle_appointment_funds(appointment.id(), settlement_type)
            .await
        {
            Ok(receipt) => {
                match appointment.mark_escrow_settled(receipt.batch_id.clone(), settlement_type, Utc::now()) {
                    Ok(()) => SettlementOutcome::Settled {
                        batch_id: receipt.batch_id,
                    },
                    Err(e) => SettlementOutcome::Failed { reason: e.to_string() },
                }
            }
            Err(e) => {
                warn!(
                    "Settlement for appointment {} failed, escrow stays held: {}",
                    appointment.id(),
                    e
                );
                SettlementOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}
