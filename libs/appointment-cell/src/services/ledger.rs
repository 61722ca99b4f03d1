// libs/appointment-cell/src/services/ledger.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{AppointmentError, SettlementType};
use crate::services::collaborators::{EscrowLedger, SettlementReceipt};

#[derive(Debug, Deserialize)]
struct SettleResponse {
    #[serde(alias = "batchId")]
    batch_id: String,
}

/// HTTP client for the escrow ledger service.
pub struct HttpEscrowLedger {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpEscrowLedger {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        if !config.is_ledger_configured() {
            return Err(AppointmentError::ExternalServiceError(
                "escrow ledger is not configured".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.ledger_base_url.trim_end_matches('/').to_string(),
            api_key: config.ledger_api_key.clone(),
        })
    }
}

#[async_trait]
impl EscrowLedger for HttpEscrowLedger {
    async fn settle_appointment_funds(
        &self,
        appointment_id: Uuid,
        settlement_type: SettlementType,
    ) -> Result<SettlementReceipt, AppointmentError> {
        let url = format!("{}/escrow/appointments/{}/settle", self.base_url, appointment_id);
        debug!("Requesting {} settlement at {}", settlement_type.as_str(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "settlement_type": settlement_type }))
            .send()
            .await
            .map_err(|e| AppointmentError::ExternalServiceError(format!("ledger unreachable: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppointmentError::ExternalServiceError(e.to_string()))?;

        if !status.is_success() {
            error!("Ledger rejected settlement for {}: {} - {}", appointment_id, status, text);
            return Err(AppointmentError::ExternalServiceError(format!(
                "ledger returned HTTP {}: {}",
                status, text
            )));
        }

        let parsed: SettleResponse = serde_json::from_str(&text).map_err(|e| {
            AppointmentError::ExternalServiceError(format!("Failed to parse ledger response: {}", e))
        })?;

        info!("Ledger settled appointment {} in batch {}", appointment_id, parsed.batch_id);
        Ok(SettlementReceipt {
            batch_id: parsed.batch_id,
        })
    }
}
