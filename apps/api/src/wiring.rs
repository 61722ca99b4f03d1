use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use appointment_cell::{
    AppointmentBookingService, AppointmentStore, EscrowLedger, HttpEscrowLedger, InMemoryEscrowLedger,
    InMemorySubscriptionLookup, InMemoryUserDirectory, LoggingJobRunner, SettlementTrigger, SubscriptionLookup,
    SupabaseAppointmentRepository, SupabaseSubscriptionLookup, SupabaseUserDirectory, TokioJobScheduler,
    UserDirectory,
};
use meeting_channel_cell::{ChannelRegistry, MeetingProviderApi, UnavailableProvider, ZoomClient};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use webhook_cell::{
    EventProcessor, InMemoryWebhookEventStore, SupabaseWebhookEventStore, WebhookEventStore, WebhookIngestor,
};

struct Storage {
    store: AppointmentStore,
    events: Arc<dyn WebhookEventStore>,
    directory: Arc<dyn UserDirectory>,
    subscriptions: Arc<dyn SubscriptionLookup>,
}

impl Storage {
    fn from_config(config: &AppConfig) -> Self {
        if config.uses_supabase_storage() {
            info!("Using Supabase storage");
            let supabase = Arc::new(SupabaseClient::new(config));
            Self {
                store: AppointmentStore::new(Arc::new(SupabaseAppointmentRepository::new(supabase.clone()))),
                events: Arc::new(SupabaseWebhookEventStore::new(supabase.clone())),
                directory: Arc::new(SupabaseUserDirectory::new(supabase.clone())),
                subscriptions: Arc::new(SupabaseSubscriptionLookup::new(supabase)),
            }
        } else {
            warn!("Using in-memory storage; data is lost on restart");
            Self {
                store: AppointmentStore::in_memory(),
                events: Arc::new(InMemoryWebhookEventStore::new()),
                directory: Arc::new(InMemoryUserDirectory::new()),
                subscriptions: Arc::new(InMemorySubscriptionLookup::new()),
            }
        }
    }
}

/// Everything the routers and background tasks share.
pub struct Services {
    pub booking: Arc<AppointmentBookingService>,
    pub processor: Arc<EventProcessor>,
    pub ingestor: Arc<WebhookIngestor>,
}

impl Services {
    pub fn from_config(config: &AppConfig) -> Self {
        let Storage {
            store,
            events,
            directory,
            subscriptions,
        } = Storage::from_config(config);

        let ledger: Arc<dyn EscrowLedger> = match HttpEscrowLedger::new(config) {
            Ok(ledger) => Arc::new(ledger),
            Err(e) => {
                warn!("Escrow ledger not configured ({}), settlements are only recorded locally", e);
                Arc::new(InMemoryEscrowLedger::new())
            }
        };

        let provider: Arc<dyn MeetingProviderApi> = match ZoomClient::new(config) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!("Zoom reads unavailable ({}), attendance falls back to webhook data", e);
                Arc::new(UnavailableProvider)
            }
        };

        let scheduler = Arc::new(TokioJobScheduler::new(Arc::new(LoggingJobRunner)));
        let channels = Arc::new(ChannelRegistry::from_config(config));
        info!("Meeting channels available: {:?}", channels.available_channels());

        let booking = Arc::new(AppointmentBookingService::new(
            store.clone(),
            channels,
            directory,
            subscriptions,
            scheduler.clone(),
            config.reminder_lead_minutes,
        ));

        let processor = Arc::new(EventProcessor::new(
            events,
            store,
            provider,
            SettlementTrigger::new(ledger, config.settle_no_shows),
            scheduler,
            Duration::from_secs(config.follow_up_delay_seconds),
            config.webhook_max_retries,
        )
        .with_pending_grace(Duration::from_secs(config.webhook_pending_grace_seconds)));
        let ingestor = Arc::new(WebhookIngestor::from_config(processor.clone(), config));

        Self {
            booking,
            processor,
            ingestor,
        }
    }
}
