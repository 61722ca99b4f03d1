use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: String,

    pub zoom_account_id: String,
    pub zoom_client_id: String,
    pub zoom_client_secret: String,
    pub zoom_api_base_url: String,
    pub zoom_oauth_url: String,
    pub zoom_webhook_secret_token: String,

    pub google_calendar_base_url: String,
    pub google_calendar_access_token: String,
    pub teams_graph_base_url: String,
    pub teams_access_token: String,
    pub teams_organizer_id: String,
    pub whatsapp_business_number: String,

    pub ledger_base_url: String,
    pub ledger_api_key: String,

    pub webhook_max_retries: u32,
    pub webhook_retry_interval_seconds: u64,
    pub webhook_timestamp_tolerance_seconds: i64,
    pub webhook_pending_grace_seconds: u64,
    pub settle_no_shows: bool,
    pub follow_up_delay_seconds: u64,
    pub reminder_lead_minutes: i64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            storage_backend: with_default("STORAGE_BACKEND", "memory"),

            zoom_account_id: required("ZOOM_ACCOUNT_ID"),
            zoom_client_id: required("ZOOM_CLIENT_ID"),
            zoom_client_secret: required("ZOOM_CLIENT_SECRET"),
            zoom_api_base_url: with_default("ZOOM_API_BASE_URL", "https://api.zoom.us/v2"),
            zoom_oauth_url: with_default("ZOOM_OAUTH_URL", "https://zoom.us/oauth/token"),
            zoom_webhook_secret_token: required("ZOOM_WEBHOOK_SECRET_TOKEN"),

            google_calendar_base_url: with_default(
                "GOOGLE_CALENDAR_BASE_URL",
                "https://www.googleapis.com/calendar/v3",
            ),
            google_calendar_access_token: optional("GOOGLE_CALENDAR_ACCESS_TOKEN"),
            teams_graph_base_url: with_default("TEAMS_GRAPH_BASE_URL", "https://graph.microsoft.com/v1.0"),
            teams_access_token: optional("TEAMS_ACCESS_TOKEN"),
            teams_organizer_id: optional("TEAMS_ORGANIZER_ID"),
            whatsapp_business_number: optional("WHATSAPP_BUSINESS_NUMBER"),

            ledger_base_url: required("LEDGER_BASE_URL"),
            ledger_api_key: required("LEDGER_API_KEY"),

            webhook_max_retries: parsed("WEBHOOK_MAX_RETRIES", 3),
            webhook_retry_interval_seconds: parsed("WEBHOOK_RETRY_INTERVAL_SECONDS", 300),
            webhook_timestamp_tolerance_seconds: parsed("WEBHOOK_TIMESTAMP_TOLERANCE_SECONDS", 300),
            webhook_pending_grace_seconds: parsed("WEBHOOK_PENDING_GRACE_SECONDS", 120),
            settle_no_shows: parsed("SETTLE_NO_SHOWS", false),
            follow_up_delay_seconds: parsed("FOLLOW_UP_DELAY_SECONDS", 300),
            reminder_lead_minutes: parsed("REMINDER_LEAD_MINUTES", 60),
            server_port: parsed("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if !config.is_zoom_configured() {
            warn!("Zoom credentials missing - zoom appointments will be booked without meeting links");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty() && !self.zoom_webhook_secret_token.is_empty()
    }

    pub fn is_zoom_configured(&self) -> bool {
        !self.zoom_account_id.is_empty()
            && !self.zoom_client_id.is_empty()
            && !self.zoom_client_secret.is_empty()
            && !self.zoom_api_base_url.is_empty()
    }

    pub fn is_google_meet_configured(&self) -> bool {
        !self.google_calendar_access_token.is_empty() && !self.google_calendar_base_url.is_empty()
    }

    pub fn is_teams_configured(&self) -> bool {
        !self.teams_access_token.is_empty()
            && !self.teams_organizer_id.is_empty()
            && !self.teams_graph_base_url.is_empty()
    }

    pub fn is_ledger_configured(&self) -> bool {
        !self.ledger_base_url.is_empty()
    }

    pub fn uses_supabase_storage(&self) -> bool {
        self.storage_backend.eq_ignore_ascii_case("supabase")
    }
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn optional(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

fn with_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
