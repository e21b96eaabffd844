use std::env;
use tracing::warn;

pub const DEFAULT_CABINETS: [&str; 4] = ["Cabinet-1", "Cabinet-2", "Cabinet-3", "Cabinet-4"];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Treatment rooms that can be booked, in display order.
    pub cabinets: Vec<String>,
    /// Offset of the clinic's wall clock from UTC, used to decide whether a slot is in the past.
    pub clinic_utc_offset_minutes: i32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            cabinets: env::var("CLINIC_CABINETS")
                .ok()
                .map(|raw| parse_cabinets(&raw))
                .filter(|cabinets| !cabinets.is_empty())
                .unwrap_or_else(|| {
                    warn!("CLINIC_CABINETS not set, using default cabinets");
                    default_cabinets()
                }),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|raw| match raw.trim().parse::<i32>() {
                    Ok(minutes) if minutes.abs() < 24 * 60 => Some(minutes),
                    _ => {
                        warn!("CLINIC_UTC_OFFSET_MINUTES is invalid ({}), using UTC", raw);
                        None
                    }
                })
                .unwrap_or(0),
            port: env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

pub fn default_cabinets() -> Vec<String> {
    DEFAULT_CABINETS.iter().map(|c| c.to_string()).collect()
}

/// Splits a comma-separated cabinet list, dropping blanks and duplicates.
pub fn parse_cabinets(raw: &str) -> Vec<String> {
    let mut cabinets: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !cabinets.iter().any(|c| c == name) {
            cabinets.push(name.to_string());
        }
    }
    cabinets
}
