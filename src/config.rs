use std::env;

use chrono::FixedOffset;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Civil-calendar convention for rule matching and slot generation.
    /// Both the availability and booking paths use this same offset.
    pub clinic_offset: FixedOffset,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let offset_minutes = env::var("CLINIC_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        let clinic_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| anyhow::anyhow!("CLINIC_UTC_OFFSET_MINUTES out of range"))?;

        let mail_api_url = env::var("MAIL_API_URL").ok();
        let mail_api_key = env::var("MAIL_API_KEY").ok();
        let mail_from = env::var("MAIL_FROM").unwrap_or_else(|_| "Clinic App <noreply@clinic.local>".to_string());

        Ok(Self {
            database_url,
            bind_addr,
            clinic_offset,
            mail_api_url,
            mail_api_key,
            mail_from,
        })
    }
}
