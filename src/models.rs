use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::BookingService;
use crate::chat::ChatEngine;
use crate::error::ApiError;
use crate::store::{AppointmentStore, DoctorStore, ReviewStore};

#[derive(Clone)]
pub struct AppState {
    pub doctors: Arc<dyn DoctorStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub booking: Arc<BookingService>,
    pub chat: Arc<ChatEngine>,
    pub clinic_offset: FixedOffset,
}

/* -------------------------
   Availability rules
--------------------------*/

pub const DEFAULT_SLOT_MINUTES: i32 = 30;

/// One entry of a doctor's open hours. Rules are owned by the doctor, kept in
/// insertion order, and have no identity of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRule {
    #[serde(flatten)]
    pub recurrence: Recurrence,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default = "default_slot_minutes")]
    pub duration_minutes: i32,
}

/// Tagged on the wire as `"type": "weekly" | "date"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Recurrence {
    #[serde(rename_all = "camelCase")]
    Weekly {
        /// 0 = Sunday .. 6 = Saturday
        day_of_week: u8,
        /// 0 = January .. 11 = December; restricts the recurrence when set
        #[serde(default, skip_serializing_if = "Option::is_none")]
        month: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
    },
    Date {
        /// Time-of-day is ignored for matching.
        date: NaiveDate,
    },
}

fn default_slot_minutes() -> i32 {
    DEFAULT_SLOT_MINUTES
}

impl AvailabilityRule {
    pub fn kind(&self) -> RuleKind {
        match self.recurrence {
            Recurrence::Weekly { .. } => RuleKind::Weekly,
            Recurrence::Date { .. } => RuleKind::Date,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.start_time >= self.end_time {
            return Err(ApiError::InvalidInput(
                "startTime must be before endTime".into(),
            ));
        }
        if self.duration_minutes <= 0 {
            return Err(ApiError::InvalidInput(
                "durationMinutes must be positive".into(),
            ));
        }
        match self.recurrence {
            Recurrence::Weekly {
                day_of_week, month, ..
            } => {
                if day_of_week > 6 {
                    return Err(ApiError::InvalidInput(
                        "dayOfWeek must be between 0 (Sunday) and 6 (Saturday)".into(),
                    ));
                }
                if let Some(m) = month {
                    if m > 11 {
                        return Err(ApiError::InvalidInput(
                            "month must be between 0 (January) and 11 (December)".into(),
                        ));
                    }
                }
            }
            Recurrence::Date { .. } => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Weekly,
    Date,
}

/// "HH:MM" wall-clock times on the wire.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}

/* -------------------------
   Doctors
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hospital: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub languages: Option<String>,
    pub availability_rules: Vec<AvailabilityRule>,
}

/* -------------------------
   Reviews
--------------------------*/

/// Patient feedback on a doctor. Reviewers are identified by name only;
/// there are no accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub reviewer_name: String,
    /// 1 (worst) to 5 (best).
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/* -------------------------
   Appointments
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_name: String,
    /// Email on the HTTP booking path, phone on the chat path.
    pub patient_contact: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
}

/* -------------------------
   Generated slots
--------------------------*/

pub const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A discrete bookable interval derived from one availability rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub booked: bool,
    pub day_name: &'static str,
    pub duration_minutes: i32,
    pub rule_kind: RuleKind,
}

/* -------------------------
   Shared response envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        OkResponse {
            data: OkData { ok: true },
        }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}
