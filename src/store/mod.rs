//! Storage seams for the booking core. Route handlers and engines depend on
//! these traits; `postgres` carries the real implementations.

pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Appointment, AppointmentStatus, Doctor, Review};

/// Partial profile update; `None` leaves the stored value untouched.
/// Availability rules are replaced wholesale when present.
#[derive(Debug, Default, Clone)]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub specialization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hospital: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub languages: Option<String>,
    pub availability_rules: Option<Vec<crate::models::AvailabilityRule>>,
}

#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Doctor>, ApiError>;
    async fn find(&self, id: Uuid) -> Result<Option<Doctor>, ApiError>;
    /// Case-insensitive substring match on name or specialization.
    async fn search(&self, query: &str) -> Result<Vec<Doctor>, ApiError>;
    async fn insert(&self, doctor: &Doctor) -> Result<(), ApiError>;
    async fn update(&self, id: Uuid, patch: DoctorPatch) -> Result<Option<Doctor>, ApiError>;
    async fn delete(&self, id: Uuid) -> Result<bool, ApiError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Start moments of the doctor's appointments with `from <= start < to`.
    async fn starts_in_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ApiError>;

    /// Exact-moment existence check, no tolerance window.
    async fn exists_at(&self, doctor_id: Uuid, moment: DateTime<Utc>) -> Result<bool, ApiError>;

    /// Conditional insert guarded by the (doctor, start moment) uniqueness
    /// invariant. `Ok(false)` means the key was already taken.
    async fn try_insert(&self, appointment: &Appointment) -> Result<bool, ApiError>;

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, ApiError>;
    /// Newest first; optionally filtered by status.
    async fn list(&self, status: Option<AppointmentStatus>) -> Result<Vec<Appointment>, ApiError>;
    async fn by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, ApiError>;
    /// Unconditional status write; returns the updated row if it exists.
    async fn set_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, ApiError>;
    async fn delete(&self, id: Uuid) -> Result<bool, ApiError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Newest first.
    async fn by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Review>, ApiError>;
    async fn insert(&self, review: &Review) -> Result<(), ApiError>;
    /// Mean rating per doctor; doctors with no reviews are absent.
    async fn average_ratings(&self) -> Result<HashMap<Uuid, f64>, ApiError>;
}
